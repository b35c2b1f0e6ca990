use std::path::PathBuf;
use std::process;

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use perf_model::error::PerfModelError;
use perf_model::golden::DEFAULT_THRESHOLD_PCT;

mod commands;

/// Top-level CLI argument parser for the `pm` command
#[derive(Parser)]
#[command(
    name = "pm",
    about = "perf-model — linear performance models for accelerator kernels",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Pipeline selection shared by the modeling subcommands
#[derive(Args, Clone)]
struct PipelineArgs {
    /// Built-in pipeline name
    #[arg(long, default_value = "binary-add-interleaved")]
    pipeline: String,
    /// Pipeline declaration YAML (overrides --pipeline)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Available subcommands for the `pm` CLI
#[derive(Subcommand)]
enum Commands {
    /// Fit per-group coefficients from a profiler report
    Train {
        /// Profiler report CSV
        input: PathBuf,
        /// Output coefficients CSV
        coeffs: PathBuf,
        /// Fail if any group is excluded from the fit
        #[arg(long)]
        strict: bool,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Estimate durations and relative error for a profiler report
    Predict {
        /// Profiler report CSV
        input: PathBuf,
        /// Coefficients CSV written by `train`
        coeffs: PathBuf,
        /// Output estimates CSV
        out: PathBuf,
        /// Also write per-bucket RMSRE to this CSV
        #[arg(long)]
        rmsre: Option<PathBuf>,
        /// Fail if any record's key has no coefficients
        #[arg(long)]
        strict: bool,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Aggregate repeated RMSRE measurements
    Aggregate {
        /// RMSRE CSV written by `predict --rmsre`
        rmsre: PathBuf,
        /// Output aggregated CSV
        out: PathBuf,
        /// Write one SVG chart per memory combination into this directory
        #[arg(long)]
        plot_dir: Option<PathBuf>,
    },
    /// Compare a benchmark run against its golden
    Compare {
        /// New benchmark results JSON
        new: PathBuf,
        /// Golden JSON (default: goldens/<file name> next to the results)
        #[arg(long)]
        golden: Option<PathBuf>,
        /// Symmetric regression threshold in percent
        #[arg(long, default_value_t = DEFAULT_THRESHOLD_PCT)]
        threshold: f64,
        /// Also list passing benchmarks
        #[arg(short, long)]
        verbose: bool,
    },
    /// Render a 3-D scatter grid of a profiler report as HTML
    #[command(name = "plot-3d")]
    Plot3d {
        /// Profiler report CSV
        input: PathBuf,
        /// Output HTML file
        out: PathBuf,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Show how a profiler report partitions into groups
    Groups {
        /// Profiler report CSV
        input: PathBuf,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Validate a pipeline declaration
    Validate {
        /// Path to the pipeline YAML file
        config: PathBuf,
    },
}

/// Dispatch a parsed CLI subcommand to its handler
fn run_command(command: Commands) -> Result<(), PerfModelError> {
    match command {
        Commands::Train {
            input,
            coeffs,
            strict,
            pipeline,
        } => commands::train::run(&input, &coeffs, strict, &pipeline),
        Commands::Predict {
            input,
            coeffs,
            out,
            rmsre,
            strict,
            pipeline,
        } => commands::predict::run(
            &input,
            &coeffs,
            &out,
            rmsre.as_deref(),
            strict,
            &pipeline,
        ),
        Commands::Aggregate {
            rmsre,
            out,
            plot_dir,
        } => commands::aggregate::run(&rmsre, &out, plot_dir.as_deref()),
        Commands::Compare {
            new,
            golden,
            threshold,
            verbose,
        } => commands::compare::run(&new, golden.as_deref(), threshold, verbose),
        Commands::Plot3d {
            input,
            out,
            pipeline,
        } => commands::plot::run(&input, &out, &pipeline),
        Commands::Groups { input, pipeline } => commands::groups::run(&input, &pipeline),
        Commands::Validate { config } => commands::validate::run(&config),
    }
}

/// Entry point: parse CLI arguments and run the selected subcommand
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            // Usage errors are invalid input; exit code 2 is reserved for I/O.
            let _ = e.print();
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command) {
        eprintln!("error: {e}");
        process::exit(e.exit_code());
    }
}
