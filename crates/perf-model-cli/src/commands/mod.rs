pub mod aggregate;
pub mod compare;
pub mod groups;
pub mod plot;
pub mod predict;
pub mod train;
pub mod validate;

use perf_model::error::{PerfModelError, Severity, Violation};
use perf_model::schema::{PipelineConfig, resolve_config, validate_config};

use crate::PipelineArgs;

/// Resolve the selected pipeline and refuse one with validation errors.
pub fn load_pipeline(args: &PipelineArgs) -> Result<PipelineConfig, PerfModelError> {
    let config = resolve_config(args.config.as_deref(), &args.pipeline)?;
    let violations = validate_config(&config);
    let errors = violations
        .iter()
        .filter(|v| v.severity == Severity::Error)
        .count();
    if errors > 0 {
        print_violations(&violations);
        return Err(PerfModelError::InvalidInput(format!(
            "pipeline '{}' has {errors} validation error(s)",
            config.name
        )));
    }
    Ok(config)
}

pub fn print_violations(violations: &[Violation]) {
    for v in violations {
        println!("{v}");
    }
}
