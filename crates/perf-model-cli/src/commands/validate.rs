use std::path::Path;

use perf_model::error::{PerfModelError, Severity};
use perf_model::schema::{parse_config, validate_config};

pub fn run(path: &Path) -> Result<(), PerfModelError> {
    let config = parse_config(path)?;
    let violations = validate_config(&config);

    let errors: Vec<_> = violations
        .iter()
        .filter(|v| v.severity == Severity::Error)
        .collect();
    let warnings: Vec<_> = violations
        .iter()
        .filter(|v| v.severity == Severity::Warning)
        .collect();

    for v in &violations {
        println!("{v}");
    }

    println!(
        "\n{} error(s), {} warning(s)",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        println!(
            "Pipeline {} is valid: key [{}], {} feature(s), groups need {} row(s).",
            config.name,
            config
                .key
                .iter()
                .map(|k| k.column())
                .collect::<Vec<_>>()
                .join(", "),
            config.feature_count(),
            config.min_fit_rows()
        );
        Ok(())
    } else {
        Err(PerfModelError::InvalidInput(format!(
            "Pipeline has {} validation error(s)",
            errors.len()
        )))
    }
}
