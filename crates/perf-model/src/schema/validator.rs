use std::collections::HashSet;

use crate::error::{Severity, Violation};
use crate::features::TilesFormula;
use crate::schema::config::PipelineConfig;

/// Validate a pipeline declaration for completeness and consistency.
///
/// Returns a list of violations. If any violation has
/// [`Severity::Error`], the pipeline cannot be used for training.
pub fn validate_config(config: &PipelineConfig) -> Vec<Violation> {
    let mut violations = Vec::new();

    validate_name(config, &mut violations);
    validate_key(config, &mut violations);
    validate_features(config, &mut violations);
    validate_fit_rows(config, &mut violations);

    if config.tiles_formula == TilesFormula::SquaredY {
        violations.push(Violation {
            severity: Severity::Warning,
            rule: "CONFIG-007".to_string(),
            message: "tiles_formula squared_y ignores INPUT_0_X; \
                      use product unless reproducing a legacy fit"
                .to_string(),
            location: Some("tiles_formula".to_string()),
        });
    }

    violations
}

fn validate_name(config: &PipelineConfig, violations: &mut Vec<Violation>) {
    if config.name.trim().is_empty() {
        violations.push(Violation {
            severity: Severity::Error,
            rule: "CONFIG-001".to_string(),
            message: "name must not be empty".to_string(),
            location: Some("name".to_string()),
        });
    }
}

fn validate_key(config: &PipelineConfig, violations: &mut Vec<Violation>) {
    if config.key.is_empty() {
        violations.push(Violation {
            severity: Severity::Error,
            rule: "CONFIG-002".to_string(),
            message: "key must name at least one field".to_string(),
            location: Some("key".to_string()),
        });
    }

    let mut seen = HashSet::new();
    for field in &config.key {
        if !seen.insert(field) {
            violations.push(Violation {
                severity: Severity::Error,
                rule: "CONFIG-003".to_string(),
                message: format!("key field {} is listed more than once", field.column()),
                location: Some("key".to_string()),
            });
        }
    }
}

fn validate_features(config: &PipelineConfig, violations: &mut Vec<Violation>) {
    if config.features.is_empty() {
        violations.push(Violation {
            severity: Severity::Error,
            rule: "CONFIG-004".to_string(),
            message: "features must contain at least one feature".to_string(),
            location: Some("features".to_string()),
        });
    }

    let mut seen = HashSet::new();
    for feature in &config.features {
        if !seen.insert(feature) {
            violations.push(Violation {
                severity: Severity::Error,
                rule: "CONFIG-005".to_string(),
                message: format!(
                    "feature {feature} is listed more than once; \
                     its coefficient would be unidentifiable"
                ),
                location: Some("features".to_string()),
            });
        }
    }
}

fn validate_fit_rows(config: &PipelineConfig, violations: &mut Vec<Violation>) {
    let floor = config.feature_count() + 1;
    if let Some(rows) = config.min_fit_rows
        && rows < floor
    {
        violations.push(Violation {
            severity: Severity::Error,
            rule: "CONFIG-006".to_string(),
            message: format!(
                "min_fit_rows is {rows} but {} feature(s) need at least {floor} rows",
                config.feature_count()
            ),
            location: Some("min_fit_rows".to_string()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_config_str;

    fn errors(violations: &[Violation]) -> Vec<&str> {
        violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
            .map(|v| v.rule.as_str())
            .collect()
    }

    #[test]
    fn presets_are_valid() {
        assert!(validate_config(&PipelineConfig::binary_add_interleaved()).is_empty());
        assert!(validate_config(&PipelineConfig::binary_add_sharded()).is_empty());
    }

    #[test]
    fn empty_lists_are_errors() {
        let config = parse_config_str("name: t\nkey: []\nfeatures: []\n").unwrap();
        let violations = validate_config(&config);
        assert_eq!(errors(&violations), vec!["CONFIG-002", "CONFIG-004"]);
    }

    #[test]
    fn duplicates_are_errors() {
        let config = parse_config_str(
            "name: t\nkey: [INPUT_0_MEMORY, INPUT_0_MEMORY]\nfeatures: [num_tiles, num_tiles]\n",
        )
        .unwrap();
        let violations = validate_config(&config);
        assert_eq!(errors(&violations), vec!["CONFIG-003", "CONFIG-005"]);
    }

    #[test]
    fn min_fit_rows_below_floor() {
        let config = parse_config_str(
            "name: t\nkey: [INPUT_0_MEMORY]\nfeatures: [num_tiles, core_count]\nmin_fit_rows: 2\n",
        )
        .unwrap();
        let violations = validate_config(&config);
        assert_eq!(errors(&violations), vec!["CONFIG-006"]);
        assert!(violations[0].message.contains("at least 3"));
    }

    #[test]
    fn squared_y_is_a_warning() {
        let config = parse_config_str(
            "name: t\nkey: [INPUT_0_MEMORY]\nfeatures: [num_tiles]\ntiles_formula: squared_y\n",
        )
        .unwrap();
        let violations = validate_config(&config);
        assert!(errors(&violations).is_empty());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].severity, Severity::Warning);
    }
}
