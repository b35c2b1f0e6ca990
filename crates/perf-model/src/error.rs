use thiserror::Error;

#[derive(Debug, Error)]
pub enum PerfModelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Missing required column(s) in {source_name}: {}", columns.join(", "))]
    MissingColumns {
        source_name: String,
        columns: Vec<String>,
    },

    #[error("Unfittable: {reason}")]
    Unfittable { key: String, reason: String },

    #[error("No coefficients for key {key}")]
    UnknownKey { key: String },

    #[error("{failures} benchmark(s) failed comparison against goldens")]
    RegressionFailed { failures: usize },
}

impl PerfModelError {
    /// Process exit code for this error: 2 for filesystem failures, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io(_) => 2,
            Self::Csv(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => 2,
            _ => 1,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

pub type Result<T> = std::result::Result<T, PerfModelError>;

/// A non-fatal finding attached to a pipeline run.
#[derive(Debug, Clone)]
pub struct Violation {
    pub severity: Severity,
    pub rule: String,
    pub message: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Violation {
    pub fn unfittable(key: &str, reason: &str) -> Self {
        Self {
            severity: Severity::Warning,
            rule: "UNFITTABLE".to_string(),
            message: format!("group {key} excluded: {reason}"),
            location: Some(key.to_string()),
        }
    }

    pub fn ill_conditioned(key: &str, reason: &str) -> Self {
        Self {
            severity: Severity::Warning,
            rule: "ILL-CONDITIONED".to_string(),
            message: format!("group {key} excluded: {reason}"),
            location: Some(key.to_string()),
        }
    }

    pub fn unknown_key(key: &str, rows: usize) -> Self {
        Self {
            severity: Severity::Warning,
            rule: "UNKNOWN-KEY".to_string(),
            message: format!("{rows} row(s) with key {key} have no coefficients"),
            location: Some(key.to_string()),
        }
    }
}

impl Violation {
    /// The error a strict run raises for this diagnostic.
    pub fn to_error(&self) -> PerfModelError {
        let key = self.location.clone().unwrap_or_default();
        match self.rule.as_str() {
            "UNKNOWN-KEY" => PerfModelError::UnknownKey { key },
            "UNFITTABLE" | "ILL-CONDITIONED" => PerfModelError::Unfittable {
                key,
                reason: self.message.clone(),
            },
            _ => PerfModelError::InvalidInput(self.message.clone()),
        }
    }
}

/// Fail with the first diagnostic, if any.
pub fn ensure_no_diagnostics(diagnostics: &[Violation]) -> Result<()> {
    match diagnostics.first() {
        Some(v) => Err(v.to_error()),
        None => Ok(()),
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN",
            Severity::Info => "INFO",
        };
        write!(f, "[{prefix}] {}: {}", self.rule, self.message)
    }
}
