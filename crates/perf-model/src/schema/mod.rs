mod config;
mod parser;
mod types;
mod validator;

pub use config::{PipelineConfig, SolverKind, parse_config, parse_config_str, resolve_config};
pub use parser::{HOST_ROW_PREFIX, parse_count, parse_measurements_str, read_measurements};
pub use types::*;
pub use validator::validate_config;
