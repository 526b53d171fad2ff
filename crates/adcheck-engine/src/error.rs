use thiserror::Error;

/// Load-time failures. Matching itself never returns an error.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to read {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("Failed to parse {what}: {message}")]
    ParseError { what: &'static str, message: String },

    #[error("Invalid rule database: {0}")]
    InvalidRuleDatabase(String),

    #[error("Invalid placeholder table: {0}")]
    InvalidPlaceholders(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    pub(crate) fn read(path: &std::path::Path, err: std::io::Error) -> Self {
        EngineError::ReadError {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn parse(what: &'static str, err: serde_json::Error) -> Self {
        EngineError::ParseError {
            what,
            message: err.to_string(),
        }
    }
}
