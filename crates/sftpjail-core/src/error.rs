use thiserror::Error;

/// Errors raised while loading or validating shared types and configuration
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown host key algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Unknown log format: {0}")]
    UnknownLogFormat(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
