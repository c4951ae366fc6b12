use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Parse error on line {line}: {reason}")]
    Parse { line: u64, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Internal pipeline error: {0}")]
    Internal(String),

    #[error("Processing aborted after a failure elsewhere in the pipeline")]
    Aborted,

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ProcessingError {
    pub fn parse(line: u64, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }

    /// True for the secondary error raised by components that stopped because
    /// some other component failed first.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}
