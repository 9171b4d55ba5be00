use thiserror::Error;

/// Every way a spoofing run can fail. All variants are fatal to the run.
#[derive(Debug, Error)]
pub enum SpoofError {
    /// The input is not a valid container of its declared kind, or an insert
    /// would break one of the format's structural limits.
    #[error("format error: {0}")]
    Format(String),
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("random source failure: {0}")]
    RandomSource(String),
    #[error("rendered image changed: {0}")]
    Render(String),
    #[error("search cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },
}

impl SpoofError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        SpoofError::Format(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SpoofError>;
