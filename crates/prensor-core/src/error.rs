use thiserror::Error;

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid path step: {0}")]
    PathFormat(String),

    #[error("missing path: {0}")]
    MissingPath(String),

    #[error("path already set: {0}")]
    DuplicatePath(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("no root found: {0}")]
    MissingRoot(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal invariant failed: {0}")]
    Invariant(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}
