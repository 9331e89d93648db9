//! Crate-wide error type

use thiserror::Error;

/// Errors surfaced by training, IO, and configuration
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("data error: {0}")]
    Data(String),

    /// Validation AUC is undefined when the validation set contains a single
    /// class. Silently reporting a default score would corrupt model
    /// selection, so this is fatal for the run.
    #[error("validation AUC undefined: {0}")]
    UndefinedAuc(String),
}

/// Result type for culpar operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config("missing field".to_string());
        assert!(format!("{err}").contains("config error"));

        let err = Error::UndefinedAuc("1 class present".to_string());
        assert!(format!("{err}").contains("AUC undefined"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
