//! Error types for the QR batch generator

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenError {
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Failed to encode QR code: {0}")]
    EncodeError(String),

    #[error("Failed to load logo {}: {reason}", .path.display())]
    LogoError { path: PathBuf, reason: String },

    #[error("I/O error on {}: {source}", .path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write JPEG {}: {reason}", .path.display())]
    WriteError { path: PathBuf, reason: String },

    #[error("Worker pool is shut down")]
    PoolClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GenError {
    /// Process exit code for an error that ends the run.
    pub fn exit_code(&self) -> i32 {
        match self {
            GenError::ConfigError(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_exits_with_two() {
        let err = GenError::ConfigError("worker count must be greater than 0".to_string());
        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            err.to_string(),
            "Invalid configuration: worker count must be greater than 0"
        );
    }

    #[test]
    fn test_io_error_mentions_path() {
        let err = GenError::IoError {
            path: PathBuf::from("out/output_1_500"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("out/output_1_500"));
    }
}
