// src/error.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for a generation run

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can end a generation run.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Rejected before any work starts; no output file is created.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A batch failed to generate. Fatal to the whole run, never retried.
    #[error("worker failed on batch {batch}: {reason}")]
    WorkerFailure { batch: u64, reason: String },

    /// User-initiated interruption; the partial output has been removed.
    #[error("generation cancelled")]
    Cancelled,

    /// Output is still smaller than the target after padding.
    #[error("output is {final_size} bytes, short of the {target} byte target")]
    SizeShortfall { final_size: u64, target: u64 },

    /// A CSV could not be read back (unopenable, empty, or headerless).
    #[error("cannot load {}: {reason}", path.display())]
    LoadFailure { path: PathBuf, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GenerationError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        GenerationError::InvalidConfiguration(msg.into())
    }

    /// Process exit status for this error (130 for cancellation, like SIGINT).
    pub fn exit_code(&self) -> u8 {
        match self {
            GenerationError::Cancelled => 130,
            _ => 1,
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, GenerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let errors = [
            GenerationError::invalid("columns"),
            GenerationError::WorkerFailure {
                batch: 3,
                reason: "panicked".to_string(),
            },
            GenerationError::SizeShortfall {
                final_size: 1,
                target: 2,
            },
            GenerationError::LoadFailure {
                path: PathBuf::from("x.csv"),
                reason: "file is empty".to_string(),
            },
            GenerationError::from(std::io::Error::other("disk full")),
        ];
        for err in &errors {
            assert_eq!(err.exit_code(), 1, "{}", err);
        }
        assert_eq!(GenerationError::Cancelled.exit_code(), 130);
    }

    #[test]
    fn test_messages() {
        let err = GenerationError::WorkerFailure {
            batch: 7,
            reason: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "worker failed on batch 7: boom");
        let err = GenerationError::LoadFailure {
            path: PathBuf::from("data.csv"),
            reason: "file is empty".to_string(),
        };
        assert_eq!(err.to_string(), "cannot load data.csv: file is empty");
    }
}
