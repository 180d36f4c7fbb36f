//! Error types for the blob store

use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    /// The key contains characters that are not safe to embed in a path.
    InvalidKey(String),
    /// An entry for this key already exists; entries are never overwritten.
    AlreadyExists,
    /// No entry exists for this key.
    NotFound,
    /// The payload ended before the declared length was reached.
    Truncated { expected: u64, actual: u64 },
    Io(std::io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::InvalidKey(msg) => write!(f, "Invalid cache key: {}", msg),
            StoreError::AlreadyExists => write!(f, "Entry already exists"),
            StoreError::NotFound => write!(f, "Entry not found"),
            StoreError::Truncated { expected, actual } => write!(
                f,
                "Payload truncated: declared {} bytes, received {}",
                expected, actual
            ),
            StoreError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
