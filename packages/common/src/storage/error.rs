use std::fmt;

/// Errors that can occur during object storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// No object exists under the given bucket and key.
    NotFound { bucket: String, key: String },
    /// The bucket or key contains path components the store refuses.
    InvalidKey(String),
    /// The checksum string is not a valid SHA-256 hex digest.
    InvalidChecksum(String),
    /// The backend is unreachable or failed mid-operation. Transient by policy.
    Unavailable(std::io::Error),
}

impl StorageError {
    /// Whether callers may retry the operation.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { bucket, key } => write!(f, "object not found: {bucket}/{key}"),
            Self::InvalidKey(msg) => write!(f, "invalid object key: {msg}"),
            Self::InvalidChecksum(msg) => write!(f, "invalid checksum: {msg}"),
            Self::Unavailable(err) => write!(f, "object store unavailable: {err}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Unavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Unavailable(err)
    }
}
