use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Boxed error coming back from the storage client, kept as-is.
pub type ServiceError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug)]
pub enum StoreError {
    /// Configuration could not be read, parsed or validated.
    Config(String),
    NotFound { bucket: String, key: String },
    /// Transport, auth or server-side failure reported by the store.
    Service(ServiceError),
    /// Local read failure, e.g. opening an upload source.
    Io(std::io::Error),
    /// Local write failure while saving a download.
    Write { path: PathBuf, source: std::io::Error },
    /// Key cannot be mapped onto a path inside the output directory.
    InvalidKey(String),
}

impl StoreError {
    pub fn not_found(bucket: &str, key: &str) -> Self {
        StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub fn service<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Service(Box::new(err))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Config(msg) =>
                write!(f, "invalid configuration: {}", msg),
            StoreError::NotFound { bucket, key } =>
                write!(f, "object not found: {}/{}", bucket, key),
            StoreError::Service(e) =>
                write!(f, "storage service error: {}", e),
            StoreError::Io(e) =>
                write!(f, "local i/o error: {}", e),
            StoreError::Write { path, source } =>
                write!(f, "failed to write {}: {}", path.display(), source),
            StoreError::InvalidKey(key) =>
                write!(f, "key cannot be used as a local path: {}", key),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Service(e) => Some(e.as_ref()),
            StoreError::Io(e) => Some(e),
            StoreError::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}
