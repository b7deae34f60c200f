use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Readable object body handed to callers. The caller owns it.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Attributes reported by the store for one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub key: String,
    pub size: u64,
    pub etag: Option<String>,
    /// Unix seconds.
    pub last_modified: Option<i64>,
    pub content_type: Option<String>,
}

/// Acknowledgement returned after a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub bucket: String,
    pub key: String,
    pub etag: Option<String>,
    pub version_id: Option<String>,
}

/// Bytes handed to [`ObjectClient::put_object`](crate::storage::ObjectClient::put_object).
pub enum ObjectBody {
    /// A local file already opened by the facade.
    File(tokio::fs::File),
    /// Any other reader supplied by the caller.
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectBody::File(file) => f.debug_tuple("File").field(file).finish(),
            ObjectBody::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}
