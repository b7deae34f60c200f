//! Thin async facade over S3-style object storage.
//!
//! [`ObjectStore`] exposes upload, download (to a reader or a file),
//! existence and metadata checks, and delete against any [`ObjectClient`].
//! [`S3Client`] talks to AWS S3 or a compatible service; [`LocalClient`]
//! keeps objects on the local filesystem.

pub mod config;
pub mod error;
pub mod storage;
pub mod store;
pub mod utils;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use storage::{
    LocalClient, ObjectBody, ObjectClient, ObjectMetadata, ObjectReader, S3Client, UploadReceipt,
};
pub use store::{ObjectStore, UploadInput};
