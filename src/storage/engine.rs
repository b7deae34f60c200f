use async_trait::async_trait;

use crate::error::Result;
use crate::storage::{ObjectBody, ObjectMetadata, ObjectReader, UploadReceipt};

/// Primitive operations of a bucket/key object store.
///
/// `head_object` must report a missing object as
/// [`StoreError::NotFound`](crate::error::StoreError::NotFound); everything
/// else the backend fails with is passed through untouched.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
    ) -> Result<UploadReceipt>;

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectMetadata>;

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectReader>;

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<()>;
}
