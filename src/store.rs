use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::storage::{
    ObjectBody, ObjectClient, ObjectMetadata, ObjectReader, S3Client, UploadReceipt,
};
use crate::utils::{io::pipe_to_file, keys::resolve_key_path};

/// What to upload: a file on disk or an already open reader.
pub enum UploadInput {
    /// Opened by the store for the duration of the upload.
    Path(PathBuf),
    /// Consumed and dropped by the store once the upload finishes.
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl UploadInput {
    pub fn reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        UploadInput::Reader(Box::new(reader))
    }
}

impl From<PathBuf> for UploadInput {
    fn from(path: PathBuf) -> Self {
        UploadInput::Path(path)
    }
}

impl From<&Path> for UploadInput {
    fn from(path: &Path) -> Self {
        UploadInput::Path(path.to_path_buf())
    }
}

impl From<&str> for UploadInput {
    fn from(path: &str) -> Self {
        UploadInput::Path(PathBuf::from(path))
    }
}

impl From<tokio::fs::File> for UploadInput {
    fn from(file: tokio::fs::File) -> Self {
        UploadInput::reader(file)
    }
}

/// Six-operation facade over a bucket/key object store.
///
/// Cloning is cheap and every clone shares the same client.
pub struct ObjectStore<C: ObjectClient = S3Client> {
    client: Arc<C>,
}

impl<C: ObjectClient> Clone for ObjectStore<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl ObjectStore<S3Client> {
    /// Loads credentials from `config_path` and connects an S3 client.
    pub fn from_config_file(config_path: impl AsRef<Path>) -> Result<Self> {
        let config = StoreConfig::load(config_path)?;
        Self::from_config(&config)
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Ok(Self::new(S3Client::new(config)?))
    }
}

impl<C: ObjectClient> ObjectStore<C> {
    pub fn new(client: C) -> Self {
        Self::with_shared(Arc::new(client))
    }

    pub fn with_shared(client: Arc<C>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Creates or overwrites `bucket/key` with the bytes of `input`.
    ///
    /// A path input is opened first; if that fails nothing is sent.
    pub async fn upload(
        &self,
        input: impl Into<UploadInput>,
        key: &str,
        bucket: &str,
    ) -> Result<UploadReceipt> {
        let body = match input.into() {
            UploadInput::Path(path) => {
                let file = tokio::fs::File::open(&path).await.map_err(|e| {
                    debug!(path = %path.display(), error = %e, "Cannot open upload source");
                    StoreError::Io(e)
                })?;
                ObjectBody::File(file)
            }
            UploadInput::Reader(reader) => ObjectBody::Reader(reader),
        };

        debug!(bucket, key, "Uploading object");
        let receipt = self.client.put_object(bucket, key, body).await?;
        info!(bucket, key, etag = ?receipt.etag, "Object uploaded");
        Ok(receipt)
    }

    /// Head request; a missing object is [`StoreError::NotFound`].
    pub async fn file_info(&self, key: &str, bucket: &str) -> Result<ObjectMetadata> {
        self.client.head_object(bucket, key).await
    }

    /// False only when the store reports the object as missing.
    ///
    /// Any other failure of the metadata lookup reads as `true`, so callers
    /// such as [`ObjectStore::download_to_stream`] go on to hit the real
    /// error. Use [`ObjectStore::try_exists`] to see it directly.
    pub async fn file_exists(&self, key: &str, bucket: &str) -> bool {
        match self.file_info(key, bucket).await {
            Ok(_) => true,
            Err(StoreError::NotFound { .. }) => false,
            Err(e) => {
                warn!(bucket, key, error = %e, "Existence check failed, not treating object as absent");
                true
            }
        }
    }

    /// Like [`ObjectStore::file_exists`] but failures other than a missing
    /// object are returned instead of read as `true`.
    pub async fn try_exists(&self, key: &str, bucket: &str) -> Result<bool> {
        match self.file_info(key, bucket).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Opens the object body for reading. The caller owns the reader.
    ///
    /// Fails with [`StoreError::NotFound`] when [`ObjectStore::file_exists`]
    /// says no; a failed lookup falls through to the body request and its
    /// error is returned. Errors in the body itself surface while reading.
    pub async fn download_to_stream(&self, key: &str, bucket: &str) -> Result<ObjectReader> {
        if !self.file_exists(key, bucket).await {
            return Err(StoreError::not_found(bucket, key));
        }
        self.client.get_object(bucket, key).await
    }

    /// Saves the object to `output_dir/key` and returns that path.
    ///
    /// Keys that would resolve outside `output_dir` are refused before
    /// anything is fetched. Parent directories of nested keys are created.
    pub async fn download_to_file(
        &self,
        key: &str,
        bucket: &str,
        output_dir: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let target = resolve_key_path(output_dir.as_ref(), key)?;

        let mut reader = self.download_to_stream(key, bucket).await?;
        let written = pipe_to_file(&mut reader, &target).await?;

        info!(bucket, key, path = %target.display(), bytes = written, "Object downloaded");
        Ok(target)
    }

    /// Deletes `bucket/key`; deleting a missing key is left to the store.
    pub async fn delete_file(&self, key: &str, bucket: &str) -> Result<()> {
        self.client.delete_object(bucket, key).await?;
        info!(bucket, key, "Object deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalClient;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::AsyncReadExt;

    const BUCKET: &str = "media";

    /// Client whose every call fails with a transport-style error.
    #[derive(Default)]
    struct Unreachable {
        calls: AtomicUsize,
    }

    impl Unreachable {
        fn fail<T>(&self) -> Result<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::service(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )))
        }
    }

    #[async_trait::async_trait]
    impl ObjectClient for Unreachable {
        async fn put_object(&self, _: &str, _: &str, _: ObjectBody) -> Result<UploadReceipt> {
            self.fail()
        }
        async fn head_object(&self, _: &str, _: &str) -> Result<ObjectMetadata> {
            self.fail()
        }
        async fn get_object(&self, _: &str, _: &str) -> Result<ObjectReader> {
            self.fail()
        }
        async fn delete_object(&self, _: &str, _: &str) -> Result<()> {
            self.fail()
        }
    }

    fn local_store() -> (tempfile::TempDir, ObjectStore<LocalClient>) {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(LocalClient::new(dir.path().join("store")));
        (dir, store)
    }

    async fn read_all(mut reader: ObjectReader) -> Vec<u8> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn unknown_keys_do_not_exist() {
        let (_dir, store) = local_store();

        assert!(!store.file_exists("never-written", BUCKET).await);
        assert!(store.file_info("never-written", BUCKET).await.unwrap_err().is_not_found());
        assert!(!store.try_exists("never-written", BUCKET).await.unwrap());
    }

    #[tokio::test]
    async fn upload_then_stream_back() {
        let (_dir, store) = local_store();
        let content = b"\x00binary\xffpayload\n".to_vec();

        let receipt = store
            .upload(UploadInput::reader(std::io::Cursor::new(content.clone())), "blob.bin", BUCKET)
            .await
            .unwrap();
        assert_eq!(receipt.key, "blob.bin");

        assert!(store.file_exists("blob.bin", BUCKET).await);
        let info = store.file_info("blob.bin", BUCKET).await.unwrap();
        assert_eq!(info.size, content.len() as u64);

        let reader = store.download_to_stream("blob.bin", BUCKET).await.unwrap();
        assert_eq!(read_all(reader).await, content);
    }

    #[tokio::test]
    async fn path_and_reader_uploads_match() {
        let (dir, store) = local_store();
        let source = dir.path().join("source.txt");
        std::fs::write(&source, b"same bytes either way").unwrap();

        store.upload(source.as_path(), "by-path", BUCKET).await.unwrap();
        let file = tokio::fs::File::open(&source).await.unwrap();
        store.upload(file, "by-reader", BUCKET).await.unwrap();

        let by_path = read_all(store.download_to_stream("by-path", BUCKET).await.unwrap()).await;
        let by_reader = read_all(store.download_to_stream("by-reader", BUCKET).await.unwrap()).await;
        assert_eq!(by_path, by_reader);
        assert_eq!(
            store.file_info("by-path", BUCKET).await.unwrap().etag,
            store.file_info("by-reader", BUCKET).await.unwrap().etag
        );
    }

    #[tokio::test]
    async fn missing_source_file_uploads_nothing() {
        let client = Arc::new(Unreachable::default());
        let store = ObjectStore::with_shared(Arc::clone(&client));

        let err = store
            .upload("/definitely/not/here.txt", "k", BUCKET)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn file_exists_only_says_no_for_missing_objects() {
        let store = ObjectStore::new(Unreachable::default());

        // A transport failure is not evidence of absence.
        assert!(store.file_exists("k", BUCKET).await);

        let err = store.try_exists("k", BUCKET).await.unwrap_err();
        assert!(matches!(err, StoreError::Service(_)));
        let err = store.file_info("k", BUCKET).await.unwrap_err();
        assert!(matches!(err, StoreError::Service(_)));
    }

    #[tokio::test]
    async fn download_to_stream_surfaces_the_real_failure() {
        let store = ObjectStore::new(Unreachable::default());

        let err = store.download_to_stream("k", BUCKET).await.err().unwrap();
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "storage service error: connection refused");
        // Existence check, then the body request.
        assert_eq!(store.client().calls.load(Ordering::SeqCst), 2);

        let dir = tempfile::tempdir().unwrap();
        let err = store.download_to_file("k", BUCKET, dir.path()).await.unwrap_err();
        assert!(matches!(err, StoreError::Service(_)));
        assert!(!dir.path().join("k").exists());
    }

    #[tokio::test]
    async fn store_errors_pass_through_unchanged() {
        let store = ObjectStore::new(Unreachable::default());

        let err = store.upload(UploadInput::reader(&b"x"[..]), "k", BUCKET).await.unwrap_err();
        assert_eq!(err.to_string(), "storage service error: connection refused");
        assert!(matches!(store.delete_file("k", BUCKET).await, Err(StoreError::Service(_))));
    }

    #[tokio::test]
    async fn download_to_file_writes_joined_path() {
        let (dir, store) = local_store();
        let out = dir.path().join("out");

        store
            .upload(UploadInput::reader(&b"nested content"[..]), "reports/2024/q1.csv", BUCKET)
            .await
            .unwrap();

        let path = store.download_to_file("reports/2024/q1.csv", BUCKET, &out).await.unwrap();
        assert_eq!(path, out.join("reports/2024/q1.csv"));
        assert_eq!(std::fs::read(&path).unwrap(), b"nested content");
    }

    #[tokio::test]
    async fn download_to_file_propagates_not_found() {
        let (dir, store) = local_store();

        let err = store.download_to_file("absent.txt", BUCKET, dir.path()).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!dir.path().join("absent.txt").exists());
    }

    #[tokio::test]
    async fn download_to_file_refuses_traversal_keys() {
        let client = Arc::new(Unreachable::default());
        let store = ObjectStore::with_shared(Arc::clone(&client));
        let dir = tempfile::tempdir().unwrap();

        let err = store.download_to_file("../escape.txt", BUCKET, dir.path()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn download_to_file_reports_write_failures() {
        let (dir, store) = local_store();
        store.upload(UploadInput::reader(&b"data"[..]), "k.txt", BUCKET).await.unwrap();

        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let err = store.download_to_file("k.txt", BUCKET, &blocker).await.unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
    }

    #[tokio::test]
    async fn delete_removes_and_is_idempotent() {
        let (_dir, store) = local_store();
        store.upload(UploadInput::reader(&b"bye"[..]), "gone.txt", BUCKET).await.unwrap();

        store.delete_file("gone.txt", BUCKET).await.unwrap();
        assert!(!store.file_exists("gone.txt", BUCKET).await);
        store.delete_file("gone.txt", BUCKET).await.unwrap();
    }

    #[tokio::test]
    async fn clones_share_one_client_across_tasks() {
        let (_dir, store) = local_store();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("concurrent-{}.txt", i);
                let body = format!("payload {}", i).into_bytes();
                store.upload(UploadInput::reader(std::io::Cursor::new(body)), &key, BUCKET).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for i in 0..8 {
            assert!(store.file_exists(&format!("concurrent-{}.txt", i), BUCKET).await);
        }
    }
}
