use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::{Result, StoreError};
use crate::storage::{ObjectBody, ObjectClient, ObjectMetadata, ObjectReader, UploadReceipt};
use crate::utils::keys::resolve_key_path;

const COPY_CHUNK: usize = 64 * 1024;

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Filesystem-backed [`ObjectClient`].
///
/// Layout under `root`:
/// - `objects/<bucket>/<key>`: object bytes
/// - `meta/<bucket>/<key>.json`: etag record written at upload time
/// - `staging/`: uploads in flight, renamed into place once complete
#[derive(Debug, Clone)]
pub struct LocalClient {
    root: PathBuf,
    // Serializes the object rename and its record write so they land as a pair.
    commit: Arc<Mutex<()>>,
}

/// Sidecar written next to every stored object.
#[derive(Debug, Serialize, Deserialize)]
struct ObjectRecord {
    etag: String,
    size: u64,
    modified_nanos: u64,
}

impl LocalClient {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            commit: Arc::new(Mutex::new(())),
        }
    }

    fn check_bucket(bucket: &str) -> Result<()> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
            return Err(StoreError::InvalidKey(format!("bucket {:?}", bucket)));
        }
        Ok(())
    }

    fn data_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        Self::check_bucket(bucket)?;
        resolve_key_path(&self.root.join("objects").join(bucket), key)
    }

    fn meta_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        Self::check_bucket(bucket)?;
        resolve_key_path(&self.root.join("meta").join(bucket), &format!("{}.json", key))
    }

    fn staging_path(&self) -> PathBuf {
        let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
        self.root
            .join("staging")
            .join(format!("{}-{}.part", std::process::id(), seq))
    }

    /// Reads the sidecar etag if it still describes the file on disk.
    async fn recorded_etag(&self, meta_path: &Path, size: u64, modified_nanos: u64) -> Option<String> {
        let raw = fs::read(meta_path).await.ok()?;
        let record: ObjectRecord = serde_json::from_slice(&raw).ok()?;
        (record.size == size && record.modified_nanos == modified_nanos).then_some(record.etag)
    }
}

fn modified_nanos(meta: &std::fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_nanos() as u64)
}

async fn digest_file(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; COPY_CHUNK];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn missing_or_io(err: std::io::Error, bucket: &str, key: &str) -> StoreError {
    if err.kind() == ErrorKind::NotFound {
        StoreError::not_found(bucket, key)
    } else {
        StoreError::service(err)
    }
}

/// Copies `body` into a fresh file at `path`, hashing as it goes.
///
/// Failing to read the body is [`StoreError::Io`]; failing to write the
/// store is [`StoreError::Service`].
async fn write_staged<R: AsyncRead + Unpin + ?Sized>(
    body: &mut R,
    path: &Path,
) -> Result<(String, std::fs::Metadata)> {
    let mut file = fs::File::create(path).await.map_err(StoreError::service)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; COPY_CHUNK];

    loop {
        let n = body.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        file.write_all(&buf[..n]).await.map_err(StoreError::service)?;
    }

    file.flush().await.map_err(StoreError::service)?;
    file.sync_all().await.map_err(StoreError::service)?;
    let meta = file.metadata().await.map_err(StoreError::service)?;
    Ok((hex::encode(hasher.finalize()), meta))
}

async fn write_record(staging: PathBuf, target: &Path, record: &ObjectRecord) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await.map_err(StoreError::service)?;
    }
    let json = serde_json::to_vec(record).map_err(StoreError::service)?;
    fs::write(&staging, json).await.map_err(StoreError::service)?;
    if let Err(e) = fs::rename(&staging, target).await {
        let _ = fs::remove_file(&staging).await;
        return Err(StoreError::service(e));
    }
    Ok(())
}

#[async_trait::async_trait]
impl ObjectClient for LocalClient {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
    ) -> Result<UploadReceipt> {
        let path = self.data_path(bucket, key)?;
        let meta_path = self.meta_path(bucket, key)?;
        let staging = self.staging_path();

        fs::create_dir_all(self.root.join("staging")).await.map_err(StoreError::service)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(StoreError::service)?;
        }

        // The live object is only replaced by a complete, synced file.
        let written = match body {
            ObjectBody::File(mut file) => write_staged(&mut file, &staging).await,
            ObjectBody::Reader(mut reader) => write_staged(&mut reader, &staging).await,
        };
        let (etag, meta) = match written {
            Ok(done) => done,
            Err(e) => {
                let _ = fs::remove_file(&staging).await;
                return Err(e);
            }
        };
        let _commit = self.commit.lock().await;
        if let Err(e) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(StoreError::service(e));
        }

        let record = ObjectRecord {
            etag: etag.clone(),
            size: meta.len(),
            modified_nanos: modified_nanos(&meta),
        };
        write_record(self.staging_path(), &meta_path, &record).await?;

        Ok(UploadReceipt {
            bucket: bucket.to_string(),
            key: key.to_string(),
            etag: Some(etag),
            version_id: None,
        })
    }

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectMetadata> {
        let path = self.data_path(bucket, key)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| missing_or_io(e, bucket, key))?;
        if !meta.is_file() {
            return Err(StoreError::not_found(bucket, key));
        }

        let nanos = modified_nanos(&meta);
        let etag = match self.recorded_etag(&self.meta_path(bucket, key)?, meta.len(), nanos).await {
            Some(etag) => etag,
            // Written outside the client or raced by a newer upload.
            None => digest_file(&path).await.map_err(StoreError::service)?,
        };

        Ok(ObjectMetadata {
            key: key.to_string(),
            size: meta.len(),
            etag: Some(etag),
            last_modified: (nanos > 0).then(|| (nanos / 1_000_000_000) as i64),
            content_type: None,
        })
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectReader> {
        let path = self.data_path(bucket, key)?;
        let file = fs::File::open(&path)
            .await
            .map_err(|e| missing_or_io(e, bucket, key))?;
        Ok(Box::pin(file))
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<()> {
        let path = self.data_path(bucket, key)?;
        let meta_path = self.meta_path(bucket, key)?;
        for target in [&path, &meta_path] {
            match fs::remove_file(target).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::service(e)),
            }
        }
        Ok(())
    }
}
