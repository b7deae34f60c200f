use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::error::{Result, StoreError};

const COPY_CHUNK: usize = 64 * 1024;

/// Drain `reader` into a newly created (or truncated) file at `path`.
///
/// Read failures come back as [`StoreError::Service`], anything the local
/// filesystem refuses as [`StoreError::Write`]. Returns the bytes written.
pub async fn pipe_to_file<R: AsyncRead + Unpin + ?Sized>(
    reader: &mut R,
    path: &Path,
) -> Result<u64> {
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let mut file = fs::File::create(path).await.map_err(write_err)?;

    let mut buf = vec![0u8; COPY_CHUNK];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await.map_err(StoreError::service)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).await.map_err(write_err)?;
        total += n as u64;
    }

    file.flush().await.map_err(write_err)?;
    file.sync_all().await.map_err(write_err)?;
    Ok(total)
}
