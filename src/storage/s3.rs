use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::storage::{ObjectBody, ObjectClient, ObjectMetadata, ObjectReader, UploadReceipt};

/// [`ObjectClient`] backed by the AWS S3 API (or any S3-compatible service).
#[derive(Clone)]
pub struct S3Client {
    client: Client,
}

impl S3Client {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "kakaki-config",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(config.force_path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(region = %config.region, endpoint = ?config.endpoint, "S3 client initialized");

        Ok(Self {
            client: Client::from_conf(builder.build()),
        })
    }

    /// Wraps an already configured SDK client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn is_missing<E>(err: &SdkError<E, HttpResponse>, service_says_missing: impl Fn(&E) -> bool) -> bool {
    if let Some(service_err) = err.as_service_error() {
        if service_says_missing(service_err) {
            return true;
        }
    }
    // HEAD responses carry no body, so some S3-compatible services only
    // signal a missing key through the status code.
    err.raw_response()
        .is_some_and(|raw| raw.status().as_u16() == 404)
}

#[async_trait::async_trait]
impl ObjectClient for S3Client {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
    ) -> Result<UploadReceipt> {
        let body = match body {
            ObjectBody::File(file) => ByteStream::read_from()
                .file(file)
                .build()
                .await
                .map_err(|e| StoreError::Io(std::io::Error::other(e)))?,
            ObjectBody::Reader(mut reader) => {
                // A single PUT needs a sized body.
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                ByteStream::from(buf)
            }
        };

        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(StoreError::service)?;

        debug!(bucket, key, etag = ?output.e_tag(), "PutObject completed");

        Ok(UploadReceipt {
            bucket: bucket.to_string(),
            key: key.to_string(),
            etag: output.e_tag().map(str::to_string),
            version_id: output.version_id().map(str::to_string),
        })
    }

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectMetadata> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(output) => Ok(ObjectMetadata {
                key: key.to_string(),
                size: output.content_length().unwrap_or(0).max(0) as u64,
                etag: output.e_tag().map(str::to_string),
                last_modified: output.last_modified().map(|t| t.secs()),
                content_type: output.content_type().map(str::to_string),
            }),
            Err(err) if is_missing(&err, |e| e.is_not_found()) => {
                Err(StoreError::not_found(bucket, key))
            }
            Err(err) => Err(StoreError::service(err)),
        }
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectReader> {
        match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => Ok(Box::pin(output.body.into_async_read())),
            Err(err) if is_missing(&err, |e| e.is_no_such_key()) => {
                Err(StoreError::not_found(bucket, key))
            }
            Err(err) => Err(StoreError::service(err)),
        }
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(StoreError::service)?;
        Ok(())
    }
}
