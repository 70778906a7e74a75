//! S3-compatible remote store client.

use std::fmt;

use bytes::Bytes;
use futures_util::StreamExt;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::request::ResponseData;
use s3::{Bucket, BucketConfiguration, Region};

use super::{CompletedPart, ETag, ObjectStoreClient, RemoteObject, UploadId};
use crate::error::{Error, Result};
use crate::stream::PayloadStream;

/// Content type recorded for sealed artifacts in the remote store.
const SEALED_CONTENT_TYPE: &str = "application/octet-stream";

/// Connection parameters for an S3-compatible store.
#[derive(Clone, Debug)]
pub struct S3RemoteConfig {
    /// The bucket all keys are addressed in.
    pub bucket: String,
    /// Region name; also used to derive the default AWS endpoint.
    pub region: String,
    /// Custom endpoint URL, e.g. for MinIO or SeaweedFS.
    pub endpoint: Option<String>,
    /// Use path-style bucket addressing instead of virtual hosts.
    pub path_style: bool,
}

/// [`ObjectStoreClient`] for any S3-compatible store.
///
/// Credentials are taken from the standard AWS environment (environment
/// variables, profile, or instance metadata).
pub struct S3Remote {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
}

impl S3Remote {
    /// Creates a client bound to the configured bucket.
    pub fn new(config: S3RemoteConfig) -> Result<Self> {
        let credentials = Credentials::default().map_err(Error::transport)?;
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: match config.endpoint {
                Some(endpoint) => endpoint,
                None => format!("https://s3.{}.amazonaws.com", config.region),
            },
        };

        let mut bucket =
            Bucket::new(&config.bucket, region.clone(), credentials.clone()).map_err(Error::transport)?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self {
            bucket,
            region,
            credentials,
        })
    }
}

impl fmt::Debug for S3Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Remote")
            .field("bucket", &self.bucket.name())
            .field("endpoint", &self.bucket.host())
            .finish_non_exhaustive()
    }
}

/// Some store frontends report request failures in the response status
/// rather than as an `Err`; normalize both into a transport error.
fn ensure_success(response: &ResponseData, operation: &str) -> Result<()> {
    let status = response.status_code();
    if (200..300).contains(&status) {
        return Ok(());
    }
    Err(Error::Transport(
        format!("{operation} returned HTTP {status}").into(),
    ))
}

#[async_trait::async_trait]
impl ObjectStoreClient for S3Remote {
    fn name(&self) -> &'static str {
        "s3-compatible"
    }

    fn bucket(&self) -> String {
        self.bucket.name()
    }

    async fn head_bucket(&self) -> Result<bool> {
        self.bucket.exists().await.map_err(Error::transport)
    }

    async fn create_bucket(&self) -> Result<()> {
        Bucket::create(
            &self.bucket.name(),
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await
        .map_err(Error::transport)?;
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip_all, fields(%key))]
    async fn put_object(&self, key: &str, body: Bytes) -> Result<()> {
        tracing::debug!("writing object to the s3-compatible store");
        let response = self
            .bucket
            .put_object(key, &body)
            .await
            .map_err(Error::transport)?;
        ensure_success(&response, "put_object")
    }

    #[tracing::instrument(level = "trace", skip_all, fields(%key))]
    async fn get_object(&self, key: &str) -> Result<Option<PayloadStream>> {
        tracing::debug!("reading object from the s3-compatible store");
        let response = match self.bucket.get_object(key).await {
            Ok(response) if response.status_code() == 404 => return Ok(None),
            Ok(response) => {
                ensure_success(&response, "get_object")?;
                response
            }
            Err(S3Error::HttpFailWithBody(404, _)) => return Ok(None),
            Err(err) => return Err(Error::transport(err)),
        };

        let bytes = Bytes::from(response.to_vec());
        Ok(Some(tokio_stream::once(Ok(bytes)).boxed()))
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<RemoteObject>> {
        let pages = self
            .bucket
            .list(prefix.to_owned(), None)
            .await
            .map_err(Error::transport)?;

        Ok(pages
            .into_iter()
            .flat_map(|page| page.contents)
            .map(|object| RemoteObject {
                key: object.key,
                size: object.size,
            })
            .collect())
    }

    #[tracing::instrument(level = "trace", skip_all, fields(%key))]
    async fn delete_object(&self, key: &str) -> Result<()> {
        tracing::debug!("deleting object from the s3-compatible store");
        self.bucket
            .delete_object(key)
            .await
            .map_err(Error::transport)?;
        Ok(())
    }

    async fn create_multipart_upload(&self, key: &str) -> Result<UploadId> {
        let response = self
            .bucket
            .initiate_multipart_upload(key, SEALED_CONTENT_TYPE)
            .await
            .map_err(Error::transport)?;
        Ok(response.upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<ETag> {
        let part = self
            .bucket
            .put_multipart_chunk(
                body.to_vec(),
                key,
                part_number,
                upload_id,
                SEALED_CONTENT_TYPE,
            )
            .await
            .map_err(Error::transport)?;
        Ok(part.etag)
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<()> {
        let parts = parts
            .iter()
            .map(|part| s3::serde_types::Part {
                etag: part.etag.clone(),
                part_number: part.part_number,
            })
            .collect();

        self.bucket
            .complete_multipart_upload(key, upload_id, parts)
            .await
            .map_err(Error::transport)?;
        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<()> {
        self.bucket
            .abort_upload(key, upload_id)
            .await
            .map_err(Error::transport)?;
        Ok(())
    }
}
