//! Remote object-store capability.
//!
//! The service orchestrates a remote store through [`ObjectStoreClient`];
//! the wire protocol (transport, signing, authentication) is the client's
//! concern. [`S3Remote`] adapts any S3-compatible store, and
//! [`InMemoryRemote`] stands in for tests and local development.

use std::fmt::Debug;

use bytes::Bytes;
use serde::Serialize;

use crate::error::Result;
use crate::stream::PayloadStream;

mod in_memory;
mod s3;

pub use self::in_memory::InMemoryRemote;
pub use self::s3::{S3Remote, S3RemoteConfig};

/// A boxed remote client, as held by the tiered store.
pub type BoxedClient = Box<dyn ObjectStoreClient>;

/// Opaque identifier of an in-flight multipart session.
pub type UploadId = String;

/// Integrity token returned by the store for a successfully uploaded part.
pub type ETag = String;

/// A part that the store has acknowledged, ready for session commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedPart {
    /// 1-based part number, assigned in byte-offset order.
    pub part_number: u32,
    /// The ETag the store returned for this part.
    pub etag: ETag,
}

/// One entry of a remote listing.
#[derive(Clone, Debug, Serialize)]
pub struct RemoteObject {
    /// Full object key, including any folder prefix.
    pub key: String,
    /// Stored size in bytes.
    pub size: u64,
}

/// Remote store operations consumed by the service core.
///
/// All keys are addressed within the single bucket the client was
/// constructed for.
#[async_trait::async_trait]
pub trait ObjectStoreClient: Debug + Send + Sync + 'static {
    /// Short name of the client implementation, for logging.
    fn name(&self) -> &'static str;

    /// The bucket this client is bound to.
    fn bucket(&self) -> String;

    /// Returns whether the bucket exists and is accessible.
    async fn head_bucket(&self) -> Result<bool>;

    /// Creates the bucket.
    async fn create_bucket(&self) -> Result<()>;

    /// Stores or overwrites a whole object in one call.
    async fn put_object(&self, key: &str, body: Bytes) -> Result<()>;

    /// Streams the object at `key`, or `None` if it does not exist.
    async fn get_object(&self, key: &str) -> Result<Option<PayloadStream>>;

    /// Lists objects under the given key prefix.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<RemoteObject>>;

    /// Deletes the object at `key`. Deleting an absent key succeeds.
    async fn delete_object(&self, key: &str) -> Result<()>;

    /// Opens a multipart session for `key`.
    async fn create_multipart_upload(&self, key: &str) -> Result<UploadId>;

    /// Uploads one part of an open session and returns its ETag.
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<ETag>;

    /// Commits a session from the given part list, which must be sorted
    /// ascending by part number.
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<()>;

    /// Aborts a session, discarding all uploaded parts.
    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<()>;

    /// Part listing for post-abort diagnostics.
    ///
    /// Optional capability: clients without support report `Ok(None)`, and
    /// callers must not rely on it for correctness.
    async fn list_parts(&self, _key: &str, _upload_id: &str) -> Result<Option<Vec<CompletedPart>>> {
        Ok(None)
    }
}
