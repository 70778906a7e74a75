//! In-memory remote store for tests and local development.
//!
//! Backed by a `HashMap` behind a mutex, removing the need for a live
//! S3-compatible store in unit tests. The client is [`Clone`] so tests can
//! hold a handle for direct inspection while the service owns a boxed copy.
//! Multipart sessions are tracked explicitly, and failures can be injected
//! per part number or per operation to exercise retry and abort paths.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;

use super::{CompletedPart, ETag, ObjectStoreClient, RemoteObject, UploadId};
use crate::error::{Error, Result};
use crate::stream::PayloadStream;

#[derive(Debug)]
struct Session {
    key: String,
    parts: HashMap<u32, (ETag, Bytes)>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: HashMap<String, Bytes>,
    sessions: HashMap<UploadId, Session>,
    next_upload_id: u64,
    committed: u64,
    aborted: u64,
    get_calls: u64,

    // Failure injection state.
    part_failures: HashMap<u32, u32>,
    part_delays: HashMap<u32, Duration>,
    failing_deletes: HashSet<String>,
    fail_complete: bool,
}

/// A cloneable, inspectable [`ObjectStoreClient`] backed by process memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRemote {
    bucket: String,
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryRemote {
    /// Creates an empty store for the given bucket name.
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_owned(),
            inner: Arc::default(),
        }
    }

    /// Returns a clone of the stored bytes, if present.
    pub fn get_stored(&self, key: &str) -> Option<Bytes> {
        self.inner.lock().unwrap().objects.get(key).cloned()
    }

    /// Returns `true` if the store contains an entry for the given key.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().unwrap().objects.contains_key(key)
    }

    /// Returns `true` if the store has no objects.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().objects.is_empty()
    }

    /// Seeds an object directly, bypassing the client interface.
    pub fn insert_raw(&self, key: &str, bytes: Bytes) {
        self.inner
            .lock()
            .unwrap()
            .objects
            .insert(key.to_owned(), bytes);
    }

    /// The number of multipart sessions still open.
    pub fn open_sessions(&self) -> usize {
        self.inner.lock().unwrap().sessions.len()
    }

    /// The number of committed multipart sessions.
    pub fn committed(&self) -> u64 {
        self.inner.lock().unwrap().committed
    }

    /// The number of aborted multipart sessions.
    pub fn aborted(&self) -> u64 {
        self.inner.lock().unwrap().aborted
    }

    /// The number of `get_object` calls made against this store.
    pub fn get_calls(&self) -> u64 {
        self.inner.lock().unwrap().get_calls
    }

    /// Makes the next `times` uploads of `part_number` fail.
    pub fn fail_part(&self, part_number: u32, times: u32) {
        self.inner
            .lock()
            .unwrap()
            .part_failures
            .insert(part_number, times);
    }

    /// Delays uploads of `part_number`, to scramble completion order.
    pub fn delay_part(&self, part_number: u32, delay: Duration) {
        self.inner
            .lock()
            .unwrap()
            .part_delays
            .insert(part_number, delay);
    }

    /// Makes deletes of the given key fail.
    pub fn fail_delete(&self, key: &str) {
        self.inner
            .lock()
            .unwrap()
            .failing_deletes
            .insert(key.to_owned());
    }

    /// Makes every session commit fail.
    pub fn fail_complete(&self) {
        self.inner.lock().unwrap().fail_complete = true;
    }
}

fn simulated(message: &str) -> Error {
    Error::transport(io::Error::new(io::ErrorKind::ConnectionRefused, message.to_owned()))
}

#[async_trait::async_trait]
impl ObjectStoreClient for InMemoryRemote {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn bucket(&self) -> String {
        self.bucket.clone()
    }

    async fn head_bucket(&self) -> Result<bool> {
        Ok(true)
    }

    async fn create_bucket(&self) -> Result<()> {
        Ok(())
    }

    async fn put_object(&self, key: &str, body: Bytes) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .objects
            .insert(key.to_owned(), body);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<PayloadStream>> {
        let mut inner = self.inner.lock().unwrap();
        inner.get_calls += 1;
        Ok(inner
            .objects
            .get(key)
            .cloned()
            .map(|bytes| tokio_stream::once(Ok(bytes)).boxed()))
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<RemoteObject>> {
        let inner = self.inner.lock().unwrap();
        let mut objects: Vec<_> = inner
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, bytes)| RemoteObject {
                key: key.clone(),
                size: bytes.len() as u64,
            })
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_deletes.contains(key) {
            return Err(simulated("simulated delete failure"));
        }
        inner.objects.remove(key);
        Ok(())
    }

    async fn create_multipart_upload(&self, key: &str) -> Result<UploadId> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_upload_id += 1;
        let upload_id = format!("upload-{}", inner.next_upload_id);
        inner.sessions.insert(
            upload_id.clone(),
            Session {
                key: key.to_owned(),
                parts: HashMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<ETag> {
        let delay = self
            .inner
            .lock()
            .unwrap()
            .part_delays
            .get(&part_number)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().unwrap();
        if let Some(remaining) = inner.part_failures.get_mut(&part_number) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(simulated("simulated part upload failure"));
            }
        }

        let session = inner
            .sessions
            .get_mut(upload_id)
            .ok_or_else(|| simulated("no such upload session"))?;
        let etag = format!("\"{upload_id}-{part_number}\"");
        session.parts.insert(part_number, (etag.clone(), body));
        Ok(etag)
    }

    async fn complete_multipart_upload(
        &self,
        _key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_complete {
            return Err(simulated("simulated commit failure"));
        }

        let session = inner
            .sessions
            .get(upload_id)
            .ok_or_else(|| simulated("no such upload session"))?;

        // Like S3, reject part lists that are not ascending by part number.
        if !parts.windows(2).all(|w| w[0].part_number < w[1].part_number) {
            return Err(simulated("part list not in ascending order"));
        }

        let mut assembled = BytesMut::new();
        for part in parts {
            let (etag, bytes) = session
                .parts
                .get(&part.part_number)
                .ok_or_else(|| simulated("committed part was never uploaded"))?;
            if *etag != part.etag {
                return Err(simulated("part etag mismatch"));
            }
            assembled.extend_from_slice(bytes);
        }

        let key = session.key.clone();
        inner.objects.insert(key, assembled.freeze());
        inner.sessions.remove(upload_id);
        inner.committed += 1;
        Ok(())
    }

    async fn abort_multipart_upload(&self, _key: &str, upload_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .sessions
            .remove(upload_id)
            .ok_or_else(|| simulated("no such upload session"))?;
        inner.aborted += 1;
        Ok(())
    }

    async fn list_parts(&self, _key: &str, upload_id: &str) -> Result<Option<Vec<CompletedPart>>> {
        let inner = self.inner.lock().unwrap();
        let Some(session) = inner.sessions.get(upload_id) else {
            return Ok(Some(Vec::new()));
        };
        let mut parts: Vec<_> = session
            .parts
            .iter()
            .map(|(&part_number, (etag, _))| CompletedPart {
                part_number,
                etag: etag.clone(),
            })
            .collect();
        parts.sort_by_key(|part| part.part_number);
        Ok(Some(parts))
    }
}
