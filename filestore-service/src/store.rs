//! Tiered local/remote storage orchestration.
//!
//! [`TieredStore`] runs the seal pipeline exactly once per write and fans the
//! output out to the local cache and/or the remote store (write-through). On
//! read it probes the local cache first and falls back to the remote store
//! only on a strict not-found, warming the cache on the way (read-through).
//! Writes and cache warms for the same logical name are serialized through a
//! per-name async mutex; distinct names proceed independently.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;

use crate::cache::LocalCache;
use crate::error::{Error, Result};
use crate::multipart::{self, MultipartConfig};
use crate::range::RangePlan;
use crate::remote::{BoxedClient, ObjectStoreClient};
use crate::stream::PayloadStream;
use crate::transform::{self, SEALED_SUFFIX, TransformKeys};

/// Configuration to initialize a [`TieredStore`].
#[derive(Debug)]
pub struct StoreConfig {
    /// Local cache directory; the local tier is enabled iff set.
    pub cache_dir: Option<PathBuf>,
    /// Remote store client; the remote tier is enabled iff set.
    pub remote: Option<BoxedClient>,
    /// Key prefix (folder) for all remote objects.
    pub bucket_folder: String,
    /// Seal pipeline parameters.
    pub keys: TransformKeys,
    /// Multipart session parameters.
    pub multipart: MultipartConfig,
}

/// Per-operation tier selection, as requested by the boundary layer.
#[derive(Clone, Debug)]
pub struct TierOptions {
    /// Write to / delete from the local cache.
    pub use_local: bool,
    /// Write to / delete from the remote store.
    pub use_remote: bool,
    /// Target bucket; required whenever `use_remote` is set and validated
    /// against the bucket the remote client is bound to.
    pub bucket: Option<String>,
}

/// Acknowledgment of a fully committed write.
#[derive(Clone, Debug, Serialize)]
pub struct WriteReceipt {
    /// The logical name the payload was stored under.
    pub name: String,
    /// Plaintext size in bytes.
    pub size: u64,
    /// Sealed (at-rest) size in bytes.
    pub sealed_size: u64,
    /// Whether the local tier holds the artifact.
    pub local: bool,
    /// Whether the remote tier holds the artifact.
    pub remote: bool,
}

/// One entry of a [`TieredStore::list`] response.
#[derive(Clone, Debug, Serialize)]
pub struct ObjectSummary {
    /// Logical name without the extension.
    pub name: String,
    /// File extension, or empty if the name has none.
    pub extension: String,
    /// Stored (sealed) size in bytes.
    pub size: u64,
    /// MIME type looked up from the extension.
    pub mime_type: String,
}

/// A planned read, ready to be written out as an HTTP response.
pub struct Delivery {
    /// The decoded payload, already restricted to the requested range.
    pub stream: PayloadStream,
    /// Status, length and header information for the response.
    pub plan: RangePlan,
    /// MIME type looked up from the logical name's extension.
    pub mime_type: String,
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("plan", &self.plan)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

/// High-level asynchronous store orchestrating the local and remote tiers.
#[derive(Clone, Debug)]
pub struct TieredStore(Arc<TieredStoreInner>);

#[derive(Debug)]
struct TieredStoreInner {
    keys: TransformKeys,
    cache: Option<LocalCache>,
    remote: Option<BoxedClient>,
    bucket_folder: String,
    multipart: MultipartConfig,
    write_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TieredStore {
    /// Creates a store with the specified configuration.
    pub fn new(config: StoreConfig) -> Self {
        Self(Arc::new(TieredStoreInner {
            keys: config.keys,
            cache: config.cache_dir.map(|dir| LocalCache::new(&dir)),
            remote: config.remote,
            bucket_folder: config.bucket_folder,
            multipart: config.multipart,
            write_locks: Mutex::new(HashMap::new()),
        }))
    }

    fn cache(&self) -> Result<&LocalCache> {
        self.0
            .cache
            .as_ref()
            .ok_or_else(|| Error::Validation("local cache is not configured".into()))
    }

    fn remote(&self) -> Result<&dyn ObjectStoreClient> {
        self.0
            .remote
            .as_deref()
            .ok_or_else(|| Error::Validation("remote store is not configured".into()))
    }

    /// Validates the bucket named in the options against the bound client.
    fn remote_for(&self, options: &TierOptions) -> Result<&dyn ObjectStoreClient> {
        let client = self.remote()?;
        match options.bucket.as_deref() {
            Some(bucket) if !bucket.is_empty() => {
                if bucket != client.bucket() {
                    return Err(Error::Validation(format!("unknown bucket: {bucket}")));
                }
            }
            _ => {
                return Err(Error::Validation(
                    "a bucket must be specified for remote operations".into(),
                ));
            }
        }
        Ok(client)
    }

    fn remote_key(&self, name: &str) -> String {
        format!("{}/{name}{SEALED_SUFFIX}", self.0.bucket_folder)
    }

    /// Serializes writes and cache warms for one logical name.
    async fn lock_name(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.0.write_locks.lock().unwrap();
            Arc::clone(locks.entry(name.to_owned()).or_default())
        };
        lock.lock_owned().await
    }

    /// Seals `payload` once and stores it on the requested tiers.
    ///
    /// The artifact becomes visible only after every requested tier has
    /// acknowledged; a new write fully supersedes prior bytes under the same
    /// name.
    #[tracing::instrument(skip_all, fields(%name))]
    pub async fn write(
        &self,
        name: &str,
        payload: Bytes,
        options: &TierOptions,
    ) -> Result<WriteReceipt> {
        validate_name(name)?;
        if !options.use_local && !options.use_remote {
            return Err(Error::Validation("no storage tier requested".into()));
        }
        let cache = options.use_local.then(|| self.cache()).transpose()?;
        let remote = options
            .use_remote
            .then(|| self.remote_for(options))
            .transpose()?;

        let _guard = self.lock_name(name).await;

        let size = payload.len() as u64;
        let source: PayloadStream = tokio_stream::once(Ok(payload)).boxed();
        let mut sealed = transform::encode(&self.0.keys, size, source);

        // Fan the single sealed stream out chunk by chunk; the transform
        // never runs twice, no matter how many sinks are attached.
        let mut local_sink = match cache {
            Some(cache) => Some(cache.create(name).await?),
            None => None,
        };
        let mut remote_buf = remote.is_some().then(BytesMut::new);
        let mut sealed_size = 0u64;

        while let Some(chunk) = sealed.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    if let Some(sink) = local_sink.take() {
                        sink.discard().await;
                    }
                    return Err(Error::from_stream_io(err));
                }
            };
            sealed_size += chunk.len() as u64;
            if let Some(sink) = local_sink.as_mut() {
                if let Err(err) = sink.write_chunk(&chunk).await {
                    if let Some(sink) = local_sink.take() {
                        sink.discard().await;
                    }
                    return Err(err);
                }
            }
            if let Some(buf) = remote_buf.as_mut() {
                buf.extend_from_slice(&chunk);
            }
        }

        // Commit the remote tier first. If it fails, the local temp file is
        // discarded and the previously committed artifact stays in place, so
        // the new version never becomes visible on only one tier.
        if let (Some(client), Some(buf)) = (remote, remote_buf) {
            let key = self.remote_key(name);
            let sealed = buf.freeze();
            let result = if sealed.len() >= self.0.multipart.part_size {
                multipart::upload(client, &key, sealed, &self.0.multipart)
                    .await
                    .map(drop)
            } else {
                client.put_object(&key, sealed).await
            };
            if let Err(err) = result {
                if let Some(sink) = local_sink.take() {
                    sink.discard().await;
                }
                return Err(err);
            }
        }

        if let Some(sink) = local_sink {
            sink.finish().await?;
        }

        tracing::debug!(name, size, sealed_size, "write committed");
        Ok(WriteReceipt {
            name: name.to_owned(),
            size,
            sealed_size,
            local: options.use_local,
            remote: options.use_remote,
        })
    }

    /// Reads the object back, decoded and restricted to the requested range.
    ///
    /// A local miss falls back to the remote store only when the miss is a
    /// strict not-found; any other local error (permissions, I/O) propagates
    /// unchanged. Remote hits warm the local cache before delivery.
    #[tracing::instrument(skip_all, fields(%name))]
    pub async fn read(&self, name: &str, range_header: Option<&str>) -> Result<Delivery> {
        validate_name(name)?;
        let mime_type = mime_for(name);

        if let Some(cache) = &self.0.cache {
            if cache.probe(name).await?.is_some() {
                let sealed = cache.open(name).await?;
                return self.deliver(sealed, range_header, mime_type).await;
            }
            tracing::debug!(name, "local cache miss, falling back to the remote store");
        }

        let Some(client) = self.0.remote.as_deref() else {
            return Err(Error::NotFound(name.into()));
        };
        let key = self.remote_key(name);
        let Some(remote_stream) = client.get_object(&key).await? else {
            return Err(Error::NotFound(name.into()));
        };

        match &self.0.cache {
            Some(cache) => {
                // The remote artifact is already sealed, so warming the
                // cache is a plain byte copy under the per-name write lock.
                let guard = self.lock_name(name).await;
                cache.write_stream(name, remote_stream).await?;
                drop(guard);

                let sealed = cache.open(name).await?;
                self.deliver(sealed, range_header, mime_type).await
            }
            None => self.deliver(remote_stream, range_header, mime_type).await,
        }
    }

    async fn deliver(
        &self,
        sealed: PayloadStream,
        range_header: Option<&str>,
        mime_type: String,
    ) -> Result<Delivery> {
        let (plaintext_size, decoded) = transform::decode(&self.0.keys, sealed).await?;
        let plan = RangePlan::new(range_header, plaintext_size)?;
        Ok(Delivery {
            stream: plan.slice(decoded),
            plan,
            mime_type,
        })
    }

    /// Deletes a batch of logical names from the requested tiers.
    ///
    /// An artifact that is absent on one tier is not an error. A failure on
    /// one name does not stop the batch; the first failure is reported after
    /// every name has been processed.
    #[tracing::instrument(skip_all, fields(names = names.len()))]
    pub async fn delete(&self, names: &[String], options: &TierOptions) -> Result<()> {
        if options.use_remote {
            // Validate the target once, before touching any name.
            self.remote_for(options)?;
        }

        let mut first_failure = None;
        for name in names {
            if let Err(err) = self.delete_one(name, options).await {
                tracing::warn!(%name, error = %err, "delete failed, continuing with remaining names");
                first_failure.get_or_insert(err);
            }
        }

        match first_failure {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    async fn delete_one(&self, name: &str, options: &TierOptions) -> Result<()> {
        validate_name(name)?;
        let _guard = self.lock_name(name).await;

        if options.use_local {
            let removed = self.cache()?.remove(name).await?;
            if !removed {
                tracing::debug!(name, "no cached artifact to remove");
            }
        }
        if options.use_remote {
            let client = self.remote_for(options)?;
            client.delete_object(&self.remote_key(name)).await?;
        }

        Ok(())
    }

    /// Lists stored objects. The remote store is the authoritative source
    /// of existence; cache-only artifacts do not appear here.
    pub async fn list(&self) -> Result<Vec<ObjectSummary>> {
        let client = self.remote()?;
        let prefix = format!("{}/", self.0.bucket_folder);
        let objects = client.list_objects(&prefix).await?;

        let mut summaries = Vec::with_capacity(objects.len());
        for object in objects {
            let Some(stored) = object.key.strip_prefix(&prefix) else {
                continue;
            };
            // Skip foreign keys that were not written by this service.
            let Some(logical) = stored.strip_suffix(SEALED_SUFFIX) else {
                continue;
            };
            let (name, extension) = split_name(logical);
            summaries.push(ObjectSummary {
                name,
                extension,
                size: object.size,
                mime_type: mime_for(logical),
            });
        }
        Ok(summaries)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Validation("missing file name".into()));
    }
    if name.contains(['/', '\\']) || name.split('.').any(|segment| segment == "..") || name == "." {
        return Err(Error::Validation(format!("invalid file name: {name}")));
    }
    Ok(())
}

fn split_name(logical: &str) -> (String, String) {
    match logical.rsplit_once('.') {
        Some((name, extension)) if !name.is_empty() => (name.to_owned(), extension.to_owned()),
        _ => (logical.to_owned(), String::new()),
    }
}

fn mime_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipart::MIN_PART_SIZE;
    use crate::remote::InMemoryRemote;
    use crate::stream::read_to_vec;
    use crate::transform::Encryption;

    const BUCKET: &str = "test-bucket";
    const FOLDER: &str = "files";

    fn make_keys() -> TransformKeys {
        TransformKeys::derive(Encryption::ChaCha20, "a test secret")
    }

    fn make_store(
        cache_dir: Option<PathBuf>,
        remote: Option<InMemoryRemote>,
    ) -> TieredStore {
        TieredStore::new(StoreConfig {
            cache_dir,
            remote: remote.map(|client| Box::new(client) as BoxedClient),
            bucket_folder: FOLDER.into(),
            keys: make_keys(),
            multipart: MultipartConfig::default(),
        })
    }

    fn both_tiers() -> TierOptions {
        TierOptions {
            use_local: true,
            use_remote: true,
            bucket: Some(BUCKET.into()),
        }
    }

    fn remote_only() -> TierOptions {
        TierOptions {
            use_local: false,
            use_remote: true,
            bucket: Some(BUCKET.into()),
        }
    }

    fn incompressible(len: usize) -> Bytes {
        let mut state = 0x12345678u32;
        let mut data = Vec::with_capacity(len);
        for _ in 0..len {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            data.push((state >> 24) as u8);
        }
        data.into()
    }

    async fn read_all(store: &TieredStore, name: &str) -> Vec<u8> {
        let delivery = store.read(name, None).await.unwrap();
        read_to_vec(delivery.stream).await.unwrap()
    }

    #[tokio::test]
    async fn end_to_end_write_read_delete() {
        let tempdir = tempfile::tempdir().unwrap();
        let remote = InMemoryRemote::new(BUCKET);
        let store = make_store(Some(tempdir.path().into()), Some(remote.clone()));

        let receipt = store
            .write(
                "example.txt",
                Bytes::from_static(b"this is just an example"),
                &both_tiers(),
            )
            .await
            .unwrap();
        assert_eq!(receipt.size, 23);
        assert!(receipt.local && receipt.remote);

        assert_eq!(read_all(&store, "example.txt").await, b"this is just an example");

        store
            .delete(&["example.txt".into()], &both_tiers())
            .await
            .unwrap();
        assert!(remote.is_empty());

        let result = store.read("example.txt", None).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn round_trips_empty_payloads() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = make_store(
            Some(tempdir.path().into()),
            Some(InMemoryRemote::new(BUCKET)),
        );

        store
            .write("empty.bin", Bytes::new(), &both_tiers())
            .await
            .unwrap();
        assert!(read_all(&store, "empty.bin").await.is_empty());
    }

    #[tokio::test]
    async fn large_writes_take_the_multipart_path() {
        let tempdir = tempfile::tempdir().unwrap();
        let remote = InMemoryRemote::new(BUCKET);
        let store = make_store(Some(tempdir.path().into()), Some(remote.clone()));

        // Incompressible, so the sealed artifact exceeds two part sizes.
        let payload = incompressible(2 * MIN_PART_SIZE + 64 * 1024);
        store
            .write("large.bin", payload.clone(), &both_tiers())
            .await
            .unwrap();

        assert_eq!(remote.committed(), 1);
        assert_eq!(remote.open_sessions(), 0);
        assert_eq!(read_all(&store, "large.bin").await, payload);
    }

    #[tokio::test]
    async fn remote_and_local_artifacts_are_identical() {
        let tempdir = tempfile::tempdir().unwrap();
        let remote = InMemoryRemote::new(BUCKET);
        let store = make_store(Some(tempdir.path().into()), Some(remote.clone()));

        store
            .write("copy.txt", Bytes::from_static(b"same bytes on both tiers"), &both_tiers())
            .await
            .unwrap();

        let cached = std::fs::read(tempdir.path().join("copy.txt.sealed")).unwrap();
        let stored = remote.get_stored("files/copy.txt.sealed").unwrap();
        assert_eq!(cached, stored);
    }

    #[tokio::test]
    async fn write_validation_errors() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = make_store(
            Some(tempdir.path().into()),
            Some(InMemoryRemote::new(BUCKET)),
        );
        let payload = Bytes::from_static(b"x");

        // Missing name.
        let result = store.write("", payload.clone(), &both_tiers()).await;
        assert!(matches!(result, Err(Error::Validation(_))));

        // Path traversal.
        let result = store.write("../escape", payload.clone(), &both_tiers()).await;
        assert!(matches!(result, Err(Error::Validation(_))));

        // No tier requested.
        let none = TierOptions {
            use_local: false,
            use_remote: false,
            bucket: None,
        };
        let result = store.write("a.txt", payload.clone(), &none).await;
        assert!(matches!(result, Err(Error::Validation(_))));

        // Remote write without a bucket.
        let no_bucket = TierOptions {
            bucket: None,
            ..remote_only()
        };
        let result = store.write("a.txt", payload.clone(), &no_bucket).await;
        assert!(matches!(result, Err(Error::Validation(_))));

        // Remote write against a bucket the client is not bound to.
        let wrong_bucket = TierOptions {
            bucket: Some("other-bucket".into()),
            ..remote_only()
        };
        let result = store.write("a.txt", payload, &wrong_bucket).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn local_miss_falls_back_to_remote_and_warms_the_cache() {
        let tempdir = tempfile::tempdir().unwrap();
        let remote = InMemoryRemote::new(BUCKET);
        let store = make_store(Some(tempdir.path().into()), Some(remote.clone()));

        // Only the remote tier holds the artifact.
        store
            .write("warm.txt", Bytes::from_static(b"remote only"), &remote_only())
            .await
            .unwrap();
        assert!(!tempdir.path().join("warm.txt.sealed").exists());

        assert_eq!(read_all(&store, "warm.txt").await, b"remote only");

        // The fallback read warmed the cache.
        assert!(tempdir.path().join("warm.txt.sealed").exists());

        // A second read is served locally.
        let calls = remote.get_calls();
        assert_eq!(read_all(&store, "warm.txt").await, b"remote only");
        assert_eq!(remote.get_calls(), calls);
    }

    #[tokio::test]
    async fn local_errors_other_than_not_found_do_not_trigger_fallback() {
        // Pointing the cache root below a regular file makes every probe
        // fail with something other than NotFound.
        let tempdir = tempfile::tempdir().unwrap();
        let blocker = tempdir.path().join("blocker");
        std::fs::write(&blocker, b"i am a file, not a directory").unwrap();

        let remote = InMemoryRemote::new(BUCKET);
        let store = make_store(Some(blocker), Some(remote.clone()));

        let result = store.read("anything.txt", None).await;
        assert!(matches!(result, Err(Error::Io(_))), "got {result:?}");
        assert_eq!(remote.get_calls(), 0, "fallback must not run");
    }

    #[tokio::test]
    async fn read_without_any_source_is_not_found() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = make_store(Some(tempdir.path().into()), None);

        let result = store.read("missing.txt", None).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn ranged_read_delivers_the_requested_span() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = make_store(
            Some(tempdir.path().into()),
            Some(InMemoryRemote::new(BUCKET)),
        );

        let payload: Bytes = (0..1000u32).map(|i| (i % 251) as u8).collect::<Vec<_>>().into();
        store
            .write("ranged.bin", payload.clone(), &both_tiers())
            .await
            .unwrap();

        let delivery = store.read("ranged.bin", Some("bytes=0-99")).await.unwrap();
        assert!(delivery.plan.is_partial());
        assert_eq!(delivery.plan.content_length(), 100);
        assert_eq!(
            delivery.plan.content_range().as_deref(),
            Some("bytes 0-99/1000")
        );
        let body = read_to_vec(delivery.stream).await.unwrap();
        assert_eq!(body, &payload[..100]);

        let delivery = store.read("ranged.bin", None).await.unwrap();
        assert!(!delivery.plan.is_partial());
        assert_eq!(delivery.plan.content_length(), 1000);
        assert_eq!(read_to_vec(delivery.stream).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn out_of_bounds_range_is_rejected() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = make_store(
            Some(tempdir.path().into()),
            Some(InMemoryRemote::new(BUCKET)),
        );

        store
            .write("small.txt", Bytes::from_static(b"0123456789"), &both_tiers())
            .await
            .unwrap();

        let result = store.read("small.txt", Some("bytes=5-100")).await;
        assert!(matches!(result, Err(Error::RangeNotSatisfiable(_))));
    }

    #[tokio::test]
    async fn batch_delete_tolerates_absent_local_artifacts() {
        let tempdir = tempfile::tempdir().unwrap();
        let remote = InMemoryRemote::new(BUCKET);
        let store = make_store(Some(tempdir.path().into()), Some(remote.clone()));

        // `a.txt` exists only remotely, `b.txt` on both tiers.
        store
            .write("a.txt", Bytes::from_static(b"remote only"), &remote_only())
            .await
            .unwrap();
        store
            .write("b.txt", Bytes::from_static(b"both tiers"), &both_tiers())
            .await
            .unwrap();

        store
            .delete(&["a.txt".into(), "b.txt".into()], &both_tiers())
            .await
            .unwrap();

        assert!(remote.is_empty());
        assert!(!tempdir.path().join("b.txt.sealed").exists());
    }

    #[tokio::test]
    async fn batch_delete_isolates_per_name_failures() {
        let tempdir = tempfile::tempdir().unwrap();
        let remote = InMemoryRemote::new(BUCKET);
        let store = make_store(Some(tempdir.path().into()), Some(remote.clone()));

        store
            .write("c.txt", Bytes::from_static(b"c"), &both_tiers())
            .await
            .unwrap();
        store
            .write("d.txt", Bytes::from_static(b"d"), &both_tiers())
            .await
            .unwrap();
        remote.fail_delete("files/c.txt.sealed");

        let result = store
            .delete(&["c.txt".into(), "d.txt".into()], &both_tiers())
            .await;

        // The batch reports the failure, but `d.txt` was still processed.
        assert!(result.is_err());
        assert!(remote.contains("files/c.txt.sealed"));
        assert!(!remote.contains("files/d.txt.sealed"));
        assert!(!tempdir.path().join("d.txt.sealed").exists());
    }

    #[tokio::test]
    async fn list_reports_remote_objects() {
        let tempdir = tempfile::tempdir().unwrap();
        let remote = InMemoryRemote::new(BUCKET);
        let store = make_store(Some(tempdir.path().into()), Some(remote.clone()));

        store
            .write("example.txt", Bytes::from_static(b"text"), &both_tiers())
            .await
            .unwrap();
        store
            .write("image.png", Bytes::from_static(b"not really a png"), &both_tiers())
            .await
            .unwrap();
        // A cache-only artifact must not appear: remote is authoritative.
        store
            .write(
                "local-only.txt",
                Bytes::from_static(b"ephemeral"),
                &TierOptions {
                    use_local: true,
                    use_remote: false,
                    bucket: None,
                },
            )
            .await
            .unwrap();

        let mut summaries = store.list().await.unwrap();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "example");
        assert_eq!(summaries[0].extension, "txt");
        assert_eq!(summaries[0].mime_type, "text/plain");
        assert!(summaries[0].size > 0);
        assert_eq!(summaries[1].name, "image");
        assert_eq!(summaries[1].extension, "png");
        assert_eq!(summaries[1].mime_type, "image/png");
    }

    #[tokio::test]
    async fn overwrite_fully_supersedes_prior_bytes() {
        let tempdir = tempfile::tempdir().unwrap();
        let remote = InMemoryRemote::new(BUCKET);
        let store = make_store(Some(tempdir.path().into()), Some(remote.clone()));

        store
            .write(
                "versioned.txt",
                Bytes::from_static(b"a much longer first version of the content"),
                &both_tiers(),
            )
            .await
            .unwrap();
        store
            .write("versioned.txt", Bytes::from_static(b"v2"), &both_tiers())
            .await
            .unwrap();

        assert_eq!(read_all(&store, "versioned.txt").await, b"v2");
    }
}
