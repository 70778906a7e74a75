//! Chunked large-object upload with bounded concurrency and per-part retry.
//!
//! A buffer is partitioned into parts of at least the store-protocol minimum
//! size, uploaded with a bounded number of concurrent requests, and committed
//! as one object. Parts retry independently with an explicit bounded loop;
//! the session is committed only once every part has a settled outcome, and
//! every path out of an open session reaches commit or abort exactly once.

use bytes::Bytes;
use futures_util::{StreamExt, stream};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::remote::{CompletedPart, ObjectStoreClient};

/// Store-protocol minimum size for every part except the last.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Tunables for multipart sessions.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct MultipartConfig {
    /// Size of each part except possibly the last. Must be at least
    /// [`MIN_PART_SIZE`].
    pub part_size: usize,
    /// How often a failed part is retried before the session is aborted.
    pub max_retries: u32,
    /// Upper bound on concurrently in-flight part uploads.
    pub max_concurrency: usize,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            part_size: MIN_PART_SIZE,
            max_retries: 3,
            max_concurrency: 4,
        }
    }
}

/// Outcome of a committed multipart session.
#[derive(Clone, Debug)]
pub struct CommitInfo {
    /// The remote key the object was committed under.
    pub key: String,
    /// Number of parts the object was assembled from.
    pub parts: usize,
    /// Total uploaded size in bytes.
    pub size: u64,
}

/// Uploads `buffer` to `key` as a multipart session.
pub async fn upload(
    client: &dyn ObjectStoreClient,
    key: &str,
    buffer: Bytes,
    config: &MultipartConfig,
) -> Result<CommitInfo> {
    if config.part_size < MIN_PART_SIZE {
        return Err(Error::Validation(format!(
            "part size {} is below the {} byte store minimum",
            config.part_size, MIN_PART_SIZE
        )));
    }
    if buffer.is_empty() {
        return Err(Error::Validation(
            "cannot open a multipart session for an empty buffer".into(),
        ));
    }

    let size = buffer.len() as u64;
    let upload_id = client.create_multipart_upload(key).await?;
    tracing::debug!(key, %upload_id, size, "opened multipart session");

    // From here on, the session must not be left open: every path below
    // ends in exactly one commit or abort.
    let outcome = upload_parts(client, key, &upload_id, buffer, config).await;

    let parts = match outcome {
        Ok(mut parts) => {
            // Completions interleave arbitrarily; the store requires the
            // committed list in ascending part-number order.
            parts.sort_by_key(|part| part.part_number);
            parts
        }
        Err(err) => {
            abort_session(client, key, &upload_id).await;
            return Err(err);
        }
    };

    if let Err(err) = client
        .complete_multipart_upload(key, &upload_id, &parts)
        .await
    {
        abort_session(client, key, &upload_id).await;
        return Err(err);
    }

    tracing::debug!(key, parts = parts.len(), "multipart session committed");
    Ok(CommitInfo {
        key: key.to_owned(),
        parts: parts.len(),
        size,
    })
}

/// Uploads every part and waits for all of them to settle.
///
/// The dispatch stream is drained to completion before any outcome is
/// inspected, so a failure can never race an in-flight part.
async fn upload_parts(
    client: &dyn ObjectStoreClient,
    key: &str,
    upload_id: &str,
    buffer: Bytes,
    config: &MultipartConfig,
) -> Result<Vec<CompletedPart>> {
    let ranges = partition(&buffer, config.part_size);

    let results: Vec<Result<CompletedPart>> = stream::iter(ranges)
        .map(|(part_number, body)| {
            upload_one_part(client, key, upload_id, part_number, body, config.max_retries)
        })
        .buffer_unordered(config.max_concurrency.max(1))
        .collect()
        .await;

    let mut parts = Vec::with_capacity(results.len());
    let mut first_failure = None;
    for result in results {
        match result {
            Ok(part) => parts.push(part),
            Err(err) => {
                first_failure.get_or_insert(err);
            }
        }
    }

    match first_failure {
        None => Ok(parts),
        Some(err) => Err(err),
    }
}

/// Zero-copy partition of `buffer` into `(part_number, bytes)` slices.
///
/// Part numbers start at 1 and follow byte-offset order.
fn partition(buffer: &Bytes, part_size: usize) -> Vec<(u32, Bytes)> {
    let mut parts = Vec::with_capacity(buffer.len().div_ceil(part_size));
    let mut offset = 0;
    let mut part_number = 1u32;
    while offset < buffer.len() {
        let end = (offset + part_size).min(buffer.len());
        parts.push((part_number, buffer.slice(offset..end)));
        offset = end;
        part_number += 1;
    }
    parts
}

/// Uploads one part, retrying with the same part number and byte range.
///
/// Transport failures are absorbed up to `max_retries` retries; exhausting
/// them marks the part permanently failed, which is fatal to the session.
async fn upload_one_part(
    client: &dyn ObjectStoreClient,
    key: &str,
    upload_id: &str,
    part_number: u32,
    body: Bytes,
    max_retries: u32,
) -> Result<CompletedPart> {
    let mut attempt = 1u32;
    loop {
        match client
            .upload_part(key, upload_id, part_number, body.clone())
            .await
        {
            Ok(etag) => return Ok(CompletedPart { part_number, etag }),
            Err(err) if attempt <= max_retries => {
                tracing::warn!(part_number, attempt, error = %err, "part upload failed, retrying");
                attempt += 1;
            }
            Err(err) => {
                tracing::error!(part_number, error = %err, "part upload failed permanently");
                return Err(Error::MultipartSession(format!(
                    "part {part_number} failed after {attempt} attempts: {err}"
                )));
            }
        }
    }
}

/// Aborts the session, with best-effort part diagnostics.
async fn abort_session(client: &dyn ObjectStoreClient, key: &str, upload_id: &str) {
    if let Err(err) = client.abort_multipart_upload(key, upload_id).await {
        tracing::error!(key, upload_id, error = %err, "failed to abort multipart session");
        return;
    }
    tracing::debug!(key, upload_id, "multipart session aborted");

    match client.list_parts(key, upload_id).await {
        Ok(Some(parts)) if !parts.is_empty() => {
            tracing::debug!(key, remaining = parts.len(), "parts still listed after abort");
        }
        Ok(_) => {}
        Err(err) => {
            tracing::debug!(key, error = %err, "part listing unavailable after abort");
        }
    }
}
