//! Error types for the storage service.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result type used throughout the storage service.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The pipeline stage in which a transform failure occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Compressing plaintext on the write path.
    Compress,
    /// Encrypting compressed bytes on the write path.
    Encrypt,
    /// Decrypting sealed bytes on the read path.
    Decrypt,
    /// Decompressing decrypted bytes on the read path.
    Decompress,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Compress => "compress",
            Stage::Encrypt => "encrypt",
            Stage::Decrypt => "decrypt",
            Stage::Decompress => "decompress",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in the storage service.
#[derive(Debug, Error)]
pub enum Error {
    /// A request was malformed: missing name, missing bucket, or an
    /// unavailable storage tier.
    #[error("validation error: {0}")]
    Validation(String),

    /// The object does not exist on any requested tier.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A transform pipeline stage failed.
    #[error("transform failed in the {stage} stage: {source}")]
    Transform {
        /// The stage that failed.
        stage: Stage,
        /// The underlying failure.
        #[source]
        source: io::Error,
    },

    /// A single remote store call failed. Not retried automatically.
    #[error("remote store call failed: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),

    /// A multipart session could not be committed and was aborted.
    #[error("multipart session failed: {0}")]
    MultipartSession(String),

    /// The `Range` header was malformed or out of bounds.
    #[error("unsatisfiable range: {0}")]
    RangeNotSatisfiable(String),

    /// An I/O error outside the transform pipeline.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Wraps a remote client failure.
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport(Box::new(err))
    }

    pub(crate) fn transform(stage: Stage, source: io::Error) -> Self {
        Error::Transform { stage, source }
    }

    /// Recovers a service error that was tunneled through a payload stream,
    /// falling back to a plain I/O error.
    pub(crate) fn from_stream_io(err: io::Error) -> Self {
        match err.downcast::<Error>() {
            Ok(inner) => inner,
            Err(err) => Error::Io(err),
        }
    }
}
