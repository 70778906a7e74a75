//! Streaming seal/unseal pipeline.
//!
//! Every artifact persisted by this service is *sealed*: gzip-compressed and
//! then encrypted with a symmetric stream cipher. A fixed 16-byte header plus
//! a per-object nonce precede the ciphertext, so sealed artifacts are
//! self-describing on the read path:
//!
//! ```text
//! [SealedHeader (16 bytes)] [nonce (12 or 16 bytes)] [ciphertext]
//! ```
//!
//! Both directions are fully streaming: each stage consumes its input chunk
//! by chunk through chained readers, so a slow consumer throttles the source
//! instead of forcing the whole payload into memory. A fresh cipher instance
//! is constructed per invocation and never shared across operations.

use std::io;
use std::mem;

use aes::Aes256;
use async_compression::tokio::bufread::{GzipDecoder, GzipEncoder};
use bytes::BytesMut;
use chacha20::ChaCha20;
use cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;
use futures_util::StreamExt;
use pack1::{U16LE, U64LE};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, BufReader};
use tokio_util::io::{ReaderStream, StreamReader};
use watto::Pod;

use crate::error::{Error, Result, Stage};
use crate::stream::PayloadStream;

/// Suffix that distinguishes sealed at-rest artifacts from plaintext names.
pub const SEALED_SUFFIX: &str = ".sealed";

pub(crate) const SEALED_MAGIC: [u8; 2] = *b"\xf5s";
pub(crate) const SEALED_VERSION: u16 = 1;

type Aes256Ctr = Ctr128BE<Aes256>;

/// Compression applied before encryption.
#[derive(Debug)]
#[repr(u8)]
pub(crate) enum Compression {
    /// No compression. Reserved; the write path always compresses.
    None = 0,
    /// Gzip (RFC 1952).
    Gzip = 1,
}

impl Compression {
    fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Compression::None),
            1 => Some(Compression::Gzip),
            _ => None,
        }
    }
}

/// The symmetric cipher used to seal artifacts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Encryption {
    /// ChaCha20 with a 12-byte nonce.
    ChaCha20 = 1,
    /// AES-256 in counter mode with a 16-byte nonce.
    Aes256Ctr = 2,
}

impl Encryption {
    fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Encryption::ChaCha20),
            2 => Some(Encryption::Aes256Ctr),
            _ => None,
        }
    }

    fn nonce_len(self) -> usize {
        match self {
            Encryption::ChaCha20 => 12,
            Encryption::Aes256Ctr => 16,
        }
    }
}

/// Sealed artifact metadata: algorithm identifiers and the plaintext size.
#[derive(Debug)]
#[repr(C)]
pub(crate) struct SealedHeader {
    pub magic: [u8; 2],
    pub version: U16LE,
    pub compression: u8,
    pub encryption: u8,
    pub _padding: [u8; 2],
    pub plaintext_size: U64LE,
}
unsafe impl Pod for SealedHeader {}

/// Process-wide transform parameters, derived once from configuration.
///
/// The cipher key is derived from the configured secret with SHA-256, so any
/// secret length is accepted while the ciphers always see 32 key bytes.
#[derive(Clone)]
pub struct TransformKeys {
    algorithm: Encryption,
    key: [u8; 32],
}

impl std::fmt::Debug for TransformKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformKeys")
            .field("algorithm", &self.algorithm)
            .field("key", &"[redacted]")
            .finish()
    }
}

impl TransformKeys {
    /// Derives the cipher key for the given algorithm from a configured secret.
    pub fn derive(algorithm: Encryption, secret: &str) -> Self {
        let key = Sha256::digest(secret.as_bytes()).into();
        Self { algorithm, key }
    }

    /// The configured cipher.
    pub fn algorithm(&self) -> Encryption {
        self.algorithm
    }

    /// Constructs a fresh cipher instance for one pipeline invocation.
    ///
    /// The nonce slice length must match `algorithm.nonce_len()`.
    fn cipher_for(&self, algorithm: Encryption, nonce: &[u8]) -> CipherState {
        match algorithm {
            Encryption::ChaCha20 => {
                let mut iv = [0u8; 12];
                iv.copy_from_slice(nonce);
                CipherState::ChaCha20(ChaCha20::new(&self.key.into(), &iv.into()))
            }
            Encryption::Aes256Ctr => {
                let mut iv = [0u8; 16];
                iv.copy_from_slice(nonce);
                CipherState::Aes256Ctr(Aes256Ctr::new(&self.key.into(), &iv.into()))
            }
        }
    }
}

enum CipherState {
    ChaCha20(ChaCha20),
    Aes256Ctr(Aes256Ctr),
}

impl CipherState {
    fn apply(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let result = match self {
            CipherState::ChaCha20(cipher) => cipher.try_apply_keystream(buf),
            CipherState::Aes256Ctr(cipher) => cipher.try_apply_keystream(buf),
        };
        result.map_err(|_| io::Error::other("cipher keystream exhausted"))
    }
}

/// Tags an in-stream failure with the pipeline stage it occurred in.
///
/// Errors that already carry a stage tag pass through unchanged, so stages
/// downstream of a failure do not re-tag it.
fn stage_error(stage: Stage, err: io::Error) -> io::Error {
    if err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
        return err;
    }
    io::Error::other(Error::transform(stage, err))
}

/// Seals a payload stream: compress, encrypt, and frame with header + nonce.
///
/// `plaintext_size` is recorded in the header so reads can plan byte-range
/// deliveries without decoding the whole artifact first.
pub fn encode(keys: &TransformKeys, plaintext_size: u64, source: PayloadStream) -> PayloadStream {
    let algorithm = keys.algorithm;
    let mut nonce = vec![0u8; algorithm.nonce_len()];
    rand::thread_rng().fill_bytes(&mut nonce);
    let mut cipher = keys.cipher_for(algorithm, &nonce);

    let header = SealedHeader {
        magic: SEALED_MAGIC,
        version: SEALED_VERSION.into(),
        compression: Compression::Gzip as u8,
        encryption: algorithm as u8,
        _padding: [0; 2],
        plaintext_size: plaintext_size.into(),
    };

    let mut prefix = BytesMut::with_capacity(mem::size_of::<SealedHeader>() + nonce.len());
    prefix.extend_from_slice(header.as_bytes());
    prefix.extend_from_slice(&nonce);

    let compressed = ReaderStream::new(GzipEncoder::new(StreamReader::new(source)));
    let body = compressed.map(move |chunk| match chunk {
        Ok(chunk) => {
            let mut buf = BytesMut::from(&chunk[..]);
            cipher
                .apply(&mut buf)
                .map_err(|err| stage_error(Stage::Encrypt, err))?;
            Ok(buf.freeze())
        }
        Err(err) => Err(stage_error(Stage::Compress, err)),
    });

    let mut sealed_bytes = 0u64;
    tokio_stream::once(Ok(prefix.freeze()))
        .chain(body)
        .inspect(move |chunk| {
            if let Ok(chunk) = chunk {
                sealed_bytes += chunk.len() as u64;
                tracing::trace!(sealed_bytes, "sealing progress");
            }
        })
        .boxed()
}

/// Unseals an artifact stream, returning the recorded plaintext size and the
/// decrypted, decompressed payload.
///
/// The header is read and validated eagerly; the payload itself is unsealed
/// lazily as the returned stream is consumed.
pub async fn decode(keys: &TransformKeys, source: PayloadStream) -> Result<(u64, PayloadStream)> {
    let mut reader = BufReader::new(StreamReader::new(source));

    let mut header_buf = vec![0; mem::size_of::<SealedHeader>()];
    reader
        .read_exact(&mut header_buf)
        .await
        .map_err(|err| Error::transform(Stage::Decrypt, err))?;
    let header = SealedHeader::ref_from_bytes(&header_buf)
        .ok_or_else(|| malformed("unreadable sealed header"))?;

    if header.magic != SEALED_MAGIC {
        return Err(malformed("missing sealed artifact magic"));
    }
    if header.version.get() != SEALED_VERSION {
        return Err(malformed("unsupported sealed artifact version"));
    }
    match Compression::from_id(header.compression) {
        Some(Compression::Gzip) => {}
        _ => return Err(malformed("unsupported compression algorithm")),
    }
    // Artifacts are self-describing: decode with the algorithm they were
    // sealed with, not the currently configured one.
    let algorithm = Encryption::from_id(header.encryption)
        .ok_or_else(|| malformed("unsupported encryption algorithm"))?;
    let plaintext_size = header.plaintext_size.get();

    let mut nonce = vec![0u8; algorithm.nonce_len()];
    reader
        .read_exact(&mut nonce)
        .await
        .map_err(|err| Error::transform(Stage::Decrypt, err))?;
    let mut cipher = keys.cipher_for(algorithm, &nonce);

    let decrypted = ReaderStream::new(reader).map(move |chunk| match chunk {
        Ok(chunk) => {
            let mut buf = BytesMut::from(&chunk[..]);
            cipher
                .apply(&mut buf)
                .map_err(|err| stage_error(Stage::Decrypt, err))?;
            Ok(buf.freeze())
        }
        Err(err) => Err(stage_error(Stage::Decrypt, err)),
    });

    let decompressed = ReaderStream::new(GzipDecoder::new(StreamReader::new(decrypted)))
        .map(|chunk| chunk.map_err(|err| stage_error(Stage::Decompress, err)));

    Ok((plaintext_size, decompressed.boxed()))
}

fn malformed(message: &str) -> Error {
    Error::transform(
        Stage::Decrypt,
        io::Error::new(io::ErrorKind::InvalidData, message.to_owned()),
    )
}
