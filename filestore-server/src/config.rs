//! Configuration for the filestore server.
//!
//! Configuration can be loaded from multiple sources with the following
//! precedence (highest to lowest):
//!
//! 1. Environment variables (prefixed with `FS__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! Environment variables use `FS__` as a prefix and double underscores
//! (`__`) to denote nested configuration structures. For example:
//!
//! - `FS__HTTP_ADDR=0.0.0.0:3001` sets the HTTP server address
//! - `FS__REMOTE__BUCKET=my-bucket` sets the remote bucket
//! - `FS__ENCRYPTION__SECRET=...` sets the sealing secret
//!
//! The same configuration in YAML format:
//!
//! ```yaml
//! http_addr: 0.0.0.0:3001
//!
//! remote:
//!   bucket: my-bucket
//! encryption:
//!   secret: "..."
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use filestore_service::multipart::MultipartConfig;
use filestore_service::transform::Encryption;
use secrecy::{CloneableSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "FS__";

/// Newtype around `String` that protects against accidental logging of
/// secrets in the configuration struct. Use with [`secrecy::SecretBox`].
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    /// The secret value.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ConfigSecret {
    fn from(str: &str) -> Self {
        ConfigSecret(str.to_string())
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[redacted]")
    }
}

impl CloneableSecret for ConfigSecret {}
impl SerializableSecret for ConfigSecret {}
impl Zeroize for ConfigSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// Local cache tier configuration.
///
/// Used in: [`Config::cache`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Cache {
    /// Whether the local cache tier is enabled.
    ///
    /// # Default
    ///
    /// `true`
    pub enabled: bool,

    /// Directory the cached artifacts are stored in.
    ///
    /// The directory is created on first write. Relative paths are resolved
    /// from the server's working directory.
    ///
    /// # Default
    ///
    /// `"data/cache"`
    pub path: PathBuf,
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("data/cache"),
        }
    }
}

/// Remote store tier configuration.
///
/// The remote store is reached through an S3-compatible client; credentials
/// are taken from the standard AWS environment (`AWS_ACCESS_KEY_ID`,
/// `AWS_SECRET_ACCESS_KEY`, profiles, or instance metadata).
///
/// Used in: [`Config::remote`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Remote {
    /// Whether the remote store tier is enabled.
    ///
    /// # Default
    ///
    /// `false`
    pub enabled: bool,

    /// Custom endpoint URL, e.g. `http://localhost:9000` for MinIO.
    ///
    /// # Default
    ///
    /// `None` (derive the endpoint from the region)
    pub endpoint: Option<String>,

    /// Region name.
    ///
    /// # Default
    ///
    /// `"us-east-1"`
    pub region: String,

    /// Bucket name. Required when the remote tier is enabled.
    pub bucket: String,

    /// Key prefix (folder) for all objects written by this service.
    ///
    /// # Default
    ///
    /// `"files"`
    pub folder: String,

    /// Use path-style bucket addressing instead of virtual hosts. Most
    /// self-hosted S3-compatible stores need this.
    ///
    /// # Default
    ///
    /// `false`
    pub path_style: bool,
}

impl Default for Remote {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            region: "us-east-1".into(),
            bucket: String::new(),
            folder: "files".into(),
            path_style: false,
        }
    }
}

/// Sealing (compression + encryption) configuration.
///
/// Used in: [`Config::encryption`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct EncryptionSettings {
    /// The symmetric cipher artifacts are sealed with.
    ///
    /// One of `chacha20` or `aes256ctr`.
    ///
    /// # Default
    ///
    /// `chacha20`
    pub algorithm: Encryption,

    /// The secret the cipher key is derived from. Required; the server
    /// refuses to start without it.
    ///
    /// # Environment Variable
    ///
    /// `FS__ENCRYPTION__SECRET`
    pub secret: Option<SecretBox<ConfigSecret>>,
}

impl Default for EncryptionSettings {
    fn default() -> Self {
        Self {
            algorithm: Encryption::ChaCha20,
            secret: None,
        }
    }
}

/// Log output configuration. Logs are always written to stderr.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// Valid levels in increasing severity: TRACE, DEBUG, INFO, WARN,
    /// ERROR, OFF. The `RUST_LOG` environment variable provides more
    /// granular per-module control if needed.
    ///
    /// # Default
    ///
    /// `INFO`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
        }
    }
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Main configuration struct for the filestore server.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server bind address.
    ///
    /// # Default
    ///
    /// `0.0.0.0:3001`
    ///
    /// # Environment Variable
    ///
    /// `FS__HTTP_ADDR`
    pub http_addr: SocketAddr,

    /// Local cache tier. See [`Cache`].
    pub cache: Cache,

    /// Remote store tier. See [`Remote`].
    pub remote: Remote,

    /// Sealing parameters. See [`EncryptionSettings`].
    pub encryption: EncryptionSettings,

    /// Multipart session parameters: part size, retry bound, and the
    /// concurrency cap for part uploads.
    pub multipart: MultipartConfig,

    /// Logging configuration. See [`Logging`].
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:3001".parse().expect("valid default address"),
            cache: Cache::default(),
            remote: Remote::default(),
            encryption: EncryptionSettings::default(),
            multipart: MultipartConfig::default(),
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads configuration from defaults, an optional YAML file, and the
    /// environment, in increasing order of precedence.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}
