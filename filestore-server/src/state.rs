//! Shared server state.

use anyhow::{Context, Result, ensure};
use filestore_service::remote::{BoxedClient, S3Remote, S3RemoteConfig};
use filestore_service::transform::TransformKeys;
use filestore_service::{StoreConfig, TierOptions, TieredStore};
use secrecy::ExposeSecret;

use crate::config::Config;

/// State shared across all request handlers.
#[derive(Clone, Debug)]
pub struct ServiceState {
    /// The tiered store all operations run against.
    pub store: TieredStore,
    /// Tier selection derived from configuration, applied to every write
    /// and delete.
    pub tier_options: TierOptions,
}

impl ServiceState {
    /// Builds the store and tier options from the loaded configuration.
    ///
    /// When the remote tier is enabled, the configured bucket is checked
    /// and created if it does not exist yet.
    pub async fn new(config: &Config) -> Result<Self> {
        let secret = config
            .encryption
            .secret
            .as_ref()
            .context("encryption.secret must be configured")?;
        let keys = TransformKeys::derive(config.encryption.algorithm, secret.expose_secret().as_str());

        ensure!(
            config.cache.enabled || config.remote.enabled,
            "at least one of cache.enabled and remote.enabled must be set"
        );

        let remote: Option<BoxedClient> = if config.remote.enabled {
            ensure!(
                !config.remote.bucket.is_empty(),
                "remote.bucket must be configured when the remote tier is enabled"
            );
            let client = S3Remote::new(S3RemoteConfig {
                bucket: config.remote.bucket.clone(),
                region: config.remote.region.clone(),
                endpoint: config.remote.endpoint.clone(),
                path_style: config.remote.path_style,
            })?;
            ensure_bucket(&client, &config.remote.bucket).await?;
            Some(Box::new(client))
        } else {
            None
        };

        let tier_options = TierOptions {
            use_local: config.cache.enabled,
            use_remote: config.remote.enabled,
            bucket: config.remote.enabled.then(|| config.remote.bucket.clone()),
        };

        let store = TieredStore::new(StoreConfig {
            cache_dir: config.cache.enabled.then(|| config.cache.path.clone()),
            remote,
            bucket_folder: config.remote.folder.clone(),
            keys,
            multipart: config.multipart,
        });

        Ok(Self {
            store,
            tier_options,
        })
    }
}

/// Checks the configured bucket and creates it if missing.
async fn ensure_bucket(client: &S3Remote, bucket: &str) -> Result<()> {
    use filestore_service::remote::ObjectStoreClient;

    if client.head_bucket().await? {
        return Ok(());
    }
    tracing::info!(bucket, "bucket does not exist, creating it");
    client.create_bucket().await?;
    Ok(())
}
