//! R2 (S3 API) client for published assets.

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Published keys are never rewritten, so caches may keep them forever.
const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Connection settings for the asset bucket.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// S3 API endpoint of the account
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    /// Public base URL objects are served from (custom domain or r2.dev)
    pub public_base_url: String,
    /// Usually "auto" for R2
    pub region: String,
}

impl R2Config {
    /// Read settings from `R2_*` environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> StorageResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(StorageError::MissingSetting(key))
        };

        let public_base_url = required("R2_PUBLIC_BASE_URL")?;
        if !(public_base_url.starts_with("https://") || public_base_url.starts_with("http://")) {
            return Err(StorageError::invalid_setting(
                "R2_PUBLIC_BASE_URL",
                "must be an absolute http(s) URL",
            ));
        }

        Ok(Self {
            endpoint_url: required("R2_ENDPOINT_URL")?,
            access_key_id: required("R2_ACCESS_KEY_ID")?,
            secret_access_key: required("R2_SECRET_ACCESS_KEY")?,
            bucket_name: required("R2_BUCKET_NAME")?,
            public_base_url,
            region: lookup("R2_REGION").unwrap_or_else(|| "auto".to_string()),
        })
    }
}

/// Thin wrapper over the S3 client bound to one bucket.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
}

impl R2Client {
    pub fn new(config: &R2Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "duet-r2",
        );

        // R2 only supports path-style addressing.
        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name.clone(),
        }
    }

    /// Store one asset under `key` in a single PUT.
    pub async fn put_asset(
        &self,
        key: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()> {
        let size = content.len();
        debug!(bucket = %self.bucket, key, size, "Putting asset");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .cache_control(IMMUTABLE_CACHE_CONTROL)
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(key, e.to_string()))?;

        info!(bucket = %self.bucket, key, size, "Asset stored");
        Ok(())
    }

    /// Confirm the bucket exists and the credentials can see it.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::Unreachable(format!("bucket {}: {}", self.bucket, e)))?;
        Ok(())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn complete() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("R2_ENDPOINT_URL", "https://acct.r2.cloudflarestorage.com"),
            ("R2_ACCESS_KEY_ID", "id"),
            ("R2_SECRET_ACCESS_KEY", "secret"),
            ("R2_BUCKET_NAME", "media"),
            ("R2_PUBLIC_BASE_URL", "https://media.example.com"),
        ])
    }

    #[test]
    fn test_config_from_lookup() {
        let vars = complete();
        let config = R2Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.bucket_name, "media");
        assert_eq!(config.region, "auto");
    }

    #[test]
    fn test_missing_setting_is_named() {
        let mut vars = complete();
        vars.remove("R2_BUCKET_NAME");
        let err = R2Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap_err();
        assert!(matches!(err, StorageError::MissingSetting("R2_BUCKET_NAME")));
    }

    #[test]
    fn test_public_base_url_must_be_absolute() {
        let mut vars = complete();
        vars.insert("R2_PUBLIC_BASE_URL", "media.example.com");
        let err = R2Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap_err();
        assert!(matches!(err, StorageError::InvalidSetting { .. }));
    }
}
