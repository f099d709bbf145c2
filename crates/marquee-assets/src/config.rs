use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AssetError, AssetResult};
use crate::fs::FsAssetStore;
use crate::http::HttpAssetStore;
use crate::memory::InMemoryAssetStore;
use crate::policy::{normalize_folder, UploadPolicy};
use crate::traits::AssetStore;

/// Which asset backend to construct, with its credentials and endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AssetBackendConfig {
    Memory {
        public_base_url: String,
    },
    Filesystem {
        root: PathBuf,
        public_base_url: String,
    },
    Http {
        endpoint: String,
        public_base_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_timeout_secs() -> u64 {
    30
}

/// Asset store configuration, passed explicitly at construction time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Folder prefix prepended to every kind's folder.
    pub folder_prefix: String,
    pub policy: UploadPolicy,
    pub backend: AssetBackendConfig,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            folder_prefix: "marquee".into(),
            policy: UploadPolicy::default(),
            backend: AssetBackendConfig::Filesystem {
                root: PathBuf::from("data/assets"),
                public_base_url: "http://127.0.0.1:5000/assets".into(),
            },
        }
    }
}

impl AssetConfig {
    /// An in-memory configuration for tests and demos.
    pub fn in_memory() -> Self {
        Self {
            backend: AssetBackendConfig::Memory {
                public_base_url: crate::memory::MEMORY_BASE_URL.into(),
            },
            ..Self::default()
        }
    }

    /// The full folder for uploads of a kind whose own folder is `kind_folder`.
    pub fn folder_for(&self, kind_folder: &str) -> String {
        let prefix = self.folder_prefix.trim_matches('/');
        if prefix.is_empty() {
            kind_folder.to_string()
        } else {
            format!("{prefix}/{kind_folder}")
        }
    }

    pub fn validate(&self) -> AssetResult<()> {
        if !self.folder_prefix.trim_matches('/').is_empty() {
            normalize_folder(&self.folder_prefix)?;
        }
        if self.policy.allowed_formats.is_empty() {
            return Err(AssetError::Config("allowed_formats must not be empty".into()));
        }
        if self.policy.max_bytes == 0 {
            return Err(AssetError::Config("max_bytes must be positive".into()));
        }
        let base = match &self.backend {
            AssetBackendConfig::Memory { public_base_url }
            | AssetBackendConfig::Filesystem { public_base_url, .. }
            | AssetBackendConfig::Http { public_base_url, .. } => public_base_url,
        };
        if !marquee_types::is_remote_url(base) {
            return Err(AssetError::Config(format!(
                "public_base_url must be an absolute http(s) URL: {base}"
            )));
        }
        Ok(())
    }
}

/// Construct the configured asset store.
pub fn build_asset_store(config: &AssetConfig) -> AssetResult<Arc<dyn AssetStore>> {
    config.validate()?;
    let policy = config.policy.clone();
    let store: Arc<dyn AssetStore> = match &config.backend {
        AssetBackendConfig::Memory { public_base_url } => Arc::new(
            InMemoryAssetStore::with_policy(public_base_url.clone(), policy),
        ),
        AssetBackendConfig::Filesystem {
            root,
            public_base_url,
        } => Arc::new(FsAssetStore::new(root.clone(), public_base_url.clone(), policy)),
        AssetBackendConfig::Http {
            endpoint,
            public_base_url,
            token,
            timeout_secs,
        } => Arc::new(HttpAssetStore::new(
            endpoint.clone(),
            public_base_url.clone(),
            token.clone(),
            Duration::from_secs(*timeout_secs),
            policy,
        )?),
    };
    tracing::info!(backend = store.backend_name(), "asset store ready");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_filesystem() {
        let config = AssetConfig::default();
        assert!(config.validate().is_ok());
        assert!(matches!(config.backend, AssetBackendConfig::Filesystem { .. }));
        assert_eq!(config.folder_for("events"), "marquee/events");
    }

    #[test]
    fn empty_prefix_uses_kind_folder() {
        let config = AssetConfig {
            folder_prefix: String::new(),
            ..AssetConfig::in_memory()
        };
        assert_eq!(config.folder_for("team"), "team");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn local_base_url_is_rejected() {
        let config = AssetConfig {
            backend: AssetBackendConfig::Memory {
                public_base_url: "/assets".into(),
            },
            ..AssetConfig::default()
        };
        assert!(matches!(config.validate(), Err(AssetError::Config(_))));
    }

    #[test]
    fn http_backend_parses_from_toml() {
        let config: AssetConfig = toml::from_str(
            r#"
            folder_prefix = "mayukh"

            [policy]
            max_bytes = 2048
            allowed_formats = ["jpg", "png"]

            [backend]
            type = "http"
            endpoint = "https://objects.example/bucket"
            public_base_url = "https://cdn.example/bucket"
            token = "abc"
            "#,
        )
        .unwrap();
        assert_eq!(config.folder_prefix, "mayukh");
        assert_eq!(config.policy.max_bytes, 2048);
        match config.backend {
            AssetBackendConfig::Http {
                timeout_secs,
                token,
                ..
            } => {
                assert_eq!(timeout_secs, 30);
                assert_eq!(token.as_deref(), Some("abc"));
            }
            other => panic!("unexpected backend: {other:?}"),
        }
    }

    #[tokio::test]
    async fn builds_memory_store() {
        let store = build_asset_store(&AssetConfig::in_memory()).unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[test]
    fn default_round_trips_through_toml() {
        let text = toml::to_string_pretty(&AssetConfig::default()).unwrap();
        let back: AssetConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, AssetConfig::default());
    }
}
