use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use marquee_assets::AssetConfig;
use marquee_core::{CmsConfig, ReconcileConfig};
use marquee_store::StorageConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Default request body limit, matching the asset upload limit.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Origins allowed by CORS. Empty allows any origin.
    pub allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
    /// URL path under which a filesystem asset root is served, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets_mount: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 5000)),
            allowed_origins: Vec::new(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            assets_mount: Some("/assets".into()),
        }
    }
}

/// Complete configuration file for `marquee serve`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub reconcile: ReconcileConfig,
    pub assets: AssetConfig,
}

impl AppConfig {
    /// In-memory stores, for tests and throwaway servers.
    pub fn in_memory() -> Self {
        Self {
            server: ServerConfig {
                assets_mount: None,
                ..ServerConfig::default()
            },
            storage: StorageConfig::Memory,
            reconcile: ReconcileConfig::default(),
            assets: AssetConfig::in_memory(),
        }
    }

    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> ServerResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ServerError::Config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.server.max_body_bytes == 0 {
            return Err(ServerError::Config("server.max_body_bytes must be positive".into()));
        }
        if let Some(mount) = &self.server.assets_mount {
            if !mount.starts_with('/') || mount.len() < 2 {
                return Err(ServerError::Config(format!(
                    "server.assets_mount must be an absolute path below the root, got `{mount}`"
                )));
            }
        }
        self.assets
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))
    }

    /// The part of the configuration the content backend needs.
    pub fn cms(&self) -> CmsConfig {
        CmsConfig {
            assets: self.assets.clone(),
            storage: self.storage.clone(),
            reconcile: self.reconcile.clone(),
        }
    }
}
