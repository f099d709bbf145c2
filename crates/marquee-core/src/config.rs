use marquee_assets::AssetConfig;
use marquee_store::StorageConfig;
use serde::{Deserialize, Serialize};

/// Asset lifecycle switches for the reconciler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Release owned assets displaced by a committed update.
    pub release_replaced_assets: bool,
    /// Release assets that were uploaded for an upsert which then failed.
    /// When off they are only logged as orphaned.
    pub release_orphans_on_failure: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            release_replaced_assets: true,
            release_orphans_on_failure: false,
        }
    }
}

/// Everything needed to assemble a [`Cms`](crate::Cms).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsConfig {
    pub assets: AssetConfig,
    pub storage: StorageConfig,
    pub reconcile: ReconcileConfig,
}

impl CmsConfig {
    /// Memory-backed stores for both records and assets.
    pub fn in_memory() -> Self {
        Self {
            assets: AssetConfig::in_memory(),
            storage: StorageConfig::Memory,
            reconcile: ReconcileConfig::default(),
        }
    }
}
