use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::file::FileRecordStore;
use crate::memory::InMemoryRecordStore;
use crate::traits::RecordStore;

/// Which record store backend to open.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    Memory,
    File { root: PathBuf },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::File {
            root: PathBuf::from("data/records"),
        }
    }
}

/// Open the configured record store.
pub fn open_record_store(config: &StorageConfig) -> StoreResult<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match config {
        StorageConfig::Memory => Arc::new(InMemoryRecordStore::new()),
        StorageConfig::File { root } => Arc::new(FileRecordStore::open(root.clone())?),
    };
    tracing::info!(backend = store.backend_name(), "record store ready");
    Ok(store)
}
