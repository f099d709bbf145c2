use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use marquee_types::{AssetReference, DeletionHandle, Upload};

use crate::error::{AssetError, AssetResult};
use crate::policy::{key_from_handle, object_key, public_url, ImageFormat, UploadPolicy};
use crate::traits::AssetStore;

/// Base URL used by [`InMemoryAssetStore::new`].
pub const MEMORY_BASE_URL: &str = "https://assets.invalid";

#[derive(Clone, Debug)]
struct StoredAsset {
    bytes: Bytes,
    format: ImageFormat,
}

/// In-memory, HashMap-based asset store.
///
/// Intended for tests and embedding. Besides the stored binaries it keeps a
/// log of every successful removal so callers can assert which handles were
/// released.
pub struct InMemoryAssetStore {
    base_url: String,
    policy: UploadPolicy,
    assets: RwLock<HashMap<String, StoredAsset>>,
    removed: RwLock<Vec<DeletionHandle>>,
}

impl InMemoryAssetStore {
    /// Create an empty store with the default policy.
    pub fn new() -> Self {
        Self::with_policy(MEMORY_BASE_URL, UploadPolicy::default())
    }

    pub fn with_policy(base_url: impl Into<String>, policy: UploadPolicy) -> Self {
        Self {
            base_url: base_url.into(),
            policy,
            assets: RwLock::new(HashMap::new()),
            removed: RwLock::new(Vec::new()),
        }
    }

    /// Number of assets currently stored.
    pub fn len(&self) -> usize {
        self.assets.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.assets.read().expect("lock poisoned").is_empty()
    }

    pub fn contains(&self, handle: &DeletionHandle) -> bool {
        self.assets
            .read()
            .expect("lock poisoned")
            .contains_key(handle.as_str())
    }

    /// The stored bytes and sniffed format for `handle`.
    pub fn get(&self, handle: &DeletionHandle) -> Option<(Bytes, ImageFormat)> {
        self.assets
            .read()
            .expect("lock poisoned")
            .get(handle.as_str())
            .map(|asset| (asset.bytes.clone(), asset.format))
    }

    /// Handles released so far, in removal order.
    pub fn removed(&self) -> Vec<DeletionHandle> {
        self.removed.read().expect("lock poisoned").clone()
    }
}

impl Default for InMemoryAssetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetStore for InMemoryAssetStore {
    async fn store(&self, upload: &Upload, folder: &str) -> AssetResult<AssetReference> {
        let format = self.policy.check(upload)?;
        let key = object_key(folder, format)?;
        self.assets.write().expect("lock poisoned").insert(
            key.clone(),
            StoredAsset {
                bytes: upload.bytes.clone(),
                format,
            },
        );
        tracing::debug!(key = %key, size = upload.len(), "memory asset stored");
        Ok(AssetReference::owned(
            public_url(&self.base_url, &key),
            DeletionHandle::new(key),
        ))
    }

    async fn remove(&self, handle: &DeletionHandle) -> AssetResult<()> {
        let key = key_from_handle(handle)?;
        let existed = self
            .assets
            .write()
            .expect("lock poisoned")
            .remove(key)
            .is_some();
        if !existed {
            return Err(AssetError::NotFound(handle.clone()));
        }
        self.removed
            .write()
            .expect("lock poisoned")
            .push(handle.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for InMemoryAssetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAssetStore")
            .field("base_url", &self.base_url)
            .field("asset_count", &self.len())
            .finish()
    }
}
