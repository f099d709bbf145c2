use async_trait::async_trait;
use marquee_types::{AssetReference, DeletionHandle, Upload};

use crate::error::AssetResult;

/// Remote binary storage for record assets.
///
/// All implementations must satisfy these invariants:
/// - `store` applies the configured upload policy and fails with
///   [`AssetError::Rejected`](crate::AssetError::Rejected) on violations.
/// - The returned reference is owned: its URL is absolute and its handle
///   releases exactly the stored binary.
/// - `remove` of an unknown or already-removed handle returns
///   [`AssetError::NotFound`](crate::AssetError::NotFound).
/// - Implementations are safe to call concurrently.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Upload `upload` under `folder` and return its URL and deletion handle.
    async fn store(&self, upload: &Upload, folder: &str) -> AssetResult<AssetReference>;

    /// Release the binary identified by `handle`.
    async fn remove(&self, handle: &DeletionHandle) -> AssetResult<()>;

    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}
