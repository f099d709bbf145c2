use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use marquee_types::{AssetReference, DeletionHandle, Upload};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{AssetError, AssetResult};
use crate::policy::{key_from_handle, object_key, public_url, UploadPolicy};
use crate::traits::AssetStore;

/// Filesystem asset store.
///
/// Binaries are written below `root` at their object key; the public URL is
/// `public_base_url` joined with the key, so whatever serves `root` at that
/// base URL makes every stored asset reachable.
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    root: PathBuf,
    public_base_url: String,
    policy: UploadPolicy,
}

impl FsAssetStore {
    pub fn new(
        root: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
            policy,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        key.split('/').fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

/// Write `bytes` to a sibling `.part` file, sync it, and rename it onto
/// `target`. The temp file is removed again if any step fails.
async fn write_via_temp(target: &Path, bytes: &[u8]) -> AssetResult<()> {
    let temp_path = target.with_extension("part");
    let result = write_and_rename(&temp_path, target, bytes).await;
    if result.is_err() {
        if let Err(e) = fs::remove_file(&temp_path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %temp_path.display(), error = %e, "temp asset cleanup failed");
            }
        }
    }
    result
}

async fn write_and_rename(temp_path: &Path, target: &Path, bytes: &[u8]) -> AssetResult<()> {
    let mut file = fs::File::create(temp_path)
        .await
        .map_err(|e| AssetError::Transport(format!("create {}: {e}", temp_path.display())))?;
    file.write_all(bytes)
        .await
        .map_err(|e| AssetError::Transport(format!("write {}: {e}", temp_path.display())))?;
    file.sync_all().await?;
    drop(file);
    fs::rename(temp_path, target).await.map_err(|e| {
        warn!(
            from = %temp_path.display(),
            to = %target.display(),
            error = %e,
            "asset rename failed"
        );
        AssetError::Transport(format!("rename {}: {e}", temp_path.display()))
    })
}

#[async_trait]
impl AssetStore for FsAssetStore {
    async fn store(&self, upload: &Upload, folder: &str) -> AssetResult<AssetReference> {
        let format = self.policy.check(upload)?;
        let key = object_key(folder, format)?;
        let full_path = self.path_for(&key);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "asset create_dir_all failed");
                AssetError::Transport(format!("create {}: {e}", parent.display()))
            })?;
        }

        write_via_temp(&full_path, &upload.bytes).await?;

        debug!(key = %key, size = upload.len(), "filesystem asset stored");
        Ok(AssetReference::owned(
            public_url(&self.public_base_url, &key),
            DeletionHandle::new(key),
        ))
    }

    async fn remove(&self, handle: &DeletionHandle) -> AssetResult<()> {
        let key = key_from_handle(handle)?;
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => {
                debug!(key = %key, "filesystem asset removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AssetError::NotFound(handle.clone())),
            Err(e) => Err(AssetError::Io(e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}
