//! Test doubles shared by the core test modules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use marquee_assets::{AssetError, AssetResult, AssetStore, InMemoryAssetStore};
use marquee_store::{InMemoryRecordStore, RecordStore, StoreResult};
use marquee_types::{AssetReference, DeletionHandle, MediaRecord, RecordId, RecordKind, Upload};
use tokio::sync::Barrier;

/// Filename that makes [`FlakyAssetStore`] reject an upload.
pub const BROKEN_FILENAME: &str = "broken.png";

pub fn png(tag: &str) -> Upload {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(tag.as_bytes());
    Upload::new(bytes).with_filename(format!("{tag}.png"))
}

pub fn jpeg(tag: &str) -> Upload {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.extend_from_slice(tag.as_bytes());
    Upload::new(bytes).with_filename(format!("{tag}.jpg"))
}

/// A PNG upload that [`FlakyAssetStore`] refuses.
pub fn broken_png() -> Upload {
    png("broken").with_filename(BROKEN_FILENAME)
}

/// In-memory store that fails on demand.
///
/// Uploads named [`BROKEN_FILENAME`] fail with a transport error after the
/// other uploads of the same batch had a chance to land. Removals fail when
/// built with [`FlakyAssetStore::refusing_removals`].
#[derive(Debug, Default)]
pub struct FlakyAssetStore {
    pub inner: InMemoryAssetStore,
    refuse_removals: bool,
    attempts: AtomicUsize,
}

impl FlakyAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing_removals() -> Self {
        Self {
            refuse_removals: true,
            ..Self::default()
        }
    }

    /// Number of `store` calls received, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetStore for FlakyAssetStore {
    async fn store(&self, upload: &Upload, folder: &str) -> AssetResult<AssetReference> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if upload.filename.as_deref() == Some(BROKEN_FILENAME) {
            tokio::task::yield_now().await;
            return Err(AssetError::Transport("connection reset by peer".into()));
        }
        self.inner.store(upload, folder).await
    }

    async fn remove(&self, handle: &DeletionHandle) -> AssetResult<()> {
        if self.refuse_removals {
            return Err(AssetError::Transport("object store unavailable".into()));
        }
        self.inner.remove(handle).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

/// Asset store that parks every upload until `uploads` of them are in
/// flight and the test calls [`BarrierAssetStore::release`].
#[derive(Debug)]
pub struct BarrierAssetStore {
    pub inner: InMemoryAssetStore,
    barrier: Barrier,
    waiting: AtomicUsize,
}

impl BarrierAssetStore {
    pub fn new(uploads: usize) -> Self {
        Self {
            inner: InMemoryAssetStore::new(),
            barrier: Barrier::new(uploads + 1),
            waiting: AtomicUsize::new(0),
        }
    }

    /// Join the barrier, letting the parked uploads through.
    pub async fn release(&self) {
        self.barrier.wait().await;
    }

    /// Uploads currently parked at the barrier.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetStore for BarrierAssetStore {
    async fn store(&self, upload: &Upload, folder: &str) -> AssetResult<AssetReference> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        self.barrier.wait().await;
        self.waiting.fetch_sub(1, Ordering::SeqCst);
        self.inner.store(upload, folder).await
    }

    async fn remove(&self, handle: &DeletionHandle) -> AssetResult<()> {
        self.inner.remove(handle).await
    }

    fn backend_name(&self) -> &'static str {
        "barrier"
    }
}

/// Record store whose `replace` blocks for `delay` when the record's
/// `venue` field equals `venue`.
#[derive(Debug)]
pub struct SlowReplaceStore {
    pub inner: InMemoryRecordStore,
    venue: &'static str,
    delay: Duration,
}

impl SlowReplaceStore {
    pub fn new(venue: &'static str, delay: Duration) -> Self {
        Self {
            inner: InMemoryRecordStore::new(),
            venue,
            delay,
        }
    }
}

impl RecordStore for SlowReplaceStore {
    fn insert(&self, record: &MediaRecord) -> StoreResult<()> {
        self.inner.insert(record)
    }

    fn get(&self, id: &RecordId) -> StoreResult<Option<MediaRecord>> {
        self.inner.get(id)
    }

    fn replace(&self, record: &MediaRecord) -> StoreResult<bool> {
        if record.field("venue") == Some(self.venue) {
            std::thread::sleep(self.delay);
        }
        self.inner.replace(record)
    }

    fn remove(&self, id: &RecordId) -> StoreResult<Option<MediaRecord>> {
        self.inner.remove(id)
    }

    fn scan(&self, kind: RecordKind) -> StoreResult<Vec<MediaRecord>> {
        self.inner.scan(kind)
    }

    fn backend_name(&self) -> &'static str {
        "slow-replace"
    }
}
