use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use marquee_assets::AssetStore;
use marquee_store::{RecordStore, StoreResult};
use marquee_types::{
    AssetReference, DeletionHandle, MediaRecord, RecordId, RecordKind, ResolvedDocument, Timestamp,
};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};

/// Outcome of releasing a batch of owned assets.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseReport {
    /// Handles that were removed, or were already gone.
    pub released: Vec<DeletionHandle>,
    /// Handles the asset store failed to remove.
    pub failed: Vec<DeletionHandle>,
}

impl ReleaseReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of [`PersistenceGateway::delete_by_id`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub id: RecordId,
    pub kind: RecordKind,
    #[serde(flatten)]
    pub assets: ReleaseReport,
}

/// Result of [`PersistenceGateway::update_by_id`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub record: MediaRecord,
    /// Asset references the update replaced or cleared.
    pub displaced: Vec<AssetReference>,
}

const RECORD_LOCK_STRIPES: usize = 64;

/// Schema-checked access to the record store.
///
/// Every write is validated against the kind's schema before it reaches the
/// store. Store calls are synchronous and run on the blocking pool.
///
/// Updates and deletes of one record are serialized: the read, merge and
/// replace of an update happen under a per-record lock, so a merge always
/// starts from the last committed state.
#[derive(Clone)]
pub struct PersistenceGateway {
    records: Arc<dyn RecordStore>,
    assets: Arc<dyn AssetStore>,
    record_locks: Arc<[Mutex<()>]>,
}

impl PersistenceGateway {
    pub fn new(records: Arc<dyn RecordStore>, assets: Arc<dyn AssetStore>) -> Self {
        let record_locks = (0..RECORD_LOCK_STRIPES).map(|_| Mutex::new(())).collect();
        Self {
            records,
            assets,
            record_locks,
        }
    }

    async fn lock_record(&self, id: RecordId) -> MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        let stripe = (hasher.finish() as usize) % self.record_locks.len();
        self.record_locks[stripe].lock().await
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    pub fn assets(&self) -> &Arc<dyn AssetStore> {
        &self.assets
    }

    async fn blocking<T, F>(&self, op: F) -> CoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn RecordStore) -> StoreResult<T> + Send + 'static,
    {
        let records = Arc::clone(&self.records);
        tokio::task::spawn_blocking(move || op(records.as_ref()))
            .await
            .map_err(|e| CoreError::Persistence(format!("store task failed: {e}")))?
            .map_err(CoreError::from)
    }

    /// Commit a create-mode document under a freshly assigned identifier.
    pub async fn create(&self, doc: &ResolvedDocument) -> CoreResult<MediaRecord> {
        if !doc.mode.is_create() {
            return Err(CoreError::Validation(
                "create requires a document without an identifier".into(),
            ));
        }
        let record = MediaRecord::from_document(RecordId::new(), doc, Timestamp::now());
        record.validate()?;

        let stored = record.clone();
        self.blocking(move |store| store.insert(&stored)).await?;
        info!(kind = %record.kind, id = %record.id, "record created");
        Ok(record)
    }

    /// Field-level merge of `doc` into the stored record `id`.
    ///
    /// The returned `displaced` list is computed from the record as it was
    /// when the merge committed.
    pub async fn update_by_id(
        &self,
        id: RecordId,
        doc: &ResolvedDocument,
    ) -> CoreResult<UpdateOutcome> {
        if doc.mode.target() != Some(id) {
            return Err(CoreError::Validation(format!(
                "document does not target record {id}"
            )));
        }
        let _guard = self.lock_record(id).await;
        let mut record = self.get(doc.kind, id).await?;
        let at = Timestamp::after(record.updated_at);
        let displaced = record.merge(doc, at);
        record.validate()?;

        let stored = record.clone();
        let replaced = self.blocking(move |store| store.replace(&stored)).await?;
        if !replaced {
            return Err(CoreError::not_found(doc.kind, id));
        }
        info!(
            kind = %record.kind,
            id = %record.id,
            displaced = displaced.len(),
            "record updated"
        );
        Ok(UpdateOutcome { record, displaced })
    }

    /// Read one record, or `None` if the identifier does not resolve to a
    /// record of `kind`.
    pub async fn find(&self, kind: RecordKind, id: RecordId) -> CoreResult<Option<MediaRecord>> {
        let found = self.blocking(move |store| store.get(&id)).await?;
        Ok(found.filter(|record| record.kind == kind))
    }

    pub async fn get(&self, kind: RecordKind, id: RecordId) -> CoreResult<MediaRecord> {
        self.find(kind, id)
            .await?
            .ok_or_else(|| CoreError::not_found(kind, id))
    }

    pub async fn scan(&self, kind: RecordKind) -> CoreResult<Vec<MediaRecord>> {
        self.blocking(move |store| store.scan(kind)).await
    }

    pub async fn count(&self, kind: RecordKind) -> CoreResult<usize> {
        self.blocking(move |store| store.count(kind)).await
    }

    /// Release every owned asset of the record, then remove the record.
    ///
    /// Asset removal failures are logged and reported but never block the
    /// record removal.
    pub async fn delete_by_id(&self, kind: RecordKind, id: RecordId) -> CoreResult<DeleteReport> {
        let _guard = self.lock_record(id).await;
        let record = self.get(kind, id).await?;
        let handles = record
            .owned_handles()
            .into_iter()
            .map(|(_, handle)| handle.clone())
            .collect::<Vec<_>>();
        let assets = self.release(handles).await;

        let removed = self.blocking(move |store| store.remove(&id)).await?;
        if removed.is_none() {
            return Err(CoreError::not_found(kind, id));
        }
        info!(
            kind = %kind,
            id = %id,
            released = assets.released.len(),
            failed = assets.failed.len(),
            "record deleted"
        );
        Ok(DeleteReport { id, kind, assets })
    }

    /// Best-effort removal of owned assets. Never fails.
    pub async fn release(
        &self,
        handles: impl IntoIterator<Item = DeletionHandle>,
    ) -> ReleaseReport {
        let mut report = ReleaseReport::default();
        for handle in handles {
            match self.assets.remove(&handle).await {
                Ok(()) => {
                    debug!(handle = %handle, "asset released");
                    report.released.push(handle);
                }
                Err(e) if e.is_not_found() => {
                    debug!(handle = %handle, "asset already gone");
                    report.released.push(handle);
                }
                Err(e) => {
                    warn!(handle = %handle, error = %e, "asset release failed");
                    report.failed.push(handle);
                }
            }
        }
        report
    }
}

impl std::fmt::Debug for PersistenceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceGateway")
            .field("records", &self.records.backend_name())
            .field("assets", &self.assets.backend_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use marquee_assets::InMemoryAssetStore;
    use marquee_store::InMemoryRecordStore;
    use marquee_types::{AssetReference, SlotValue, WriteMode};

    use super::*;
    use crate::testing::FlakyAssetStore;

    fn gateway() -> (PersistenceGateway, Arc<InMemoryAssetStore>) {
        let assets = Arc::new(InMemoryAssetStore::new());
        let gateway = PersistenceGateway::new(Arc::new(InMemoryRecordStore::new()), assets.clone());
        (gateway, assets)
    }

    async fn alert_doc(assets: &InMemoryAssetStore) -> ResolvedDocument {
        let image = assets
            .store(&crate::testing::png("alert"), "marquee/alerts")
            .await
            .unwrap();
        let mut doc = ResolvedDocument::new(RecordKind::EventAlert, WriteMode::Create);
        doc.fields.insert("title".into(), "Venue change".into());
        doc.fields.insert("message".into(), "Moved to Hall B".into());
        doc.fields.insert("severity".into(), "warning".into());
        doc.slots.insert("image".into(), SlotValue::Set(image));
        doc
    }

    #[tokio::test]
    async fn create_assigns_id_and_timestamps() {
        let (gateway, assets) = gateway();
        let record = gateway.create(&alert_doc(&assets).await).await.unwrap();
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(gateway.get(RecordKind::EventAlert, record.id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn create_rejects_invalid_document() {
        let (gateway, _) = gateway();
        let mut doc = ResolvedDocument::new(RecordKind::EventAlert, WriteMode::Create);
        doc.fields.insert("title".into(), "No message".into());
        let err = gateway.create(&doc).await.unwrap_err();
        assert!(err.is_validation(), "{err}");
        assert_eq!(gateway.count(RecordKind::EventAlert).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_merges_and_advances_updated_at() {
        let (gateway, assets) = gateway();
        let created = gateway.create(&alert_doc(&assets).await).await.unwrap();

        let mut patch =
            ResolvedDocument::new(RecordKind::EventAlert, WriteMode::Update(created.id));
        patch.fields.insert("message".into(), "Moved to Hall C".into());
        let outcome = gateway.update_by_id(created.id, &patch).await.unwrap();

        assert_eq!(outcome.record.field("message"), Some("Moved to Hall C"));
        assert_eq!(outcome.record.field("title"), Some("Venue change"));
        assert_eq!(outcome.record.asset("image"), created.asset("image"));
        assert!(outcome.record.updated_at > created.updated_at);
        assert_eq!(outcome.record.created_at, created.created_at);
        assert!(outcome.displaced.is_empty());
    }

    #[tokio::test]
    async fn update_reports_displaced_assets() {
        let (gateway, assets) = gateway();
        let created = gateway.create(&alert_doc(&assets).await).await.unwrap();

        let mut patch =
            ResolvedDocument::new(RecordKind::EventAlert, WriteMode::Update(created.id));
        patch.slots.insert("image".into(), SlotValue::Clear);
        let outcome = gateway.update_by_id(created.id, &patch).await.unwrap();

        assert!(outcome.record.asset("image").is_none());
        assert_eq!(outcome.displaced, vec![created.asset("image").unwrap().clone()]);
    }

    #[tokio::test]
    async fn update_of_unknown_or_other_kind_is_not_found() {
        let (gateway, assets) = gateway();
        let created = gateway.create(&alert_doc(&assets).await).await.unwrap();

        let unknown = RecordId::new();
        let patch = ResolvedDocument::new(RecordKind::EventAlert, WriteMode::Update(unknown));
        assert!(gateway.update_by_id(unknown, &patch).await.unwrap_err().is_not_found());

        let wrong_kind = ResolvedDocument::new(RecordKind::Event, WriteMode::Update(created.id));
        assert!(gateway
            .update_by_id(created.id, &wrong_kind)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn update_rejects_document_for_another_target() {
        let (gateway, assets) = gateway();
        let created = gateway.create(&alert_doc(&assets).await).await.unwrap();

        let elsewhere =
            ResolvedDocument::new(RecordKind::EventAlert, WriteMode::Update(RecordId::new()));
        let err = gateway.update_by_id(created.id, &elsewhere).await.unwrap_err();
        assert!(err.is_validation(), "{err}");

        let create_doc = ResolvedDocument::new(RecordKind::EventAlert, WriteMode::Create);
        let err = gateway.update_by_id(created.id, &create_doc).await.unwrap_err();
        assert!(err.is_validation(), "{err}");
        assert_eq!(gateway.get(RecordKind::EventAlert, created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn delete_releases_owned_assets_then_removes_record() {
        let (gateway, assets) = gateway();
        let created = gateway.create(&alert_doc(&assets).await).await.unwrap();
        let handle = created.asset("image").unwrap().handle.clone().unwrap();

        let report = gateway.delete_by_id(RecordKind::EventAlert, created.id).await.unwrap();
        assert_eq!(report.assets.released, vec![handle.clone()]);
        assert!(report.assets.is_clean());
        assert_eq!(assets.removed(), vec![handle]);
        assert!(gateway.find(RecordKind::EventAlert, created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_skips_linked_assets() {
        let (gateway, _) = gateway();
        let mut doc = ResolvedDocument::new(RecordKind::EventAlert, WriteMode::Create);
        doc.fields.insert("title".into(), "Shared banner".into());
        doc.fields.insert("message".into(), "See site".into());
        doc.slots.insert(
            "image".into(),
            SlotValue::Set(AssetReference::linked("https://cdn.example/banner.png")),
        );
        let created = gateway.create(&doc).await.unwrap();

        let report = gateway.delete_by_id(RecordKind::EventAlert, created.id).await.unwrap();
        assert!(report.assets.released.is_empty());
        assert!(report.assets.failed.is_empty());
    }

    #[tokio::test]
    async fn delete_twice_is_not_found() {
        let (gateway, assets) = gateway();
        let created = gateway.create(&alert_doc(&assets).await).await.unwrap();
        gateway.delete_by_id(RecordKind::EventAlert, created.id).await.unwrap();
        let err = gateway
            .delete_by_id(RecordKind::EventAlert, created.id)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn failing_asset_removal_does_not_block_delete() {
        let flaky = Arc::new(FlakyAssetStore::refusing_removals());
        let gateway = PersistenceGateway::new(Arc::new(InMemoryRecordStore::new()), flaky.clone());
        let image = flaky
            .store(&crate::testing::png("sticky"), "marquee/alerts")
            .await
            .unwrap();
        let mut doc = ResolvedDocument::new(RecordKind::EventAlert, WriteMode::Create);
        doc.fields.insert("title".into(), "Sticky".into());
        doc.fields.insert("message".into(), "Cannot release".into());
        doc.slots.insert("image".into(), SlotValue::Set(image.clone()));
        let created = gateway.create(&doc).await.unwrap();

        let report = gateway.delete_by_id(RecordKind::EventAlert, created.id).await.unwrap();
        assert_eq!(report.assets.failed, vec![image.handle.unwrap()]);
        assert!(gateway.find(RecordKind::EventAlert, created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn release_treats_missing_handles_as_released() {
        let (gateway, _) = gateway();
        let report = gateway
            .release(vec![DeletionHandle::new("marquee/events/never-stored.png")])
            .await;
        assert_eq!(report.released.len(), 1);
        assert!(report.is_clean());
    }

    #[test]
    fn delete_report_serializes_flat() {
        let report = DeleteReport {
            id: RecordId::new(),
            kind: RecordKind::Event,
            assets: ReleaseReport {
                released: vec![DeletionHandle::new("a")],
                failed: vec![],
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["released"][0], "a");
        assert_eq!(json["kind"], "event");
        assert!(json["failed"].as_array().unwrap().is_empty());
    }
}
