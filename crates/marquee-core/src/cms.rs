use std::sync::Arc;

use marquee_assets::{build_asset_store, AssetStore};
use marquee_store::{open_record_store, RecordStore};
use marquee_types::{MediaRecord, RecordId, RecordKind, UpsertRequest};

use crate::config::CmsConfig;
use crate::error::{CoreError, CoreResult};
use crate::gateway::{DeleteReport, PersistenceGateway};
use crate::query::{ListQuery, QueryService};
use crate::reconciler::Reconciler;

/// The content backend: upserts, deletes and collection reads for every
/// record kind, over one record store and one asset store.
///
/// Cheap to clone; clones share both stores.
#[derive(Clone, Debug)]
pub struct Cms {
    gateway: PersistenceGateway,
    reconciler: Reconciler,
    query: QueryService,
}

impl Cms {
    /// Open the configured stores and assemble the backend.
    pub fn from_config(config: &CmsConfig) -> CoreResult<Self> {
        let assets = build_asset_store(&config.assets)
            .map_err(|e| CoreError::Config(format!("asset store: {e}")))?;
        let records = open_record_store(&config.storage)
            .map_err(|e| CoreError::Config(format!("record store: {e}")))?;
        Ok(Self::with_stores(records, assets, config))
    }

    /// Assemble the backend over already-constructed stores.
    pub fn with_stores(
        records: Arc<dyn RecordStore>,
        assets: Arc<dyn AssetStore>,
        config: &CmsConfig,
    ) -> Self {
        let gateway = PersistenceGateway::new(records, assets);
        let reconciler = Reconciler::new(gateway.clone(), &config.assets, config.reconcile.clone());
        let query = QueryService::new(gateway.clone());
        Self {
            gateway,
            reconciler,
            query,
        }
    }

    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Create a record, or update the one named by the request identifier.
    pub async fn upsert(
        &self,
        kind: RecordKind,
        request: UpsertRequest,
    ) -> CoreResult<MediaRecord> {
        self.reconciler.reconcile(kind, request).await
    }

    pub async fn get(&self, kind: RecordKind, id: &str) -> CoreResult<MediaRecord> {
        let id = RecordId::parse(id)?;
        self.query.get(kind, id).await
    }

    pub async fn list(&self, kind: RecordKind, query: &ListQuery) -> CoreResult<Vec<MediaRecord>> {
        self.query.list(kind, query).await
    }

    pub async fn delete(&self, kind: RecordKind, id: &str) -> CoreResult<DeleteReport> {
        let id = RecordId::parse(id)?;
        self.gateway.delete_by_id(kind, id).await
    }

    pub async fn count(&self, kind: RecordKind) -> CoreResult<usize> {
        self.gateway.count(kind).await
    }

    /// Backend names of the record store and the asset store.
    pub fn backends(&self) -> (&'static str, &'static str) {
        (
            self.gateway.records().backend_name(),
            self.gateway.assets().backend_name(),
        )
    }
}

#[cfg(test)]
mod tests {
    use marquee_assets::InMemoryAssetStore;
    use marquee_store::InMemoryRecordStore;

    use super::*;
    use crate::testing::{broken_png, png, FlakyAssetStore};
    use crate::query::{Direction, SortKey, SortSpec};

    fn cms() -> (Cms, Arc<InMemoryAssetStore>) {
        let assets = Arc::new(InMemoryAssetStore::new());
        let cms = Cms::with_stores(
            Arc::new(InMemoryRecordStore::new()),
            assets.clone(),
            &CmsConfig::in_memory(),
        );
        (cms, assets)
    }

    fn hackathon() -> UpsertRequest {
        UpsertRequest::new()
            .field("title", "Hackathon")
            .field("category", "tech-event")
            .upload("poster", png("poster-v1"))
            .upload("logo", png("logo-v1"))
    }

    #[tokio::test]
    async fn hackathon_lifecycle() {
        let (cms, assets) = cms();

        // Create with both binaries.
        let created = cms.upsert(RecordKind::Event, hackathon()).await.unwrap();
        let poster = created.asset("poster").unwrap().clone();
        let logo = created.asset("logo").unwrap().clone();
        assert!(!poster.url.is_empty());
        assert!(!logo.url.is_empty());

        // New poster, logo kept through its hint.
        let update = UpsertRequest::new()
            .with_id(created.id.to_string())
            .upload("poster", png("poster-v2"))
            .existing("logo", logo.url.clone());
        let updated = cms.upsert(RecordKind::Event, update).await.unwrap();
        let new_poster = updated.asset("poster").unwrap().clone();
        assert_ne!(new_poster.url, poster.url);
        assert_eq!(updated.asset_url("logo"), Some(logo.url.as_str()));
        assert_eq!(updated.id, created.id);

        // Delete releases both current assets and removes the record.
        let report = cms
            .delete(RecordKind::Event, &created.id.to_string())
            .await
            .unwrap();
        let mut released = report.assets.released.clone();
        released.sort();
        let mut expected = vec![new_poster.handle.unwrap(), logo.handle.unwrap()];
        expected.sort();
        assert_eq!(released, expected);

        for handle in &expected {
            assert!(assets.removed().contains(handle));
        }
        assert!(assets.is_empty());
        let listed = cms.list(RecordKind::Event, &ListQuery::new()).await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn retained_asset_survives_later_reads() {
        let (cms, _) = cms();
        let created = cms.upsert(RecordKind::Event, hackathon()).await.unwrap();
        let poster_url = created.asset_url("poster").unwrap().to_string();

        for venue in ["Hall A", "Hall B"] {
            let patch = UpsertRequest::new()
                .with_id(created.id.to_string())
                .field("venue", venue);
            cms.upsert(RecordKind::Event, patch).await.unwrap();
        }

        let by_id = cms.get(RecordKind::Event, &created.id.to_string()).await.unwrap();
        assert_eq!(by_id.asset_url("poster"), Some(poster_url.as_str()));
        assert_eq!(by_id.field("venue"), Some("Hall B"));
        let listed = cms.list(RecordKind::Event, &ListQuery::new()).await.unwrap();
        assert_eq!(listed[0].asset_url("poster"), Some(poster_url.as_str()));
    }

    #[tokio::test]
    async fn failed_upload_never_commits_partial_record() {
        let flaky = Arc::new(FlakyAssetStore::new());
        let cms = Cms::with_stores(
            Arc::new(InMemoryRecordStore::new()),
            flaky.clone(),
            &CmsConfig::in_memory(),
        );
        let request = UpsertRequest::new()
            .field("title", "Hackathon")
            .upload("poster", png("poster"))
            .upload("logo", broken_png());

        let err = cms.upsert(RecordKind::Event, request).await.unwrap_err();
        assert_eq!(err.kind(), "upload");
        assert_eq!(cms.count(RecordKind::Event).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn created_ids_are_unique() {
        let (cms, _) = cms();
        let mut ids = std::collections::HashSet::new();
        for i in 0..10 {
            let request = UpsertRequest::new()
                .field("caption", format!("shot {i}"))
                .upload("image", png(&format!("shot-{i}")));
            let record = cms.upsert(RecordKind::GalleryPhoto, request).await.unwrap();
            assert!(ids.insert(record.id));
        }
        assert_eq!(cms.count(RecordKind::GalleryPhoto).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn delete_is_safe_to_repeat() {
        let (cms, _) = cms();
        let created = cms.upsert(RecordKind::Event, hackathon()).await.unwrap();
        let id = created.id.to_string();
        cms.delete(RecordKind::Event, &id).await.unwrap();
        assert!(cms.delete(RecordKind::Event, &id).await.unwrap_err().is_not_found());
        assert!(cms.delete(RecordKind::Event, &id).await.unwrap_err().is_not_found());
        assert!(cms
            .delete(RecordKind::Event, &RecordId::new().to_string())
            .await
            .unwrap_err()
            .is_not_found());
        assert!(cms.delete(RecordKind::Event, "not-an-id").await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn create_then_filtered_list_round_trips_fields() {
        let (cms, _) = cms();
        let created = cms.upsert(RecordKind::Event, hackathon()).await.unwrap();
        cms.upsert(
            RecordKind::Event,
            UpsertRequest::new()
                .field("title", "Battle of Bands")
                .field("category", "cultural")
                .upload("poster", png("bands-poster"))
                .upload("logo", png("bands-logo")),
        )
        .await
        .unwrap();

        let listed = cms
            .list(
                RecordKind::Event,
                &ListQuery::new().filter("category", "tech-event"),
            )
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
        assert_eq!(listed[0].fields, created.fields);
    }

    #[tokio::test]
    async fn list_orders_newest_first_by_default() {
        let (cms, _) = cms();
        let mut titles = Vec::new();
        for title in ["First", "Second", "Third"] {
            let request = UpsertRequest::new()
                .field("title", title)
                .field("message", "hello");
            cms.upsert(RecordKind::EventAlert, request).await.unwrap();
            titles.push(title);
        }
        let listed = cms.list(RecordKind::EventAlert, &ListQuery::new()).await.unwrap();
        let got: Vec<_> = listed.iter().filter_map(|r| r.field("title")).collect();
        assert_eq!(got, vec!["Third", "Second", "First"]);

        let ascending = cms
            .list(
                RecordKind::EventAlert,
                &ListQuery::new()
                    .sort_by(SortSpec::new(SortKey::Field("title".into()), Direction::Asc)),
            )
            .await
            .unwrap();
        assert_eq!(ascending[0].field("title"), Some("First"));
    }

    #[test]
    fn from_config_builds_memory_backends() {
        let cms = Cms::from_config(&CmsConfig::in_memory()).unwrap();
        assert_eq!(cms.backends(), ("memory", "memory"));
    }

    #[test]
    fn from_config_with_file_stores() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CmsConfig::default();
        config.storage = marquee_store::StorageConfig::File {
            root: dir.path().join("records"),
        };
        config.assets.backend = marquee_assets::AssetBackendConfig::Filesystem {
            root: dir.path().join("assets"),
            public_base_url: "http://127.0.0.1:5000/assets".into(),
        };
        let cms = Cms::from_config(&config).unwrap();
        assert_eq!(cms.backends(), ("file", "filesystem"));
    }
}
