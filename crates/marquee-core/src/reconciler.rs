//! Upsert reconciliation.
//!
//! One upsert runs in four phases:
//!
//! 1. **Pre-flight** -- decide create or update, normalize scalar fields,
//!    resolve every declared slot to an upload, a kept reference, a clear,
//!    or nothing, and confirm the update target exists. Nothing has been
//!    uploaded yet, so a rejected request leaves no trace.
//! 2. **Fan-out** -- every scheduled upload is spawned onto a `JoinSet`.
//! 3. **Fan-in** -- all uploads are drained. One failure fails the upsert;
//!    the others still run to completion and their assets are orphaned.
//! 4. **Commit** -- the resolved document goes to the gateway, then owned
//!    assets displaced by an update are released.
//!
//! Slot precedence is new upload, then existing-URL hint, then explicit
//! clear. A slot with none of these is left out of an update document so
//! the stored value is retained.

use std::collections::BTreeMap;
use std::sync::Arc;

use marquee_assets::{AssetConfig, AssetError, AssetStore};
use marquee_types::{
    is_remote_url, AssetReference, MediaRecord, RecordKind, ResolvedDocument, SlotValue,
    TypeError, Upload, UpsertRequest, WriteMode,
};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::ReconcileConfig;
use crate::error::{CoreError, CoreResult};
use crate::gateway::PersistenceGateway;

/// What pre-flight decided for the declared slots of one request.
#[derive(Debug, Default)]
struct SlotPlan {
    uploads: Vec<(String, Upload)>,
    resolved: BTreeMap<String, SlotValue>,
}

/// Turns upsert requests into committed records.
#[derive(Clone)]
pub struct Reconciler {
    gateway: PersistenceGateway,
    assets: Arc<dyn AssetStore>,
    folders: BTreeMap<RecordKind, String>,
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(gateway: PersistenceGateway, assets: &AssetConfig, config: ReconcileConfig) -> Self {
        let folders = RecordKind::ALL
            .into_iter()
            .map(|kind| (kind, assets.folder_for(kind.folder())))
            .collect();
        Self {
            assets: Arc::clone(gateway.assets()),
            gateway,
            folders,
            config,
        }
    }

    /// Asset store folder receiving uploads for `kind`.
    pub fn folder(&self, kind: RecordKind) -> &str {
        self.folders
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.folder())
    }

    /// Create or update one record of `kind` from `request`.
    pub async fn reconcile(
        &self,
        kind: RecordKind,
        request: UpsertRequest,
    ) -> CoreResult<MediaRecord> {
        let mode = request.mode()?;
        let schema = kind.schema();

        let normalized = schema.normalize_fields(&request.fields, mode.is_create())?;
        for name in &normalized.dropped {
            debug!(kind = %kind, field = %name, "dropping undeclared field");
        }
        log_undeclared_slots(kind, &request);

        if let WriteMode::Update(id) = mode {
            self.gateway.get(kind, id).await?;
        }
        let plan = plan_slots(kind, &request, mode.is_create())?;

        let uploaded = self.upload_all(kind, plan.uploads).await?;

        let mut doc = ResolvedDocument::new(kind, mode);
        doc.fields = normalized.fields;
        doc.slots = plan.resolved;
        let fresh: Vec<AssetReference> = uploaded.iter().map(|(_, a)| a.clone()).collect();
        for (slot, asset) in uploaded {
            doc.slots.insert(slot, SlotValue::Set(asset));
        }

        let committed = match mode {
            WriteMode::Create => self.gateway.create(&doc).await,
            WriteMode::Update(id) => match self.gateway.update_by_id(id, &doc).await {
                Ok(outcome) => {
                    self.release_displaced(&outcome.record, outcome.displaced).await;
                    Ok(outcome.record)
                }
                Err(err) => Err(err),
            },
        };

        match committed {
            Ok(record) => {
                info!(
                    kind = %kind,
                    id = %record.id,
                    created = mode.is_create(),
                    uploads = fresh.len(),
                    "upsert committed"
                );
                Ok(record)
            }
            Err(err) => {
                self.abandon(kind, fresh).await;
                Err(err)
            }
        }
    }

    /// Upload every scheduled binary concurrently and wait for all of them.
    async fn upload_all(
        &self,
        kind: RecordKind,
        uploads: Vec<(String, Upload)>,
    ) -> CoreResult<Vec<(String, AssetReference)>> {
        if uploads.is_empty() {
            return Ok(Vec::new());
        }
        let folder = self.folder(kind).to_string();
        let mut tasks = JoinSet::new();
        for (slot, upload) in uploads {
            let assets = Arc::clone(&self.assets);
            let folder = folder.clone();
            tasks.spawn(async move {
                let result = assets.store(&upload, &folder).await;
                (slot, result)
            });
        }

        let mut stored = Vec::new();
        let mut first_error: Option<AssetError> = None;
        while let Some(joined) = tasks.join_next().await {
            let (slot, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(kind = %kind, error = %e, "upload task did not complete");
                    if first_error.is_none() {
                        first_error =
                            Some(AssetError::Transport(format!("upload task failed: {e}")));
                    }
                    continue;
                }
            };
            match result {
                Ok(asset) => {
                    debug!(kind = %kind, slot = %slot, url = %asset.url, "asset uploaded");
                    stored.push((slot, asset));
                }
                Err(e) => {
                    warn!(kind = %kind, slot = %slot, error = %e, "asset upload failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            None => Ok(stored),
            Some(err) => {
                self.abandon(kind, stored.into_iter().map(|(_, asset)| asset).collect())
                    .await;
                Err(CoreError::Upload(err))
            }
        }
    }

    /// Deal with assets uploaded for an upsert that did not commit.
    async fn abandon(&self, kind: RecordKind, assets: Vec<AssetReference>) {
        let handles: Vec<_> = assets.into_iter().filter_map(|a| a.handle).collect();
        if handles.is_empty() {
            return;
        }
        if self.config.release_orphans_on_failure {
            let report = self.gateway.release(handles).await;
            info!(
                kind = %kind,
                released = report.released.len(),
                failed = report.failed.len(),
                "released assets of failed upsert"
            );
        } else {
            for handle in &handles {
                warn!(kind = %kind, handle = %handle, "orphaned asset left in store");
            }
        }
    }

    /// Release owned assets an update displaced, unless the committed
    /// record still points at the same URL from another slot.
    async fn release_displaced(&self, record: &MediaRecord, displaced: Vec<AssetReference>) {
        let handles: Vec<_> = displaced
            .into_iter()
            .filter(|old| !record.assets.values().any(|a| a.url == old.url))
            .filter_map(|old| old.handle)
            .collect();
        if handles.is_empty() {
            return;
        }
        if !self.config.release_replaced_assets {
            for handle in &handles {
                debug!(id = %record.id, handle = %handle, "keeping displaced asset");
            }
            return;
        }
        let report = self.gateway.release(handles).await;
        debug!(
            id = %record.id,
            released = report.released.len(),
            failed = report.failed.len(),
            "displaced assets released"
        );
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("gateway", &self.gateway)
            .field("config", &self.config)
            .finish()
    }
}

fn log_undeclared_slots(kind: RecordKind, request: &UpsertRequest) {
    let schema = kind.schema();
    let named = request
        .uploads
        .keys()
        .chain(request.existing.keys())
        .chain(request.clear.iter());
    for slot in named {
        if schema.slot(slot).is_none() {
            debug!(kind = %kind, slot = %slot, "dropping undeclared asset slot");
        }
    }
}

/// Resolve every declared slot of `kind` without touching the asset store.
///
/// In an update, a hint becomes [`SlotValue::Keep`] so that it is matched
/// against the stored asset at commit time, not against a pre-flight read.
fn plan_slots(kind: RecordKind, request: &UpsertRequest, creating: bool) -> CoreResult<SlotPlan> {
    let schema = kind.schema();
    let mut plan = SlotPlan::default();

    for spec in schema.slots {
        let name = spec.name;
        if let Some(upload) = request.upload_for(name) {
            plan.uploads.push((name.to_string(), upload.clone()));
        } else if let Some(hint) = request.hint(name) {
            if !is_remote_url(hint) {
                return Err(TypeError::InvalidAssetUrl {
                    slot: name.to_string(),
                    url: hint.to_string(),
                }
                .into());
            }
            let value = if creating {
                SlotValue::Set(AssetReference::linked(hint))
            } else {
                SlotValue::Keep(hint.to_string())
            };
            plan.resolved.insert(name.to_string(), value);
        } else if !creating && request.clear.contains(name) {
            if spec.required {
                return Err(CoreError::Validation(format!(
                    "{kind}: required asset `{name}` cannot be cleared"
                )));
            }
            plan.resolved.insert(name.to_string(), SlotValue::Clear);
        } else if creating && spec.required {
            return Err(TypeError::MissingSlot {
                kind: kind.to_string(),
                slot: name.to_string(),
            }
            .into());
        }
    }
    Ok(plan)
}
