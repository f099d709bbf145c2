//! Core write and read paths for Marquee.
//!
//! This is the main entry point for applications embedding Marquee: the
//! HTTP server and the CLI both go through [`Cms`].
//!
//! - [`Reconciler`] -- turns an [`UpsertRequest`](marquee_types::UpsertRequest)
//!   into a committed record, uploading binaries concurrently
//! - [`PersistenceGateway`] -- schema-checked create, merge-update and delete
//!   over a [`RecordStore`](marquee_store::RecordStore), releasing assets on delete
//! - [`QueryService`] -- filtered, sorted collection reads

pub mod cms;
pub mod config;
pub mod error;
pub mod gateway;
pub mod query;
pub mod reconciler;

#[cfg(test)]
pub(crate) mod testing;

pub use cms::Cms;
pub use config::{CmsConfig, ReconcileConfig};
pub use error::{CoreError, CoreResult};
pub use gateway::{DeleteReport, PersistenceGateway, ReleaseReport, UpdateOutcome};
pub use query::{Direction, ListQuery, QueryService, SortKey, SortSpec};
pub use reconciler::Reconciler;

// Re-export key types
pub use marquee_types::{
    AssetReference, MediaRecord, RecordId, RecordKind, Upload, UpsertRequest,
};
