//! Foundation types for Marquee, the festival content backend.
//!
//! This crate provides the identity, temporal, schema, and document types
//! used throughout the workspace. Every other Marquee crate depends on
//! `marquee-types`.
//!
//! # Key Types
//!
//! - [`RecordId`]: Store-assigned, time-ordered record identifier (UUID v7)
//! - [`Timestamp`]: UTC wall-clock instant with a strictly-increasing successor
//! - [`RecordKind`]: Closed set of record kinds, each with a static [`KindSchema`]
//! - [`MediaRecord`]: A persisted record: scalar fields plus named asset slots
//! - [`AssetReference`]: Resolved asset URL with an optional [`DeletionHandle`]
//! - [`UpsertRequest`]: Transient write request (fields, uploads, hints, clears)
//! - [`ResolvedDocument`]: Reconciled document ready for the persistence gateway

pub mod error;
pub mod id;
pub mod record;
pub mod request;
pub mod schema;
pub mod temporal;

pub use error::TypeError;
pub use id::RecordId;
pub use record::{is_remote_url, AssetReference, DeletionHandle, MediaRecord};
pub use request::{ResolvedDocument, SlotValue, Upload, UpsertRequest, WriteMode};
pub use schema::{FieldSpec, KindSchema, NormalizedFields, RecordKind, SlotSpec};
pub use temporal::Timestamp;
