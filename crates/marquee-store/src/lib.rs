//! Document storage for Marquee records.
//!
//! A record store is a keyed document store: one [`MediaRecord`] per
//! [`RecordId`], grouped by [`RecordKind`]. It provides per-document
//! atomicity for insert, replace and remove and nothing more; schema rules
//! are enforced one layer up by the persistence gateway in `marquee-core`.
//!
//! # Storage Backends
//!
//! All backends implement the [`RecordStore`] trait:
//!
//! - [`InMemoryRecordStore`] -- `HashMap`-based store for tests and embedding
//! - [`FileRecordStore`] -- one JSON document per record under a root directory
//!
//! # Design Rules
//!
//! 1. Identifiers are assigned once and never reused: a removed identifier
//!    is retired and can never be inserted again.
//! 2. Inserting a live identifier is a conflict; inserting a retired one
//!    is refused as retired.
//! 3. Replacing a missing record reports `false` instead of creating it.
//! 4. All I/O errors are propagated, never silently ignored.
//!
//! [`MediaRecord`]: marquee_types::MediaRecord
//! [`RecordId`]: marquee_types::RecordId
//! [`RecordKind`]: marquee_types::RecordKind

pub mod config;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use config::{open_record_store, StorageConfig};
pub use error::{StoreError, StoreResult};
pub use file::FileRecordStore;
pub use memory::InMemoryRecordStore;
pub use traits::RecordStore;
