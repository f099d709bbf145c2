use marquee_types::{MediaRecord, RecordId, RecordKind};

use crate::error::StoreResult;

/// Keyed document store for media records.
///
/// All implementations must satisfy these invariants:
/// - Each operation is atomic for the single document it touches.
/// - `insert` never overwrites: an existing identifier is a
///   [`StoreError::Conflict`](crate::StoreError::Conflict) and a removed one
///   is [`StoreError::Retired`](crate::StoreError::Retired).
/// - `replace` only overwrites an existing record and returns `false` when
///   the identifier does not resolve.
/// - Concurrent reads are always safe.
pub trait RecordStore: Send + Sync {
    /// Store a new record under its identifier.
    fn insert(&self, record: &MediaRecord) -> StoreResult<()>;

    /// Read a record by identifier. Returns `Ok(None)` if it does not exist.
    fn get(&self, id: &RecordId) -> StoreResult<Option<MediaRecord>>;

    /// Overwrite an existing record. Returns `false` if it does not exist.
    fn replace(&self, record: &MediaRecord) -> StoreResult<bool>;

    /// Remove a record and retire its identifier. Returns the removed
    /// record, or `None` if it did not exist.
    fn remove(&self, id: &RecordId) -> StoreResult<Option<MediaRecord>>;

    /// All records of one kind, in no particular order.
    fn scan(&self, kind: RecordKind) -> StoreResult<Vec<MediaRecord>>;

    /// Number of records of one kind.
    ///
    /// Default implementation scans. Backends may override.
    fn count(&self, kind: RecordKind) -> StoreResult<usize> {
        Ok(self.scan(kind)?.len())
    }

    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}
