use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use marquee_types::{MediaRecord, RecordId, RecordKind};

use crate::error::{StoreError, StoreResult};
use crate::traits::RecordStore;

#[derive(Default)]
struct StoreState {
    records: HashMap<RecordId, MediaRecord>,
    retired: HashSet<RecordId>,
}

/// In-memory, HashMap-based record store.
///
/// Intended for tests and embedding. All records are held behind a single
/// `RwLock`; records are cloned on read and write. Data is lost when the
/// store is dropped.
pub struct InMemoryRecordStore {
    inner: RwLock<StoreState>,
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreState::default()),
        }
    }

    /// Total number of live records across all kinds.
    pub fn len(&self) -> usize {
        self.inner.read().map(|s| s.records.len()).unwrap_or(0)
    }

    /// Returns `true` if the store holds no live records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `id` belonged to a record that has been removed.
    pub fn is_retired(&self, id: &RecordId) -> bool {
        self.inner
            .read()
            .map(|s| s.retired.contains(id))
            .unwrap_or(false)
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn insert(&self, record: &MediaRecord) -> StoreResult<()> {
        let mut state = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        if state.retired.contains(&record.id) {
            return Err(StoreError::Retired(record.id));
        }
        if state.records.contains_key(&record.id) {
            return Err(StoreError::Conflict(record.id));
        }
        state.records.insert(record.id, record.clone());
        Ok(())
    }

    fn get(&self, id: &RecordId) -> StoreResult<Option<MediaRecord>> {
        let state = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.records.get(id).cloned())
    }

    fn replace(&self, record: &MediaRecord) -> StoreResult<bool> {
        let mut state = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        match state.records.get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(&self, id: &RecordId) -> StoreResult<Option<MediaRecord>> {
        let mut state = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let removed = state.records.remove(id);
        if removed.is_some() {
            state.retired.insert(*id);
        }
        Ok(removed)
    }

    fn scan(&self, kind: RecordKind) -> StoreResult<Vec<MediaRecord>> {
        let state = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .records
            .values()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect())
    }

    fn count(&self, kind: RecordKind) -> StoreResult<usize> {
        let state = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.records.values().filter(|r| r.kind == kind).count())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("record_count", &self.len())
            .finish()
    }
}
