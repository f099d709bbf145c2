use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use marquee_types::{MediaRecord, RecordId, RecordKind};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::RecordStore;

const RETIRED_DIR: &str = ".retired";

/// Directory-backed record store.
///
/// Layout under `root`:
///
/// ```text
/// <kind>/<id>.json   one pretty-printed JSON document per live record
/// .retired/<id>      empty tombstone for every removed identifier
/// ```
///
/// Documents are written to a temp file in the target directory and renamed
/// into place. Writers are serialized by a mutex; readers go straight to disk.
pub struct FileRecordStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileRecordStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        for kind in RecordKind::ALL {
            fs::create_dir_all(root.join(kind.as_str()))?;
        }
        fs::create_dir_all(root.join(RETIRED_DIR))?;
        debug!(root = %root.display(), "file record store opened");
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, kind: RecordKind, id: &RecordId) -> PathBuf {
        self.root.join(kind.as_str()).join(format!("{id}.json"))
    }

    fn tombstone_path(&self, id: &RecordId) -> PathBuf {
        self.root.join(RETIRED_DIR).join(id.to_string())
    }

    /// Locate the document for `id` regardless of kind.
    fn locate(&self, id: &RecordId) -> Option<PathBuf> {
        RecordKind::ALL
            .iter()
            .map(|kind| self.record_path(*kind, id))
            .find(|path| path.is_file())
    }

    fn read_record(path: &Path) -> StoreResult<Option<MediaRecord>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    fn write_record(&self, record: &MediaRecord) -> StoreResult<()> {
        let path = self.record_path(record.kind, &record.id);
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Serialization(format!("no parent for {}", path.display())))?;
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&json)?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl RecordStore for FileRecordStore {
    fn insert(&self, record: &MediaRecord) -> StoreResult<()> {
        let _guard = self.lock()?;
        if self.tombstone_path(&record.id).exists() {
            return Err(StoreError::Retired(record.id));
        }
        if self.locate(&record.id).is_some() {
            return Err(StoreError::Conflict(record.id));
        }
        self.write_record(record)?;
        debug!(id = %record.id, kind = %record.kind, "record inserted");
        Ok(())
    }

    fn get(&self, id: &RecordId) -> StoreResult<Option<MediaRecord>> {
        match self.locate(id) {
            Some(path) => Self::read_record(&path),
            None => Ok(None),
        }
    }

    fn replace(&self, record: &MediaRecord) -> StoreResult<bool> {
        let _guard = self.lock()?;
        match self.locate(&record.id) {
            Some(path) if path == self.record_path(record.kind, &record.id) => {
                self.write_record(record)?;
                Ok(true)
            }
            Some(path) => {
                warn!(id = %record.id, path = %path.display(), "replace across kinds refused");
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn remove(&self, id: &RecordId) -> StoreResult<Option<MediaRecord>> {
        let _guard = self.lock()?;
        let Some(path) = self.locate(id) else {
            return Ok(None);
        };
        let record = Self::read_record(&path)?;
        // Tombstone first so a crash between the two steps never frees the id.
        fs::File::create(self.tombstone_path(id))?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        debug!(id = %id, "record removed");
        Ok(record)
    }

    fn scan(&self, kind: RecordKind) -> StoreResult<Vec<MediaRecord>> {
        let dir = self.root.join(kind.as_str());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(record) = Self::read_record(&path)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

impl std::fmt::Debug for FileRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRecordStore")
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{alert, gallery_photo};

    fn open_temp() -> (tempfile::TempDir, FileRecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::open(dir.path().join("records")).unwrap();
        (dir, store)
    }

    #[test]
    fn insert_writes_one_document_per_record() {
        let (_dir, store) = open_temp();
        let record = gallery_photo("crowd");
        store.insert(&record).unwrap();

        let path = store.record_path(RecordKind::GalleryPhoto, &record.id);
        assert!(path.is_file());
        assert_eq!(store.get(&record.id).unwrap(), Some(record));
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let record = alert("Rain plan");
        {
            let store = FileRecordStore::open(dir.path()).unwrap();
            store.insert(&record).unwrap();
        }
        let reopened = FileRecordStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(&record.id).unwrap(), Some(record));
    }

    #[test]
    fn duplicate_insert_conflicts() {
        let (_dir, store) = open_temp();
        let record = gallery_photo("twice");
        store.insert(&record).unwrap();
        assert!(matches!(store.insert(&record), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn replace_overwrites_only_existing() {
        let (_dir, store) = open_temp();
        let mut record = gallery_photo("before");
        assert!(!store.replace(&record).unwrap());

        store.insert(&record).unwrap();
        record.fields.insert("caption".into(), "after".into());
        assert!(store.replace(&record).unwrap());
        assert_eq!(
            store.get(&record.id).unwrap().unwrap().field("caption"),
            Some("after")
        );
    }

    #[test]
    fn remove_retires_identifier_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let record = gallery_photo("gone");
        {
            let store = FileRecordStore::open(dir.path()).unwrap();
            store.insert(&record).unwrap();
            assert_eq!(store.remove(&record.id).unwrap(), Some(record.clone()));
            assert!(store.get(&record.id).unwrap().is_none());
            assert!(store.remove(&record.id).unwrap().is_none());
        }
        let reopened = FileRecordStore::open(dir.path()).unwrap();
        assert!(matches!(
            reopened.insert(&record),
            Err(StoreError::Retired(_))
        ));
    }

    #[test]
    fn scan_reads_only_requested_kind() {
        let (_dir, store) = open_temp();
        store.insert(&gallery_photo("one")).unwrap();
        store.insert(&gallery_photo("two")).unwrap();
        store.insert(&alert("Stage change")).unwrap();

        assert_eq!(store.scan(RecordKind::GalleryPhoto).unwrap().len(), 2);
        assert_eq!(store.count(RecordKind::EventAlert).unwrap(), 1);
        assert!(store.scan(RecordKind::TeamMember).unwrap().is_empty());
    }

    #[test]
    fn no_temp_files_remain_after_writes() {
        let (_dir, store) = open_temp();
        let mut record = gallery_photo("tidy");
        store.insert(&record).unwrap();
        record.fields.insert("caption".into(), "tidier".into());
        store.replace(&record).unwrap();

        let names: Vec<String> = fs::read_dir(store.root().join(RecordKind::GalleryPhoto.as_str()))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![format!("{}.json", record.id)]);
    }

    #[test]
    fn corrupt_document_is_reported() {
        let (_dir, store) = open_temp();
        let record = gallery_photo("broken");
        store.insert(&record).unwrap();
        let path = store.record_path(RecordKind::GalleryPhoto, &record.id);
        fs::write(&path, b"{ not json").unwrap();

        match store.get(&record.id) {
            Err(StoreError::Corrupt { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected corrupt error, got {other:?}"),
        }
        assert!(store.scan(RecordKind::GalleryPhoto).is_err());
    }
}
