use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use bytes::Bytes;

use crate::error::TypeError;
use crate::id::RecordId;
use crate::record::AssetReference;
use crate::schema::RecordKind;

/// A binary attachment carried by an [`UpsertRequest`].
#[derive(Clone, PartialEq, Eq)]
pub struct Upload {
    pub bytes: Bytes,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

impl Upload {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: None,
            content_type: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("len", &self.bytes.len())
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// A single write request: creates a record when no identifier is supplied,
/// updates the identified record otherwise.
///
/// Transient; never persisted. Empty strings anywhere in the request count
/// as absent.
#[derive(Clone, Debug, Default)]
pub struct UpsertRequest {
    /// Caller-supplied record identifier.
    pub id: Option<String>,
    /// Raw scalar text fields, validated against the kind's schema.
    pub fields: BTreeMap<String, String>,
    /// New binaries keyed by asset slot name.
    pub uploads: BTreeMap<String, Upload>,
    /// Existing asset URLs the caller wants to keep, keyed by slot name.
    pub existing: BTreeMap<String, String>,
    /// Slots the caller explicitly wants emptied (update mode only).
    pub clear: BTreeSet<String>,
}

impl UpsertRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn upload(mut self, slot: impl Into<String>, upload: Upload) -> Self {
        self.uploads.insert(slot.into(), upload);
        self
    }

    pub fn existing(mut self, slot: impl Into<String>, url: impl Into<String>) -> Self {
        self.existing.insert(slot.into(), url.into());
        self
    }

    pub fn clear(mut self, slot: impl Into<String>) -> Self {
        self.clear.insert(slot.into());
        self
    }

    /// Adopt `candidate` as the identifier unless a non-empty one is
    /// already present. Lets transports merge several id sources where an
    /// explicit value wins over an empty sentinel.
    pub fn offer_id(&mut self, candidate: &str) {
        if self.identifier().is_none() && !candidate.trim().is_empty() {
            self.id = Some(candidate.trim().to_string());
        }
    }

    /// The trimmed identifier, if one was supplied and is non-empty.
    pub fn identifier(&self) -> Option<&str> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Create or update, decided solely by the presence of an identifier.
    pub fn mode(&self) -> Result<WriteMode, TypeError> {
        match self.identifier() {
            Some(id) => RecordId::parse(id).map(WriteMode::Update),
            None => Ok(WriteMode::Create),
        }
    }

    /// The non-empty existing-URL hint for `slot`.
    pub fn hint(&self, slot: &str) -> Option<&str> {
        self.existing
            .get(slot)
            .map(|url| url.trim())
            .filter(|url| !url.is_empty())
    }

    /// The non-empty upload for `slot`.
    pub fn upload_for(&self, slot: &str) -> Option<&Upload> {
        self.uploads.get(slot).filter(|upload| !upload.is_empty())
    }
}

/// Whether a resolved document creates a record or updates an existing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update(RecordId),
}

impl WriteMode {
    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create)
    }

    pub fn target(&self) -> Option<RecordId> {
        match self {
            Self::Create => None,
            Self::Update(id) => Some(*id),
        }
    }
}

/// Resolution of one asset slot in a [`ResolvedDocument`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotValue {
    Set(AssetReference),
    /// Keep the stored asset if it still has this URL, otherwise link the
    /// URL. Resolved against the record as it is at commit time.
    Keep(String),
    Clear,
}

/// The reconciled, committable form of an [`UpsertRequest`].
///
/// In update mode the document is partial: fields and slots that are absent
/// leave the stored values untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedDocument {
    pub kind: RecordKind,
    pub mode: WriteMode,
    pub fields: BTreeMap<String, String>,
    pub slots: BTreeMap<String, SlotValue>,
}

impl ResolvedDocument {
    pub fn new(kind: RecordKind, mode: WriteMode) -> Self {
        Self {
            kind,
            mode,
            fields: BTreeMap::new(),
            slots: BTreeMap::new(),
        }
    }
}
