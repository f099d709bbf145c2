use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::id::RecordId;
use crate::request::{ResolvedDocument, SlotValue};
use crate::schema::RecordKind;
use crate::temporal::Timestamp;

/// Opaque token returned by the asset store, used to later remove one
/// specific uploaded binary.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeletionHandle(String);

impl DeletionHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DeletionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeletionHandle({})", self.0)
    }
}

impl fmt::Display for DeletionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One resolved asset: its public URL and, when the record owns the
/// underlying binary, the handle needed to release it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetReference {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<DeletionHandle>,
}

impl AssetReference {
    /// An asset uploaded on behalf of a record, releasable through `handle`.
    pub fn owned(url: impl Into<String>, handle: DeletionHandle) -> Self {
        Self {
            url: url.into(),
            handle: Some(handle),
        }
    }

    /// An asset the record points at but does not own.
    pub fn linked(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            handle: None,
        }
    }

    pub fn is_owned(&self) -> bool {
        self.handle.is_some()
    }
}

/// Returns `true` for absolute `http://` or `https://` URLs with a host part.
pub fn is_remote_url(url: &str) -> bool {
    ["https://", "http://"].iter().any(|scheme| {
        url.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
            && url.len() > scheme.len()
            && !url[scheme.len()..].starts_with('/')
    })
}

/// A persisted record of any kind.
///
/// Scalar attributes and asset slots are keyed by the names declared in the
/// kind's [`KindSchema`](crate::KindSchema). An absent slot key means the
/// slot is empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub id: RecordId,
    pub kind: RecordKind,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub assets: BTreeMap<String, AssetReference>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl MediaRecord {
    /// Materialize a create-mode document under a freshly assigned id.
    ///
    /// `Clear` slot values carry no meaning for a new record and are skipped.
    pub fn from_document(id: RecordId, doc: &ResolvedDocument, at: Timestamp) -> Self {
        let assets = doc
            .slots
            .iter()
            .filter_map(|(slot, value)| match value {
                SlotValue::Set(asset) => Some((slot.clone(), asset.clone())),
                SlotValue::Keep(url) => Some((slot.clone(), AssetReference::linked(url))),
                SlotValue::Clear => None,
            })
            .collect();
        Self {
            id,
            kind: doc.kind,
            fields: doc.fields.clone(),
            assets,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn asset(&self, slot: &str) -> Option<&AssetReference> {
        self.assets.get(slot)
    }

    pub fn asset_url(&self, slot: &str) -> Option<&str> {
        self.assets.get(slot).map(|a| a.url.as_str())
    }

    /// Deletion handles for every slot whose binary this record owns.
    pub fn owned_handles(&self) -> Vec<(&str, &DeletionHandle)> {
        self.assets
            .iter()
            .filter_map(|(slot, asset)| asset.handle.as_ref().map(|h| (slot.as_str(), h)))
            .collect()
    }

    /// Field-level merge of a partial document into this record.
    ///
    /// Keys present in `doc` overwrite; keys absent are left untouched.
    /// `updated_at` is set to `at`. Returns the asset references that were
    /// displaced (replaced with a different URL, or cleared).
    pub fn merge(&mut self, doc: &ResolvedDocument, at: Timestamp) -> Vec<AssetReference> {
        for (name, value) in &doc.fields {
            self.fields.insert(name.clone(), value.clone());
        }

        let mut displaced = Vec::new();
        for (slot, value) in &doc.slots {
            let previous = match value {
                SlotValue::Set(asset) => self.assets.insert(slot.clone(), asset.clone()),
                SlotValue::Keep(url) => match self.assets.get(slot) {
                    Some(stored) if stored.url == *url => None,
                    _ => self
                        .assets
                        .insert(slot.clone(), AssetReference::linked(url.clone())),
                },
                SlotValue::Clear => self.assets.remove(slot),
            };
            if let Some(previous) = previous {
                let still_referenced = self
                    .assets
                    .get(slot)
                    .is_some_and(|current| current.url == previous.url);
                if !still_referenced {
                    displaced.push(previous);
                }
            }
        }

        self.updated_at = at;
        displaced
    }

    /// Check this record against its kind's schema.
    ///
    /// Every required field and slot must be populated, values must respect
    /// the allowed sets, no undeclared keys may be present, and every asset
    /// URL must be an absolute http(s) URL.
    pub fn validate(&self) -> Result<(), TypeError> {
        let schema = self.kind.schema();

        for name in self.fields.keys() {
            if !schema.has_field(name) {
                return Err(TypeError::UnknownField {
                    kind: self.kind.to_string(),
                    field: name.clone(),
                });
            }
        }
        for spec in schema.fields {
            match self.fields.get(spec.name) {
                Some(value) => {
                    if spec.normalize(value)?.is_none() && spec.required {
                        return Err(schema.missing_field(spec.name));
                    }
                }
                None if spec.required => return Err(schema.missing_field(spec.name)),
                None => {}
            }
        }

        for (slot, asset) in &self.assets {
            if schema.slot(slot).is_none() {
                return Err(TypeError::UnknownSlot {
                    kind: self.kind.to_string(),
                    slot: slot.clone(),
                });
            }
            if !is_remote_url(&asset.url) {
                return Err(TypeError::InvalidAssetUrl {
                    slot: slot.clone(),
                    url: asset.url.clone(),
                });
            }
        }
        for spec in schema.required_slots() {
            if !self.assets.contains_key(spec.name) {
                return Err(schema.missing_slot(spec.name));
            }
        }
        Ok(())
    }
}
