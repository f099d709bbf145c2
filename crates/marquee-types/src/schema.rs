use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The closed set of record kinds the backend manages.
///
/// Every kind owns a static [`KindSchema`]; the reconciler, gateway and
/// query service are generic over it and never branch on the variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordKind {
    Event,
    TeamMember,
    GalleryPhoto,
    EventAlert,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Event,
        RecordKind::TeamMember,
        RecordKind::GalleryPhoto,
        RecordKind::EventAlert,
    ];

    /// The schema governing records of this kind.
    pub fn schema(self) -> &'static KindSchema {
        match self {
            Self::Event => &EVENT_SCHEMA,
            Self::TeamMember => &TEAM_MEMBER_SCHEMA,
            Self::GalleryPhoto => &GALLERY_PHOTO_SCHEMA,
            Self::EventAlert => &EVENT_ALERT_SCHEMA,
        }
    }

    /// Stable wire name (matches the serde representation).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::TeamMember => "teamMember",
            Self::GalleryPhoto => "galleryPhoto",
            Self::EventAlert => "eventAlert",
        }
    }

    /// Canonical collection path segment.
    pub fn route(self) -> &'static str {
        match self {
            Self::Event => "events",
            Self::TeamMember => "team",
            Self::GalleryPhoto => "gallery",
            Self::EventAlert => "alerts",
        }
    }

    /// Asset store folder for this kind's uploads, below the configured prefix.
    pub fn folder(self) -> &'static str {
        match self {
            Self::Event => "events",
            Self::TeamMember => "team",
            Self::GalleryPhoto => "gallery",
            Self::EventAlert => "alerts",
        }
    }

    /// Resolve a collection path segment or wire name, including the
    /// singular and plural aliases.
    pub fn from_route(segment: &str) -> Result<Self, TypeError> {
        let normalized = segment.trim().to_ascii_lowercase().replace(['-', '_'], "");
        match normalized.as_str() {
            "event" | "events" => Ok(Self::Event),
            "team" | "teams" | "member" | "members" | "teammember" | "teammembers" => {
                Ok(Self::TeamMember)
            }
            "gallery" | "photo" | "photos" | "galleryphoto" | "galleryphotos" => {
                Ok(Self::GalleryPhoto)
            }
            "alert" | "alerts" | "eventalert" | "eventalerts" => Ok(Self::EventAlert),
            _ => Err(TypeError::UnknownKind(segment.trim().to_string())),
        }
    }
}

impl FromStr for RecordKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_route(s)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar text attribute declared by a kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<&'static str>,
    #[serde(skip_serializing_if = "no_values")]
    pub allowed: &'static [&'static str],
}

impl FieldSpec {
    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
            default: None,
            allowed: &[],
        }
    }

    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            default: None,
            allowed: &[],
        }
    }

    pub const fn with_default(self, default: &'static str) -> Self {
        Self {
            name: self.name,
            required: self.required,
            default: Some(default),
            allowed: self.allowed,
        }
    }

    pub const fn one_of(self, allowed: &'static [&'static str]) -> Self {
        Self {
            name: self.name,
            required: self.required,
            default: self.default,
            allowed,
        }
    }

    /// Trim a raw value and check it against the allowed set.
    ///
    /// Returns `Ok(None)` when the value is empty after trimming.
    pub fn normalize(&self, raw: &str) -> Result<Option<String>, TypeError> {
        let value = raw.trim();
        if value.is_empty() {
            return Ok(None);
        }
        if !self.allowed.is_empty() && !self.allowed.contains(&value) {
            return Err(TypeError::NotAllowed {
                field: self.name.to_string(),
                value: value.to_string(),
                allowed: self.allowed.join(", "),
            });
        }
        Ok(Some(value.to_string()))
    }
}

fn no_values(values: &&'static [&'static str]) -> bool {
    values.is_empty()
}

/// A named image attachment position declared by a kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SlotSpec {
    pub name: &'static str,
    pub required: bool,
}

impl SlotSpec {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
        }
    }
}

/// Static description of a record kind's scalar fields and asset slots.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct KindSchema {
    pub kind: RecordKind,
    pub fields: &'static [FieldSpec],
    pub slots: &'static [SlotSpec],
}

/// Result of [`KindSchema::normalize_fields`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizedFields {
    /// Trimmed, validated values keyed by declared field name.
    pub fields: BTreeMap<String, String>,
    /// Names present in the input that the schema does not declare.
    pub dropped: Vec<String>,
}

impl KindSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn slot(&self, name: &str) -> Option<&SlotSpec> {
        self.slots.iter().find(|s| s.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn required_slots(&self) -> impl Iterator<Item = &SlotSpec> {
        self.slots.iter().filter(|s| s.required)
    }

    /// Normalize raw scalar input against this schema.
    ///
    /// Values are trimmed; empty values count as absent. Undeclared names
    /// are reported in [`NormalizedFields::dropped`] rather than kept. When
    /// `creating` is set, defaults fill absent fields and a required field
    /// that is still absent is an error.
    pub fn normalize_fields(
        &self,
        raw: &BTreeMap<String, String>,
        creating: bool,
    ) -> Result<NormalizedFields, TypeError> {
        let mut out = NormalizedFields::default();
        for (name, value) in raw {
            let Some(spec) = self.field(name) else {
                out.dropped.push(name.clone());
                continue;
            };
            if let Some(value) = spec.normalize(value)? {
                out.fields.insert(spec.name.to_string(), value);
            }
        }

        if creating {
            for spec in self.fields {
                if out.fields.contains_key(spec.name) {
                    continue;
                }
                if let Some(default) = spec.default {
                    out.fields.insert(spec.name.to_string(), default.to_string());
                } else if spec.required {
                    return Err(self.missing_field(spec.name));
                }
            }
        }
        Ok(out)
    }

    pub(crate) fn missing_field(&self, field: &str) -> TypeError {
        TypeError::MissingField {
            kind: self.kind.to_string(),
            field: field.to_string(),
        }
    }

    pub(crate) fn missing_slot(&self, slot: &str) -> TypeError {
        TypeError::MissingSlot {
            kind: self.kind.to_string(),
            slot: slot.to_string(),
        }
    }
}

const TEAM_NAMES: &[&str] = &[
    "Technical",
    "PR",
    "Drama",
    "Cultural",
    "Sponsorship",
    "Decor",
    "Catering",
    "Workshop",
    "Discipline",
    "Coverage",
    "Finance",
    "Digital",
];

const MEMBER_TYPES: &[&str] = &["Core", "Sub-Core"];

const GALLERY_CATEGORIES: &[&str] = &[
    "fest",
    "spy-verse",
    "scifi-verse",
    "carnival-verse",
    "dark-verse",
    "mythic-verse",
];

const ALERT_SEVERITIES: &[&str] = &["info", "warning", "urgent"];

static EVENT_SCHEMA: KindSchema = KindSchema {
    kind: RecordKind::Event,
    fields: &[
        FieldSpec::required("title"),
        FieldSpec::optional("category"),
        FieldSpec::optional("eventType"),
        FieldSpec::optional("description"),
        FieldSpec::optional("rounds"),
        FieldSpec::optional("requirements"),
        FieldSpec::optional("day"),
        FieldSpec::optional("date"),
        FieldSpec::optional("venue"),
        FieldSpec::optional("time"),
        FieldSpec::optional("duration"),
        FieldSpec::optional("teamSize"),
        FieldSpec::optional("prizePool"),
        FieldSpec::optional("registrationFee"),
        FieldSpec::optional("registrationLink"),
    ],
    slots: &[SlotSpec::required("poster"), SlotSpec::required("logo")],
};

static TEAM_MEMBER_SCHEMA: KindSchema = KindSchema {
    kind: RecordKind::TeamMember,
    fields: &[
        FieldSpec::required("name"),
        FieldSpec::required("teamName").one_of(TEAM_NAMES),
        FieldSpec::required("memberType").one_of(MEMBER_TYPES),
        FieldSpec::optional("linkedin").with_default("#"),
    ],
    slots: &[SlotSpec::required("image")],
};

static GALLERY_PHOTO_SCHEMA: KindSchema = KindSchema {
    kind: RecordKind::GalleryPhoto,
    fields: &[
        FieldSpec::optional("title"),
        FieldSpec::optional("caption"),
        FieldSpec::optional("category")
            .with_default("fest")
            .one_of(GALLERY_CATEGORIES),
    ],
    slots: &[SlotSpec::required("image")],
};

static EVENT_ALERT_SCHEMA: KindSchema = KindSchema {
    kind: RecordKind::EventAlert,
    fields: &[
        FieldSpec::required("title"),
        FieldSpec::required("message"),
        FieldSpec::optional("link"),
        FieldSpec::optional("severity")
            .with_default("info")
            .one_of(ALERT_SEVERITIES),
    ],
    slots: &[SlotSpec::optional("image")],
};
