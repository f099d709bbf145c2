use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use marquee_types::{MediaRecord, RecordId, RecordKind};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::gateway::PersistenceGateway;

/// Query-string parameter reserved for the sort key.
pub const SORT_PARAM: &str = "sort";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    CreatedAt,
    UpdatedAt,
    Field(String),
}

/// A single sort key with its direction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: Direction,
}

impl SortSpec {
    pub fn new(key: SortKey, direction: Direction) -> Self {
        Self { key, direction }
    }

    /// Newest-created first.
    pub fn newest_first() -> Self {
        Self::new(SortKey::CreatedAt, Direction::Desc)
    }

    /// Parse `createdAt`, `-createdAt`, `+title` and the like. A leading
    /// `-` sorts descending; `+` or no prefix sorts ascending.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (direction, name) = match raw.strip_prefix('-') {
            Some(rest) => (Direction::Desc, rest),
            None => (Direction::Asc, raw.strip_prefix('+').unwrap_or(raw)),
        };
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let key = match name {
            "createdAt" | "created_at" => SortKey::CreatedAt,
            "updatedAt" | "updated_at" => SortKey::UpdatedAt,
            other => SortKey::Field(other.to_string()),
        };
        Some(Self::new(key, direction))
    }

    fn compare(&self, a: &MediaRecord, b: &MediaRecord) -> Ordering {
        let primary = match &self.key {
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortKey::Field(name) => a.field(name).cmp(&b.field(name)),
        };
        let ordering = primary.then_with(|| a.id.cmp(&b.id));
        match self.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::newest_first()
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.direction == Direction::Desc {
            f.write_str("-")?;
        }
        match &self.key {
            SortKey::CreatedAt => f.write_str("createdAt"),
            SortKey::UpdatedAt => f.write_str("updatedAt"),
            SortKey::Field(name) => f.write_str(name),
        }
    }
}

/// Exact-match filter plus an optional sort for one collection read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: BTreeMap<String, String>,
    pub sort: Option<SortSpec>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.insert(field.into(), value.into());
        self
    }

    pub fn sort_by(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Build a query from `key=value` pairs such as a URL query string.
    ///
    /// `sort` is reserved for the sort key; every other pair is an
    /// exact-match filter. Pairs with an empty value are ignored.
    pub fn from_params<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = Self::new();
        for (key, value) in params {
            let (key, value) = (key.as_ref().trim(), value.as_ref().trim());
            if key.is_empty() || value.is_empty() {
                continue;
            }
            if key == SORT_PARAM {
                query.sort = SortSpec::parse(value);
            } else {
                query.filter.insert(key.to_string(), value.to_string());
            }
        }
        query
    }

    /// Reject filter or sort fields the kind does not declare.
    pub fn validate(&self, kind: RecordKind) -> CoreResult<()> {
        let schema = kind.schema();
        if let Some(name) = self.filter.keys().find(|name| !schema.has_field(name)) {
            return Err(CoreError::Validation(format!(
                "{kind}: cannot filter on unknown field `{name}`"
            )));
        }
        if let Some(SortSpec {
            key: SortKey::Field(name),
            ..
        }) = &self.sort
        {
            if !schema.has_field(name) {
                return Err(CoreError::Validation(format!(
                    "{kind}: cannot sort on unknown field `{name}`"
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, record: &MediaRecord) -> bool {
        self.filter
            .iter()
            .all(|(name, value)| record.field(name) == Some(value.trim()))
    }

    /// Filter and order `records`. Assumes [`ListQuery::validate`] passed.
    pub fn apply(&self, records: Vec<MediaRecord>) -> Vec<MediaRecord> {
        let sort = self.sort.clone().unwrap_or_default();
        let mut selected: Vec<MediaRecord> =
            records.into_iter().filter(|r| self.matches(r)).collect();
        selected.sort_by(|a, b| sort.compare(a, b));
        selected
    }
}

/// Read-only access to record collections.
#[derive(Clone, Debug)]
pub struct QueryService {
    gateway: PersistenceGateway,
}

impl QueryService {
    pub fn new(gateway: PersistenceGateway) -> Self {
        Self { gateway }
    }

    pub async fn list(&self, kind: RecordKind, query: &ListQuery) -> CoreResult<Vec<MediaRecord>> {
        query.validate(kind)?;
        let records = self.gateway.scan(kind).await?;
        Ok(query.apply(records))
    }

    pub async fn get(&self, kind: RecordKind, id: RecordId) -> CoreResult<MediaRecord> {
        self.gateway.get(kind, id).await
    }
}
