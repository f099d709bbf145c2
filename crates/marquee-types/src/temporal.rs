use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// UTC instant assigned by the store to record creation and updates.
///
/// Serialized as an RFC 3339 string. [`Timestamp::after`] produces an
/// instant strictly later than a previous one even when the wall clock has
/// not advanced (or has stepped backwards), which keeps `updated_at`
/// monotonic per record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current wall-clock time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Wrap an explicit instant.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// The current time, or one microsecond past `previous` if the clock
    /// has not moved beyond it.
    pub fn after(previous: Timestamp) -> Self {
        let now = Utc::now();
        let floor = previous.0 + Duration::microseconds(1);
        Self(now.max(floor))
    }

    /// The underlying `chrono` value.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Milliseconds since the UNIX epoch.
    pub fn timestamp_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0.to_rfc3339())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
