//! Append-only audit history.
//!
//! Each [`AuditEntry`] renders as a single-key JSON object and a
//! [`HistoryTrail`] renders as an ordered array of them:
//!
//! ```text
//! [{"restore-action":"RESTORE_REQUESTED"},
//!  {"initiating-user":"user-email"}]
//! ```

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::{RestorationId, RestoreStatus};

/// Key recording which restore action was taken.
pub const RESTORE_ACTION: &str = "restore-action";
/// Key recording the restoration an action applies to.
pub const RESTORE_ID: &str = "restore-id";
/// Key recording who initiated an action.
pub const INITIATING_USER: &str = "initiating-user";
/// Key recording a status change.
pub const RESTORE_STATUS: &str = "restore-status";

/// Restore actions recorded in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreAction {
    /// A restore was requested.
    Requested,
    /// A restore was started.
    Initiated,
}

impl RestoreAction {
    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "RESTORE_REQUESTED",
            Self::Initiated => "RESTORE_INITIATED",
        }
    }
}

/// One immutable audit fact: an action tag paired with a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    key: String,
    value: String,
}

impl AuditEntry {
    /// Create an entry with an arbitrary tag.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// `{"restore-action": <action>}`
    #[must_use]
    pub fn restore_action(action: RestoreAction) -> Self {
        Self::new(RESTORE_ACTION, action.as_str())
    }

    /// `{"restore-id": <id>}`
    #[must_use]
    pub fn restore_id(id: &RestorationId) -> Self {
        Self::new(RESTORE_ID, id.as_str())
    }

    /// `{"initiating-user": <email>}`
    pub fn initiating_user(email: impl Into<String>) -> Self {
        Self::new(INITIATING_USER, email)
    }

    /// `{"restore-status": <status>}`
    #[must_use]
    pub fn restore_status(status: RestoreStatus) -> Self {
        Self::new(RESTORE_STATUS, status.as_str())
    }

    /// The action tag.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The recorded value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Serialize for AuditEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.key, &self.value)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for AuditEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntryVisitor;

        impl<'de> Visitor<'de> for EntryVisitor {
            type Value = AuditEntry;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object with exactly one string entry")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<AuditEntry, A::Error> {
                let (key, value) = map
                    .next_entry::<String, String>()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                if map.next_key::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(2, &self));
                }
                Ok(AuditEntry { key, value })
            }
        }

        deserializer.deserialize_map(EntryVisitor)
    }
}

/// Ordered, append-only sequence of audit entries.
///
/// Entries are never removed or reordered once appended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryTrail(Vec<AuditEntry>);

impl HistoryTrail {
    /// Create an empty trail.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append one entry.
    pub fn append(&mut self, entry: AuditEntry) {
        self.0.push(entry);
    }

    /// Append entries in order.
    pub fn extend(&mut self, entries: impl IntoIterator<Item = AuditEntry>) {
        self.0.extend(entries);
    }

    /// Entries in append order.
    #[must_use]
    pub fn entries(&self) -> &[AuditEntry] {
        &self.0
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the trail has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&AuditEntry> {
        self.0.last()
    }

    /// Render the trail as an ordered JSON array of single-key objects.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.0
                .iter()
                .map(|entry| {
                    let mut object = serde_json::Map::with_capacity(1);
                    object.insert(
                        entry.key.clone(),
                        serde_json::Value::String(entry.value.clone()),
                    );
                    serde_json::Value::Object(object)
                })
                .collect(),
        )
    }
}

impl FromIterator<AuditEntry> for HistoryTrail {
    fn from_iter<I: IntoIterator<Item = AuditEntry>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
