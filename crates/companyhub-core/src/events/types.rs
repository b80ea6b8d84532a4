use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cursor;
use crate::error::CoreError;

/// Kind of mutation carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MutationAction {
    Update,
    Delete,
}

impl MutationAction {
    /// Returns the wire representation of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationAction::Update => "UPDATE",
            MutationAction::Delete => "DELETE",
        }
    }
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPDATE" => Ok(MutationAction::Update),
            "DELETE" => Ok(MutationAction::Delete),
            other => Err(CoreError::UnknownAction(other.to_string())),
        }
    }
}

/// A company mutation announced to every replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationEvent {
    pub id: Uuid,
    pub action: MutationAction,
    /// New name for UPDATE; empty for DELETE.
    pub name: String,
}

impl MutationEvent {
    pub fn update(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            action: MutationAction::Update,
            name: name.into(),
        }
    }

    pub fn delete(id: Uuid) -> Self {
        Self {
            id,
            action: MutationAction::Delete,
            name: String::new(),
        }
    }
}

/// Event fields exactly as stored in the log.
///
/// Kept as strings so that a consumer can skip entries it does not
/// understand without losing its place in the log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub id: String,
    pub action: String,
    pub name: String,
}

impl RawEvent {
    pub const FIELD_ID: &'static str = "id";
    pub const FIELD_ACTION: &'static str = "action";
    pub const FIELD_NAME: &'static str = "name";

    /// Field/value pairs in append order.
    pub fn fields(&self) -> [(&'static str, &str); 3] {
        [
            (Self::FIELD_ID, self.id.as_str()),
            (Self::FIELD_ACTION, self.action.as_str()),
            (Self::FIELD_NAME, self.name.as_str()),
        ]
    }
}

impl From<&MutationEvent> for RawEvent {
    fn from(event: &MutationEvent) -> Self {
        Self {
            id: event.id.to_string(),
            action: event.action.as_str().to_string(),
            name: event.name.clone(),
        }
    }
}

impl TryFrom<&RawEvent> for MutationEvent {
    type Error = CoreError;

    fn try_from(raw: &RawEvent) -> Result<Self, Self::Error> {
        if raw.id.is_empty() {
            return Err(CoreError::malformed_event("missing id"));
        }
        let id = Uuid::parse_str(&raw.id)?;
        let action = raw.action.parse()?;
        Ok(Self {
            id,
            action,
            name: raw.name.clone(),
        })
    }
}

/// An entry read back from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub cursor: Cursor,
    pub event: RawEvent,
}

impl LogEntry {
    pub fn new(cursor: Cursor, event: RawEvent) -> Self {
        Self { cursor, event }
    }

    /// Decodes the raw fields into a typed mutation.
    pub fn decode(&self) -> Result<MutationEvent, CoreError> {
        MutationEvent::try_from(&self.event)
    }
}
