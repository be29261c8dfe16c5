//! Row operation kinds and raw event types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Kind of change observed on a row.
///
/// Ordering is `Insert < Update < Delete`, which is also the order used when
/// operation sets are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOperation {
    /// A row was inserted.
    Insert,
    /// A row was updated.
    Update,
    /// A row was deleted.
    Delete,
}

impl ChangeOperation {
    /// Wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOperation::Insert => "INSERT",
            ChangeOperation::Update => "UPDATE",
            ChangeOperation::Delete => "DELETE",
        }
    }

    /// Whether rows touched by this operation still exist and can be re-read.
    pub fn needs_refetch(&self) -> bool {
        !matches!(self, ChangeOperation::Delete)
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Ok(ChangeOperation::Insert),
            "UPDATE" => Ok(ChangeOperation::Update),
            "DELETE" => Ok(ChangeOperation::Delete),
            _ => Err(Error::UnknownOperation(s.to_string())),
        }
    }
}

/// Type of a raw notification event.
///
/// Only [`EventType::ObjectChange`] carries table changes; the others are
/// lifecycle notices from the notification source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Rows of registered tables changed.
    #[default]
    ObjectChange,
    /// The notification source started.
    Startup,
    /// The notification source is shutting down.
    Shutdown,
    /// The registration was removed on the source side.
    Deregister,
}
