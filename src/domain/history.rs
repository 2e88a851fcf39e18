use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Status;

/// An immutable audit record of one status change.
///
/// Entries are append-only: they are never mutated or deleted except by
/// cascading deletion of the parent work order. The actor is optional so
/// the record survives removal of the user from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Identifier of the work order this entry belongs to.
    pub order: Uuid,
    /// Identity of the user that performed the transition, if still known.
    pub actor: Option<String>,
    /// Status before the transition.
    pub previous: Status,
    /// Status after the transition.
    pub new: Status,
    /// Optional free text supplied by the actor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// When the transition committed.
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} → {}", self.order, self.previous, self.new)
    }
}
