use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::UserId;

/// Append-only lifecycle record kept on vendors and budgets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub action: String,
    pub performed_by: UserId,
    pub timestamp: DateTime<Utc>,
    pub notes: Option<String>,
}

impl HistoryEntry {
    pub(crate) fn new(
        action: &str,
        performed_by: UserId,
        timestamp: DateTime<Utc>,
        notes: &str,
    ) -> Self {
        Self {
            action: action.to_string(),
            performed_by,
            timestamp,
            notes: Some(notes.to_string()),
        }
    }
}

/// Cross-cutting audit trail for operations that are not tied to one aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityLogEntry {
    pub entity: String,
    pub entity_id: u64,
    pub action: String,
    pub performed_by: Option<UserId>,
    pub timestamp: DateTime<Utc>,
    pub details: Option<String>,
}
