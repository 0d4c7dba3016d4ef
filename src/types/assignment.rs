use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::wire::lenient_id;
use super::UserRef;

/// One entry of a ticket's assignment audit log.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(from = "WireAssignment")]
pub struct Assignment {
    pub id: u64,
    pub ticket_id: Option<u64>,
    pub assigned_to: Option<UserRef>,
    pub assigned_by: Option<UserRef>,
    pub created_at: Option<String>,
}

#[derive(Deserialize)]
struct WireAssignment {
    id: u64,
    #[serde(default, deserialize_with = "lenient_id")]
    ticket_id: Option<u64>,
    #[serde(default)]
    assigned_to: Option<Value>,
    #[serde(default, rename = "assignedTo")]
    assigned_to_user: Option<Value>,
    #[serde(default)]
    assigned_by: Option<Value>,
    #[serde(default, rename = "assignedBy")]
    assigned_by_user: Option<Value>,
    #[serde(default)]
    created_at: Option<String>,
}

impl From<WireAssignment> for Assignment {
    fn from(wire: WireAssignment) -> Self {
        Self {
            id: wire.id,
            ticket_id: wire.ticket_id,
            assigned_to: UserRef::normalize(
                wire.assigned_to.as_ref(),
                wire.assigned_to_user.as_ref(),
            ),
            assigned_by: UserRef::normalize(
                wire.assigned_by.as_ref(),
                wire.assigned_by_user.as_ref(),
            ),
            created_at: wire.created_at,
        }
    }
}

/// Append-only assignment log. Entries are never edited or removed.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct AssignmentHistory(Vec<Assignment>);

impl AssignmentHistory {
    pub fn push(&mut self, entry: Assignment) {
        self.0.push(entry);
    }

    /// Fold a freshly fetched log into this one. Known entries keep their
    /// recorded values; unseen entries are appended in server order.
    pub fn merge(&mut self, incoming: AssignmentHistory) {
        for entry in incoming.0 {
            if !self.0.iter().any(|known| known.id == entry.id) {
                self.0.push(entry);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Assignment> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Assignment>> for AssignmentHistory {
    fn from(entries: Vec<Assignment>) -> Self {
        Self(entries)
    }
}
