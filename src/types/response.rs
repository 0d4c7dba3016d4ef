use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::wire::{bool_of, lenient_id};
use super::{Attachment, User};

/// A reply on a ticket. Internal replies are staff-only notes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(from = "WireResponse")]
pub struct TicketResponse {
    pub id: u64,
    pub ticket_id: Option<u64>,
    pub user_id: Option<u64>,
    pub author: Option<User>,
    pub body: String,
    pub internal: bool,
    pub created_at: Option<String>,
    pub attachments: Vec<Attachment>,
}

#[derive(Deserialize)]
struct WireResponse {
    id: u64,
    #[serde(default, deserialize_with = "lenient_id")]
    ticket_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_id")]
    user_id: Option<u64>,
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    internal: Option<Value>,
    #[serde(default)]
    is_internal: Option<Value>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    attachments: Option<Vec<Attachment>>,
}

impl From<WireResponse> for TicketResponse {
    fn from(wire: WireResponse) -> Self {
        // Either flag marks the reply internal.
        let internal = [wire.internal.as_ref(), wire.is_internal.as_ref()]
            .into_iter()
            .flatten()
            .any(bool_of);

        Self {
            id: wire.id,
            ticket_id: wire.ticket_id,
            user_id: wire.user_id.or(wire.user.as_ref().map(|u| u.id)),
            author: wire.user,
            body: wire.body.or(wire.message).unwrap_or_default(),
            internal,
            created_at: wire.created_at,
            attachments: wire.attachments.unwrap_or_default(),
        }
    }
}
