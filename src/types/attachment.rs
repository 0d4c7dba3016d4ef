use serde::{Deserialize, Serialize};

use super::wire::lenient_id;
use crate::upload::guess_content_type;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(from = "WireAttachment")]
pub struct Attachment {
    pub id: u64,
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
    pub url: Option<String>,
    pub ticket_id: Option<u64>,
    pub response_id: Option<u64>,
    pub created_at: Option<String>,
}

#[derive(Deserialize)]
struct WireAttachment {
    id: u64,
    #[serde(default)]
    original_name: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    ticket_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_id")]
    ticket_response_id: Option<u64>,
    #[serde(default)]
    created_at: Option<String>,
}

impl From<WireAttachment> for Attachment {
    fn from(wire: WireAttachment) -> Self {
        let file_name = wire
            .original_name
            .or(wire.name)
            .or(wire.filename)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("attachment-{}", wire.id));

        // Declared type wins; otherwise infer from the extension.
        let mime_type = wire
            .mime_type
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| guess_content_type(&file_name).to_string());

        Self {
            id: wire.id,
            file_name,
            mime_type,
            size: wire.size.unwrap_or_default(),
            url: wire.url,
            ticket_id: wire.ticket_id,
            response_id: wire.ticket_response_id,
            created_at: wire.created_at,
        }
    }
}
