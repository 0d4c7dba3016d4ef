use std::path::{Path, PathBuf};

use tabled::Tabled;

use crate::api::TicketApi;
use crate::client::HelpdeskClient;
use crate::error::{HelpdeskError, Result};
use crate::output::{self, human_size, print_table, truncate};
use crate::types::{Attachment, Ticket};
use crate::upload::can_view_inline;
use crate::workflow::guard::ensure_mutable;
use crate::workflow::visibility::is_visible;

#[derive(Tabled)]
struct AttachmentRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    mime_type: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "On")]
    source: String,
}

impl From<&Attachment> for AttachmentRow {
    fn from(attachment: &Attachment) -> Self {
        let mut mime_type = attachment.mime_type.clone();
        if can_view_inline(&attachment.mime_type) {
            mime_type.push_str(" (viewable)");
        }
        Self {
            id: attachment.id,
            name: truncate(&attachment.file_name, 40),
            mime_type,
            size: human_size(attachment.size),
            source: attachment
                .response_id
                .map(|id| format!("reply #{id}"))
                .unwrap_or_else(|| "ticket".to_string()),
        }
    }
}

/// Files on the ticket itself followed by files on its replies.
fn all_attachments(ticket: &Ticket) -> Vec<Attachment> {
    let on_replies = ticket.responses.iter().flat_map(|r| {
        r.attachments.iter().cloned().map(move |mut a| {
            a.response_id.get_or_insert(r.id);
            a
        })
    });
    ticket
        .attachments
        .iter()
        .cloned()
        .chain(on_replies)
        .collect()
}

pub async fn list(client: &HelpdeskClient, ticket_id: u64) -> Result<()> {
    let viewer = client.session().require()?;
    let mut ticket = client.fetch_ticket(ticket_id).await?;
    ticket.responses.retain(|r| is_visible(r, viewer.role));

    let attachments = all_attachments(&ticket);
    if attachments.is_empty() && !output::is_json() {
        println!("No files attached to ticket #{ticket_id}.");
        return Ok(());
    }

    print_table(&attachments, |a| AttachmentRow::from(a), |a| {
        format!("{}\t{}\t{}", a.id, a.file_name, a.size)
    });
    Ok(())
}

/// Keep only the last path component and replace anything unusual.
fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned
    }
}

fn target_path(dest: Option<PathBuf>, file_name: &str) -> PathBuf {
    match dest {
        Some(path) if path.is_dir() => path.join(file_name),
        Some(path) => path,
        None => PathBuf::from(file_name),
    }
}

pub async fn download(client: &HelpdeskClient, id: u64, dest: Option<PathBuf>) -> Result<()> {
    client.session().require()?;
    let file = client.download_attachment(id).await?;

    let file_name = sanitize_file_name(
        file.file_name
            .as_deref()
            .unwrap_or(&format!("attachment-{id}")),
    );
    let path = target_path(dest, &file_name);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, &file.bytes)?;

    output::print_message(&format!(
        "Saved {} ({}, {}) to {}",
        file_name,
        file.mime_type.as_deref().unwrap_or("unknown type"),
        human_size(file.bytes.len() as u64),
        path.display()
    ));
    Ok(())
}

pub async fn delete(client: &HelpdeskClient, ticket_id: u64, attachment_id: u64) -> Result<()> {
    client.session().require()?;
    let ticket = client.fetch_ticket(ticket_id).await?;

    if !all_attachments(&ticket).iter().any(|a| a.id == attachment_id) {
        return Err(HelpdeskError::NotFound {
            message: format!("Ticket #{ticket_id} has no attachment #{attachment_id}"),
        });
    }
    ensure_mutable(&ticket, "delete attachments from")?;

    client.delete_attachment(attachment_id).await?;
    output::print_message(&format!(
        "Deleted attachment #{attachment_id} from ticket #{ticket_id}"
    ));
    Ok(())
}
