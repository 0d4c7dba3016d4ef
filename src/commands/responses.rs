use std::path::PathBuf;

use colored::Colorize;
use tabled::Tabled;
use tracing::warn;

use crate::api::TicketApi;
use crate::cli::RespondArgs;
use crate::client::HelpdeskClient;
use crate::error::Result;
use crate::output::{self, date_or_dash, print_table, truncate};
use crate::types::{Ticket, TicketResponse, UserRef};
use crate::upload::UploadSet;
use crate::workflow::assignment::resolve_user_name;
use crate::workflow::guard::ensure_mutable;
use crate::workflow::{submit_response, visible_responses, KnownUsers, ResponseComposer};

#[derive(Tabled)]
struct ResponseRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Author")]
    author: String,
    #[tabled(rename = "Message")]
    body: String,
    #[tabled(rename = "Visibility")]
    visibility: String,
    #[tabled(rename = "Files")]
    files: usize,
    #[tabled(rename = "Posted")]
    posted: String,
}

fn author_name(response: &TicketResponse, known: &KnownUsers) -> String {
    match (&response.author, response.user_id) {
        (Some(author), _) => resolve_user_name(Some(&UserRef::Embedded(author.clone())), known),
        (None, Some(id)) => resolve_user_name(Some(&UserRef::Id(id)), known),
        (None, None) => "Unknown".to_string(),
    }
}

fn visibility(response: &TicketResponse) -> String {
    if response.internal {
        "internal".yellow().to_string()
    } else {
        "public".to_string()
    }
}

pub(crate) fn print_response(response: &TicketResponse, known: &KnownUsers) {
    let mut header = format!(
        "\n{} {}",
        author_name(response, known).bold(),
        date_or_dash(response.created_at.as_deref()).dimmed()
    );
    if response.internal {
        header.push_str(&format!(" {}", "[internal]".yellow()));
    }
    println!("{header}");
    for line in response.body.lines() {
        println!("  {line}");
    }
    for attachment in &response.attachments {
        println!("  {} {}", "attached:".dimmed(), attachment.file_name);
    }
}

/// Files are read only once the ticket is known to accept replies.
fn stage_uploads(ticket: &Ticket, paths: &[PathBuf]) -> Result<UploadSet> {
    ensure_mutable(ticket, "add responses to")?;
    UploadSet::from_paths(paths)
}

pub async fn respond(client: &HelpdeskClient, args: RespondArgs) -> Result<()> {
    let viewer = client.session().require()?;
    let ticket = client.fetch_ticket(args.id).await?;
    let uploads = stage_uploads(&ticket, &args.attachments)?;

    let reply = match ResponseComposer::for_viewer(&viewer) {
        ResponseComposer::Staff(form) => form.compose(&args.body, args.internal)?,
        ResponseComposer::Member(form) => {
            if args.internal {
                warn!(ticket_id = args.id, "--internal ignored for a non-staff account");
                eprintln!(
                    "{} only staff can post internal notes; sending a public reply.",
                    "Note:".yellow()
                );
            }
            form.compose(&args.body)?
        }
    };

    let created = submit_response(client, &ticket, reply, uploads).await?;

    if output::is_json() {
        output::print_json(&created);
        return Ok(());
    }
    let kind = if created.internal { "internal note" } else { "reply" };
    output::print_message(&format!("Added {kind} to ticket #{}", args.id));
    Ok(())
}

pub async fn list(client: &HelpdeskClient, id: u64) -> Result<()> {
    let viewer = client.session().require()?;
    let ticket = client.fetch_ticket(id).await?;

    let mut known = KnownUsers::new();
    known.learn_from(&ticket);
    known.insert(viewer.user.clone());

    let responses: Vec<TicketResponse> = visible_responses(&ticket, viewer.role)
        .into_iter()
        .cloned()
        .collect();

    if responses.is_empty() && !output::is_json() {
        println!("No responses on ticket #{id} yet.");
        return Ok(());
    }

    print_table(
        &responses,
        |r| ResponseRow {
            id: r.id,
            author: truncate(&author_name(r, &known), 20),
            body: truncate(r.body.lines().next().unwrap_or(""), 50),
            visibility: visibility(r),
            files: r.attachments.len(),
            posted: date_or_dash(r.created_at.as_deref()),
        },
        |r| format!("{}\t{}\t{}", r.id, author_name(r, &known), truncate(&r.body, 60)),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HelpdeskError;
    use crate::types::{sample_ticket, TicketStatus, User};
    use serde_json::json;

    #[test]
    fn test_closed_ticket_refused_before_files_are_read() {
        let missing = vec![PathBuf::from("/definitely/not/here/log.pdf")];

        let err = stage_uploads(&sample_ticket(9, TicketStatus::Closed), &missing).unwrap_err();
        assert!(err.is_guard_violation());

        let err = stage_uploads(&sample_ticket(9, TicketStatus::Open), &missing).unwrap_err();
        assert!(matches!(err, HelpdeskError::FileNotFound(_)));

        assert!(stage_uploads(&sample_ticket(9, TicketStatus::Open), &[])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_author_falls_back_to_known_user() {
        let known: KnownUsers = [User {
            id: 5,
            email: Some("bruno@example.com".to_string()),
            ..Default::default()
        }]
        .into_iter()
        .collect();

        let by_id: TicketResponse =
            serde_json::from_value(json!({ "id": 1, "body": "hi", "user_id": 5 })).unwrap();
        assert_eq!(author_name(&by_id, &known), "bruno@example.com");

        let embedded: TicketResponse = serde_json::from_value(
            json!({ "id": 2, "body": "hi", "user": { "id": 6, "name": "Carla" } }),
        )
        .unwrap();
        assert_eq!(author_name(&embedded, &known), "Carla");

        let anonymous: TicketResponse =
            serde_json::from_value(json!({ "id": 3, "body": "hi" })).unwrap();
        assert_eq!(author_name(&anonymous, &known), "Unknown");
    }
}
