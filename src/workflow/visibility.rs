use tracing::debug;

use super::guard::ensure_mutable;
use crate::api::TicketApi;
use crate::error::{HelpdeskError, Result};
use crate::responses::NewResponse;
use crate::session::AuthUser;
use crate::types::{Role, Ticket, TicketResponse};
use crate::upload::UploadSet;

pub fn is_visible(response: &TicketResponse, viewer: Role) -> bool {
    !response.internal || viewer.is_admin()
}

pub fn visible_responses(ticket: &Ticket, viewer: Role) -> Vec<&TicketResponse> {
    ticket
        .responses
        .iter()
        .filter(|r| is_visible(r, viewer))
        .collect()
}

/// The ticket as this viewer may see it. Every printed ticket goes through here.
pub fn ticket_for_viewer(ticket: &Ticket, viewer: Role) -> Ticket {
    let mut shown = ticket.clone();
    shown.responses.retain(|r| is_visible(r, viewer));
    shown
}

/// The reply form a viewer gets. Only staff can mark a reply internal; the
/// member form has no such input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseComposer {
    Member(MemberReply),
    Staff(StaffReply),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberReply;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaffReply;

impl ResponseComposer {
    pub fn for_viewer(viewer: &AuthUser) -> Self {
        if viewer.is_admin() {
            ResponseComposer::Staff(StaffReply)
        } else {
            ResponseComposer::Member(MemberReply)
        }
    }
}

impl MemberReply {
    pub fn compose(&self, body: &str) -> Result<NewResponse> {
        Ok(NewResponse::Member {
            body: required_body(body)?,
        })
    }
}

impl StaffReply {
    pub fn compose(&self, body: &str, internal: bool) -> Result<NewResponse> {
        Ok(NewResponse::Staff {
            body: required_body(body)?,
            internal,
        })
    }
}

fn required_body(body: &str) -> Result<String> {
    let body = body.trim();
    if body.is_empty() {
        return Err(HelpdeskError::guard("A response needs a message."));
    }
    Ok(body.to_string())
}

/// Post a reply unless the ticket is frozen. The staged files are released
/// once the request finishes either way.
pub async fn submit_response(
    api: &dyn TicketApi,
    ticket: &Ticket,
    response: NewResponse,
    uploads: UploadSet,
) -> Result<TicketResponse> {
    if let Err(e) = ensure_mutable(ticket, "add responses to") {
        debug!(ticket_id = ticket.id, "response blocked locally: {e}");
        return Err(e);
    }

    api.add_response(ticket.id, &response, uploads.as_slice())
        .await
}
