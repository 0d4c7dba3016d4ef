use crate::error::{HelpdeskError, Result};
use crate::session::AuthUser;
use crate::types::Ticket;

/// A resolved or closed ticket is frozen until it is reopened.
pub fn can_mutate(ticket: &Ticket) -> bool {
    !ticket.status.is_terminal()
}

pub fn can_reopen(ticket: &Ticket) -> bool {
    ticket.status.is_terminal()
}

/// `action` reads as "Cannot {action} resolved or closed tickets".
pub fn ensure_mutable(ticket: &Ticket, action: &str) -> Result<()> {
    if can_mutate(ticket) {
        return Ok(());
    }
    Err(HelpdeskError::guard(format!(
        "Cannot {action} resolved or closed tickets. Please reopen ticket #{} first.",
        ticket.id
    )))
}

pub fn ensure_admin(viewer: &AuthUser, action: &str) -> Result<()> {
    if viewer.is_admin() {
        return Ok(());
    }
    Err(HelpdeskError::guard(format!(
        "Only administrators can {action}."
    )))
}

/// Reopen needs a resolved or closed ticket, and an admin or the ticket's owner.
pub fn ensure_can_reopen(ticket: &Ticket, viewer: &AuthUser) -> Result<()> {
    if !can_reopen(ticket) {
        return Err(HelpdeskError::guard(format!(
            "Ticket #{} is {}. Only resolved or closed tickets can be reopened.",
            ticket.id,
            ticket.status.label()
        )));
    }
    if !viewer.is_admin() && viewer.id() != ticket.user_id {
        return Err(HelpdeskError::guard(
            "Only the ticket owner or an administrator can reopen this ticket.",
        ));
    }
    Ok(())
}
