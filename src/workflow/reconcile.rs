//! One submit path for every ticket mutation.
//!
//! Each change runs the same sequence: check the guard locally, show the
//! attempted value while the request is in flight, then replace the view with
//! the server's copy of the ticket or roll back to the last confirmed one.

use std::fmt;

use tracing::{debug, warn};

use super::guard::{ensure_admin, ensure_can_reopen, ensure_mutable};
use crate::api::TicketApi;
use crate::error::{HelpdeskError, Result};
use crate::responses::TicketUpdate;
use crate::session::AuthUser;
use crate::types::{Category, Priority, Ticket, TicketStatus, UserRef};

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Status(TicketStatus),
    Priority(Priority),
    /// `None` clears the category.
    Category(Option<u64>),
    Assign(u64),
    Reopen,
}

impl Mutation {
    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::Status(_) => "status",
            Mutation::Priority(_) => "priority",
            Mutation::Category(_) => "category",
            Mutation::Assign(_) => "assignment",
            Mutation::Reopen => "reopen",
        }
    }

    /// Local checks; a failure here means no request is sent.
    pub fn check(&self, ticket: &Ticket, viewer: &AuthUser) -> Result<()> {
        match self {
            Mutation::Reopen => ensure_can_reopen(ticket, viewer),
            Mutation::Status(_) => {
                ensure_admin(viewer, "change the status of a ticket")?;
                ensure_mutable(ticket, "change the status of")
            }
            Mutation::Priority(_) => {
                ensure_admin(viewer, "change the priority of a ticket")?;
                ensure_mutable(ticket, "change the priority of")
            }
            Mutation::Category(_) => {
                ensure_admin(viewer, "change the category of a ticket")?;
                ensure_mutable(ticket, "change the category of")
            }
            Mutation::Assign(_) => {
                ensure_admin(viewer, "assign tickets")?;
                ensure_mutable(ticket, "reassign")
            }
        }
    }

    fn apply_optimistic(&self, ticket: &mut Ticket) -> Result<()> {
        match self {
            Mutation::Status(status) => ticket.status = *status,
            Mutation::Priority(priority) => ticket.priority = *priority,
            Mutation::Category(category) => ticket.category = category.map(Category::from_id),
            Mutation::Assign(user_id) => ticket.assignee = Some(UserRef::Id(*user_id)),
            Mutation::Reopen => ticket.reopen()?,
        }
        Ok(())
    }

    async fn submit(&self, api: &dyn TicketApi, ticket_id: u64) -> Result<()> {
        match self {
            Mutation::Status(status) => {
                let update = TicketUpdate {
                    status: Some(*status),
                    ..Default::default()
                };
                api.update_ticket(ticket_id, &update).await
            }
            Mutation::Priority(priority) => {
                let update = TicketUpdate {
                    priority: Some(*priority),
                    ..Default::default()
                };
                api.update_ticket(ticket_id, &update).await
            }
            Mutation::Category(category) => {
                let update = TicketUpdate {
                    ticket_category_id: Some(*category),
                    ..Default::default()
                };
                api.update_ticket(ticket_id, &update).await
            }
            Mutation::Assign(user_id) => api.assign_ticket(ticket_id, *user_id).await,
            Mutation::Reopen => api.reopen_ticket(ticket_id).await,
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Status(status) => write!(f, "status -> {status}"),
            Mutation::Priority(priority) => write!(f, "priority -> {priority}"),
            Mutation::Category(Some(id)) => write!(f, "category -> #{id}"),
            Mutation::Category(None) => write!(f, "category cleared"),
            Mutation::Assign(user_id) => write!(f, "assign -> user #{user_id}"),
            Mutation::Reopen => write!(f, "reopen"),
        }
    }
}

/// What a ticket screen shows: the last server-confirmed ticket, and the
/// displayed copy that may carry an attempted change.
#[derive(Debug, Clone)]
pub struct TicketView {
    confirmed: Ticket,
    displayed: Ticket,
    in_flight: Option<Mutation>,
    last_error: Option<String>,
}

impl TicketView {
    pub fn new(ticket: Ticket) -> Self {
        Self {
            displayed: ticket.clone(),
            confirmed: ticket,
            in_flight: None,
            last_error: None,
        }
    }

    pub async fn load(api: &dyn TicketApi, id: u64) -> Result<Self> {
        Ok(Self::new(api.fetch_ticket(id).await?))
    }

    pub fn ticket(&self) -> &Ticket {
        &self.displayed
    }

    pub fn confirmed(&self) -> &Ticket {
        &self.confirmed
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Guard the change and show it as pending.
    pub fn begin(&mut self, mutation: Mutation, viewer: &AuthUser) -> Result<()> {
        if let Some(pending) = &self.in_flight {
            return Err(HelpdeskError::guard(format!(
                "Ticket #{} is still saving a {} change.",
                self.confirmed.id,
                pending.kind()
            )));
        }

        mutation.check(&self.confirmed, viewer)?;

        let mut attempted = self.confirmed.clone();
        mutation.apply_optimistic(&mut attempted)?;
        self.displayed = attempted;
        self.in_flight = Some(mutation);
        self.last_error = None;
        Ok(())
    }

    /// Adopt a fresh server copy. The assignment log only ever grows.
    pub fn replace(&mut self, mut fresh: Ticket) {
        let mut history = std::mem::take(&mut self.confirmed.assignments);
        history.merge(fresh.assignments);
        fresh.assignments = history;

        self.displayed = fresh.clone();
        self.confirmed = fresh;
        self.in_flight = None;
        self.last_error = None;
    }

    /// Drop the attempted value and show the last confirmed ticket again.
    pub fn revert(&mut self, error: &HelpdeskError) {
        self.displayed = self.confirmed.clone();
        self.in_flight = None;
        self.last_error = Some(error.to_string());
    }
}

/// Run a mutation against the view: guard, submit, then reload or roll back.
pub async fn submit_mutation(
    api: &dyn TicketApi,
    view: &mut TicketView,
    viewer: &AuthUser,
    mutation: Mutation,
) -> Result<()> {
    let ticket_id = view.confirmed.id;

    if let Err(e) = view.begin(mutation.clone(), viewer) {
        debug!(ticket_id, kind = mutation.kind(), "mutation blocked locally: {e}");
        return Err(e);
    }

    if let Err(e) = mutation.submit(api, ticket_id).await {
        warn!(ticket_id, kind = mutation.kind(), "mutation rejected: {e}");
        view.revert(&e);
        return Err(e);
    }

    // The server may have changed more than the submitted field.
    match api.fetch_ticket(ticket_id).await {
        Ok(fresh) => {
            debug!(ticket_id, %mutation, "mutation reconciled");
            view.replace(fresh);
            Ok(())
        }
        Err(e) => {
            warn!(ticket_id, kind = mutation.kind(), "reload after mutation failed: {e}");
            view.revert(&e);
            Err(e)
        }
    }
}
