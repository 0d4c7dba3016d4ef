//! Recording in-memory service for workflow tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::TicketApi;
use crate::error::{HelpdeskError, Result};
use crate::responses::{
    Credentials, LoginResponse, NewResponse, NewTicket, Page, TicketFilters, TicketUpdate,
};
use crate::types::{
    Assignment, Category, Ticket, TicketResponse, TicketStatus, User, UserRef,
};
use crate::upload::PendingUpload;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Authenticate(String),
    FetchTicket(u64),
    FetchTickets,
    CreateTicket(String),
    UpdateTicket(u64, TicketUpdate),
    AssignTicket(u64, u64),
    ReopenTicket(u64),
    AddResponse(u64, Value),
    DeleteTicket(u64),
    DeleteAttachment(u64),
    SearchUsers(String),
}

impl Call {
    fn is_read(&self) -> bool {
        matches!(
            self,
            Call::FetchTicket(_) | Call::FetchTickets | Call::SearchUsers(_)
        )
    }
}

#[derive(Default)]
struct State {
    tickets: BTreeMap<u64, Ticket>,
    users: Vec<User>,
    calls: Vec<Call>,
    fail_next: Option<fn() -> HelpdeskError>,
    fail_next_write: Option<fn() -> HelpdeskError>,
    search_delays: HashMap<String, Duration>,
    next_id: u64,
}

#[derive(Default)]
pub(crate) struct FakeApi {
    state: Mutex<State>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ticket(self, ticket: Ticket) -> Self {
        self.lock().tickets.insert(ticket.id, ticket);
        self
    }

    pub fn with_users(self, users: Vec<User>) -> Self {
        self.lock().users = users;
        self
    }

    /// The next call of any kind fails with the given error.
    pub fn fail_next(&self, error: fn() -> HelpdeskError) {
        self.lock().fail_next = Some(error);
    }

    /// The next mutating call fails; reads still succeed.
    pub fn fail_next_write(&self, error: fn() -> HelpdeskError) {
        self.lock().fail_next_write = Some(error);
    }

    pub fn delay_search(&self, term: &str, delay: Duration) {
        self.lock().search_delays.insert(term.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn mutation_calls(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| !c.is_read())
            .cloned()
            .collect()
    }

    pub fn ticket(&self, id: u64) -> Option<Ticket> {
        self.lock().tickets.get(&id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: Call) -> Result<()> {
        let mut state = self.lock();
        let failure = if call.is_read() {
            state.fail_next.take()
        } else {
            state.fail_next.take().or_else(|| state.fail_next_write.take())
        };
        state.calls.push(call);
        match failure {
            Some(error) => Err(error()),
            None => Ok(()),
        }
    }

    fn with_stored<T>(&self, id: u64, f: impl FnOnce(&mut Ticket) -> Result<T>) -> Result<T> {
        let mut state = self.lock();
        let ticket = state
            .tickets
            .get_mut(&id)
            .ok_or_else(|| HelpdeskError::NotFound {
                message: format!("Ticket {id} not found"),
            })?;
        f(ticket)
    }
}

fn user(id: u64, name: &str) -> User {
    User {
        id,
        name: Some(name.to_string()),
        ..Default::default()
    }
}

fn matches_term(user: &User, term: &str) -> bool {
    let term = term.to_lowercase();
    [&user.name, &user.email, &user.department, &user.employee_id]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&term))
}

#[async_trait]
impl TicketApi for FakeApi {
    async fn authenticate(&self, credentials: &Credentials) -> Result<LoginResponse> {
        self.record(Call::Authenticate(credentials.email.clone()))?;
        Ok(LoginResponse {
            jwt: "fake-token".to_string(),
            user: user(1, &credentials.email),
        })
    }

    async fn fetch_ticket(&self, id: u64) -> Result<Ticket> {
        self.record(Call::FetchTicket(id))?;
        self.with_stored(id, |ticket| Ok(ticket.clone()))
    }

    async fn fetch_tickets(&self, filters: &TicketFilters) -> Result<Page<Ticket>> {
        self.record(Call::FetchTickets)?;
        let state = self.lock();
        let tickets = state
            .tickets
            .values()
            .filter(|t| filters.status.map_or(true, |s| t.status == s))
            .filter(|t| filters.priority.map_or(true, |p| t.priority == p))
            .filter(|t| filters.assigned_to.map_or(true, |a| t.assignee_id() == Some(a)))
            .cloned()
            .collect();
        Ok(Page::single(tickets))
    }

    async fn create_ticket(
        &self,
        ticket: &NewTicket,
        _attachments: &[PendingUpload],
    ) -> Result<Ticket> {
        self.record(Call::CreateTicket(ticket.title.clone()))?;
        let mut state = self.lock();
        state.next_id += 1;
        let id = 1000 + state.next_id;
        let created: Ticket = serde_json::from_value(serde_json::json!({
            "id": id,
            "user_id": ticket.user_id.unwrap_or(1),
            "status": "open",
            "priority": ticket.priority,
            "title": ticket.title,
            "description": ticket.description,
            "ticket_category_id": ticket.ticket_category_id,
        }))?;
        state.tickets.insert(id, created.clone());
        Ok(created)
    }

    async fn update_ticket(&self, id: u64, update: &TicketUpdate) -> Result<()> {
        self.record(Call::UpdateTicket(id, update.clone()))?;
        self.with_stored(id, |ticket| {
            if let Some(status) = update.status {
                ticket.status = status;
            }
            if let Some(priority) = update.priority {
                ticket.priority = priority;
            }
            if let Some(category) = update.ticket_category_id {
                ticket.category = category.map(Category::from_id);
            }
            Ok(())
        })
    }

    /// Assigning an open ticket also moves it to `assigned`.
    async fn assign_ticket(&self, id: u64, user_id: u64) -> Result<()> {
        self.record(Call::AssignTicket(id, user_id))?;
        self.with_stored(id, |ticket| {
            ticket.assignee = Some(UserRef::Id(user_id));
            if ticket.status == TicketStatus::Open {
                ticket.status = TicketStatus::Assigned;
            }
            let entry_id = ticket.assignments.len() as u64 + 1;
            ticket.assignments.push(Assignment {
                id: entry_id,
                ticket_id: Some(id),
                assigned_to: Some(UserRef::Id(user_id)),
                assigned_by: Some(UserRef::Id(1)),
                created_at: None,
            });
            Ok(())
        })
    }

    async fn reopen_ticket(&self, id: u64) -> Result<()> {
        self.record(Call::ReopenTicket(id))?;
        self.with_stored(id, Ticket::reopen)
    }

    async fn add_response(
        &self,
        ticket_id: u64,
        response: &NewResponse,
        _attachments: &[PendingUpload],
    ) -> Result<TicketResponse> {
        let payload = serde_json::to_value(response)?;
        self.record(Call::AddResponse(ticket_id, payload))?;
        self.with_stored(ticket_id, |ticket| {
            let created: TicketResponse = serde_json::from_value(serde_json::json!({
                "id": ticket.responses.len() + 1,
                "ticket_id": ticket_id,
                "body": response.body(),
                "internal": response.internal().unwrap_or(false),
            }))?;
            ticket.responses.push(created.clone());
            Ok(created)
        })
    }

    async fn delete_ticket(&self, id: u64) -> Result<()> {
        self.record(Call::DeleteTicket(id))?;
        self.lock().tickets.remove(&id);
        Ok(())
    }

    async fn delete_attachment(&self, id: u64) -> Result<()> {
        self.record(Call::DeleteAttachment(id))?;
        for ticket in self.lock().tickets.values_mut() {
            ticket.attachments.retain(|a| a.id != id);
        }
        Ok(())
    }

    async fn search_users(&self, term: &str, limit: u32) -> Result<Page<User>> {
        self.record(Call::SearchUsers(term.to_string()))?;
        let delay = self.lock().search_delays.get(term).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let users = self
            .lock()
            .users
            .iter()
            .filter(|u| matches_term(u, term))
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(Page::single(users))
    }
}
