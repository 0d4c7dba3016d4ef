use async_trait::async_trait;

use crate::error::Result;
use crate::responses::{
    Credentials, LoginResponse, NewResponse, NewTicket, Page, TicketFilters, TicketUpdate,
};
use crate::types::{Ticket, TicketResponse, User};
use crate::upload::PendingUpload;

#[cfg(test)]
pub(crate) mod fake;

/// The remote help-desk service as the workflow core sees it.
///
/// Mutations answer with `()`: whatever the server sends back is not trusted
/// as the new state, callers reload the ticket instead.
#[async_trait]
pub trait TicketApi: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<LoginResponse>;

    async fn fetch_ticket(&self, id: u64) -> Result<Ticket>;

    async fn fetch_tickets(&self, filters: &TicketFilters) -> Result<Page<Ticket>>;

    async fn create_ticket(
        &self,
        ticket: &NewTicket,
        attachments: &[PendingUpload],
    ) -> Result<Ticket>;

    /// Status, priority and category changes all go through this call.
    async fn update_ticket(&self, id: u64, update: &TicketUpdate) -> Result<()>;

    async fn assign_ticket(&self, id: u64, user_id: u64) -> Result<()>;

    async fn reopen_ticket(&self, id: u64) -> Result<()>;

    async fn add_response(
        &self,
        ticket_id: u64,
        response: &NewResponse,
        attachments: &[PendingUpload],
    ) -> Result<TicketResponse>;

    async fn delete_ticket(&self, id: u64) -> Result<()>;

    async fn delete_attachment(&self, id: u64) -> Result<()>;

    /// Server-side, case-insensitive match over name, email, department and
    /// employee id.
    async fn search_users(&self, term: &str, limit: u32) -> Result<Page<User>>;
}
