use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::wire::lenient_id;
use super::{
    Assignment, AssignmentHistory, Attachment, Category, Priority, TicketResponse, TicketStatus,
    User, UserRef,
};
use crate::error::{HelpdeskError, Result};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(from = "WireTicket")]
pub struct Ticket {
    pub id: u64,
    pub user_id: u64,
    pub owner: Option<User>,
    pub category: Option<Category>,
    pub assignee: Option<UserRef>,
    pub status: TicketStatus,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub last_response_at: Option<String>,
    pub resolved_at: Option<String>,
    pub due_at: Option<String>,
    pub last_reopened_at: Option<String>,
    pub reopens: u32,
    pub responses: Vec<TicketResponse>,
    pub assignments: AssignmentHistory,
    pub attachments: Vec<Attachment>,
}

impl Ticket {
    /// Move a resolved or closed ticket back into active work.
    pub fn reopen(&mut self) -> Result<()> {
        if !self.status.is_terminal() {
            return Err(HelpdeskError::guard(format!(
                "Ticket #{} is {} and cannot be reopened. Only resolved or closed tickets can be reopened.",
                self.id,
                self.status.as_str()
            )));
        }

        self.status = TicketStatus::InProgress;
        self.reopens = self.reopens.saturating_add(1);
        self.last_reopened_at = Some(Utc::now().to_rfc3339());
        Ok(())
    }

    pub fn assignee_id(&self) -> Option<u64> {
        self.assignee.as_ref().map(UserRef::id)
    }

    pub fn category_id(&self) -> Option<u64> {
        self.category.as_ref().map(|c| c.id)
    }
}

#[derive(Deserialize)]
struct WireTicket {
    id: u64,
    #[serde(default, deserialize_with = "lenient_id")]
    user_id: Option<u64>,
    #[serde(default)]
    user: Option<User>,
    #[serde(default, rename = "createdBy")]
    created_by: Option<User>,
    #[serde(default, deserialize_with = "lenient_id")]
    ticket_category_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_id")]
    category_id: Option<u64>,
    #[serde(default)]
    ticket_category: Option<Category>,
    #[serde(default, rename = "ticketCategory")]
    ticket_category_camel: Option<Category>,
    #[serde(default)]
    category: Option<Category>,
    #[serde(default)]
    assigned_to: Option<Value>,
    #[serde(default, rename = "assignedTo")]
    assigned_to_user: Option<Value>,
    status: TicketStatus,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    last_response_at: Option<String>,
    #[serde(default)]
    resolved_at: Option<String>,
    #[serde(default)]
    due_at: Option<String>,
    #[serde(default)]
    last_reopened_at: Option<String>,
    #[serde(default)]
    reopens: Option<u32>,
    #[serde(default)]
    responses: Option<Vec<TicketResponse>>,
    #[serde(default)]
    assignments: Option<Vec<Assignment>>,
    #[serde(default)]
    attachments: Option<Vec<Attachment>>,
}

impl From<WireTicket> for Ticket {
    fn from(wire: WireTicket) -> Self {
        let owner = wire.user.or(wire.created_by);
        let category = wire
            .ticket_category
            .or(wire.ticket_category_camel)
            .or(wire.category)
            .or_else(|| {
                wire.ticket_category_id
                    .or(wire.category_id)
                    .map(Category::from_id)
            });

        Self {
            id: wire.id,
            user_id: wire
                .user_id
                .or(owner.as_ref().map(|u| u.id))
                .unwrap_or_default(),
            owner,
            category,
            assignee: UserRef::normalize(wire.assigned_to.as_ref(), wire.assigned_to_user.as_ref()),
            status: wire.status,
            priority: wire.priority.unwrap_or_default(),
            title: wire.title.unwrap_or_default(),
            description: wire.description.unwrap_or_default(),
            created_at: wire.created_at,
            updated_at: wire.updated_at,
            last_response_at: wire.last_response_at,
            resolved_at: wire.resolved_at,
            due_at: wire.due_at,
            last_reopened_at: wire.last_reopened_at,
            reopens: wire.reopens.unwrap_or_default(),
            responses: wire.responses.unwrap_or_default(),
            assignments: wire.assignments.unwrap_or_default().into(),
            attachments: wire.attachments.unwrap_or_default(),
        }
    }
}
