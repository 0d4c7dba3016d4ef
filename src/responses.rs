//! Response envelopes and request bodies shared across endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Priority, TicketStatus, User};

fn default_success() -> bool {
    true
}

/// `{success, message, data, errors?}` wrapper around every API payload.
#[derive(Deserialize, Debug)]
pub struct Envelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Value>,
}

/// Laravel-style page of results.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Page<T> {
    #[serde(default = "first_page")]
    pub current_page: u32,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default = "first_page")]
    pub last_page: u32,
}

fn first_page() -> u32 {
    1
}

impl<T> Page<T> {
    pub fn single(data: Vec<T>) -> Self {
        Self {
            current_page: 1,
            total: data.len() as u64,
            per_page: data.len() as u32,
            last_page: 1,
            data,
        }
    }

    pub fn has_more(&self) -> bool {
        self.current_page < self.last_page
    }
}

/// List endpoints answer with either a page or a bare array.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum Listing<T> {
    Plain(Vec<T>),
    Paged(Page<T>),
}

impl<T> Listing<T> {
    pub fn into_page(self) -> Page<T> {
        match self {
            Listing::Paged(page) => page,
            Listing::Plain(items) => Page::single(items),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

/// Login and register answer with the token as `jwt` (older builds: `token`).
#[derive(Deserialize, Debug, Clone)]
pub struct LoginResponse {
    #[serde(alias = "token")]
    pub jwt: String,
    pub user: User,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct TicketFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TicketStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_category_id: Option<u64>,
    /// Set only when staff file a ticket on behalf of someone else.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
}

/// Partial update; every change to status, priority and category goes through it.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct TicketUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TicketStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// `Some(None)` clears the category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_category_id: Option<Option<u64>>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AssignRequest {
    pub assigned_to: u64,
}

/// A reply body. Only the staff shape carries the `internal` field; a member
/// reply has no way to express it.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum NewResponse {
    Member { body: String },
    Staff { body: String, internal: bool },
}

impl NewResponse {
    pub fn body(&self) -> &str {
        match self {
            NewResponse::Member { body } | NewResponse::Staff { body, .. } => body,
        }
    }

    pub fn internal(&self) -> Option<bool> {
        match self {
            NewResponse::Member { .. } => None,
            NewResponse::Staff { internal, .. } => Some(*internal),
        }
    }
}
