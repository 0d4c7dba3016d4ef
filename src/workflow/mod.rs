//! Ticket workflow rules that sit between the views and the API.

pub mod assignment;
pub mod guard;
pub mod reconcile;
pub mod visibility;

pub use assignment::{resolve_assignee_name, staff_candidates, AssigneePicker, KnownUsers};
pub use guard::{can_mutate, can_reopen};
pub use reconcile::{submit_mutation, Mutation, TicketView};
pub use visibility::{submit_response, ticket_for_viewer, visible_responses, ResponseComposer};
