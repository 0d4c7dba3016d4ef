mod assignment;
mod attachment;
mod category;
mod priority;
mod response;
mod role;
mod status;
mod ticket;
mod user;
mod wire;

pub use assignment::{Assignment, AssignmentHistory};
pub use attachment::Attachment;
pub use category::Category;
pub use priority::Priority;
pub use response::TicketResponse;
pub use role::{classify_role, Role};
pub use status::TicketStatus;
pub use ticket::Ticket;
pub use user::{User, UserRef};

#[cfg(test)]
pub(crate) use ticket::tests::ticket as sample_ticket;
