//! Tickets: the data model, the store contract and its SQLite backing.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteTicketStore;
pub use store::{IssueTicketRequest, TicketError, TicketFilter, TicketStore};
pub use types::{ChangeKind, ScheduledRemoval, Ticket, TicketChange, TicketStatus};
