//! Ticket issuance and queue control.
//!
//! - [`QueueService`] issues tickets, lists the waiting line, calls the next
//!   visitor and removes entries.
//! - [`RemovalScheduler`] deletes called tickets once their removal is due.
//! - [`QueueSubscription`] delivers fresh waiting lists on every store change.

mod error;
mod removal;
mod service;
mod subscription;

pub use error::QueueError;
pub use removal::RemovalScheduler;
pub use service::{is_valid_email, Advanced, QueueService};
pub use subscription::QueueSubscription;
