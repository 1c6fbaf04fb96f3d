//! Ticket storage trait and types.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::broadcast;

use super::{ScheduledRemoval, Ticket, TicketChange, TicketStatus};

/// Error type for ticket store operations.
#[derive(Debug, Error)]
pub enum TicketError {
    /// The store could not be reached or rejected the operation.
    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for TicketError {
    fn from(e: rusqlite::Error) -> Self {
        TicketError::Database(e.to_string())
    }
}

/// Request to issue a new ticket.
#[derive(Debug, Clone)]
pub struct IssueTicketRequest {
    pub email: String,
    /// Pinned issuance instant. When `None` the store stamps the ticket
    /// while holding the sequence, so queue order follows number order.
    pub timestamp: Option<DateTime<Utc>>,
}

impl IssueTicketRequest {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Filter for querying tickets. Results are always ordered by ascending
/// `timestamp`, then ascending `ticket_number`.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl TicketFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            limit: 1000,
            offset: 0,
        }
    }

    /// Only tickets that are still waiting.
    pub fn waiting() -> Self {
        Self::new().with_status(TicketStatus::Waiting)
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for ticket storage backends.
///
/// Every successful mutation that touches a row publishes one
/// [`TicketChange`] to subscribers.
pub trait TicketStore: Send + Sync {
    /// Insert a waiting ticket carrying the next sequence number.
    ///
    /// Reading and advancing the sequence happen atomically with the insert,
    /// so concurrent issuances never share a number.
    fn issue(&self, request: IssueTicketRequest) -> Result<Ticket, TicketError>;

    /// Get a ticket by ID.
    fn get(&self, id: &str) -> Result<Option<Ticket>, TicketError>;

    /// List tickets matching the filter, oldest first.
    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError>;

    /// Count tickets matching the filter.
    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError>;

    /// Set a ticket's status. Returns `None` when no row matched.
    fn update_status(&self, id: &str, status: TicketStatus)
        -> Result<Option<Ticket>, TicketError>;

    /// Delete a ticket together with any scheduled removal for it.
    /// Returns the deleted ticket, or `None` when no row matched.
    fn delete(&self, id: &str) -> Result<Option<Ticket>, TicketError>;

    /// Schedule (or reschedule) deletion of a ticket at `due_at`.
    fn schedule_removal(&self, id: &str, due_at: DateTime<Utc>) -> Result<(), TicketError>;

    /// Cancel a scheduled removal. Returns whether one existed.
    fn cancel_removal(&self, id: &str) -> Result<bool, TicketError>;

    /// Scheduled removals whose `due_at` is at or before `now`, earliest first.
    fn due_removals(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledRemoval>, TicketError>;

    /// Subscribe to the change feed.
    fn subscribe(&self) -> broadcast::Receiver<TicketChange>;
}
