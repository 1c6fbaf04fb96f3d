//! Core ticket data types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a ticket.
///
/// `Completed` is part of the vocabulary but no queue operation assigns it:
/// called tickets are deleted rather than completed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Waiting,
    Called,
    Completed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Waiting => "waiting",
            TicketStatus::Called => "called",
            TicketStatus::Completed => "completed",
        }
    }

    pub fn all() -> [TicketStatus; 3] {
        [
            TicketStatus::Waiting,
            TicketStatus::Called,
            TicketStatus::Completed,
        ]
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(TicketStatus::Waiting),
            "called" => Ok(TicketStatus::Called),
            "completed" => Ok(TicketStatus::Completed),
            other => Err(format!("unknown ticket status: {}", other)),
        }
    }
}

/// One person's place in line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ticket {
    /// Store-assigned opaque identifier.
    pub id: String,
    /// Sequential number handed to the visitor.
    pub ticket_number: u32,
    /// Contact address supplied by the visitor.
    pub email: String,
    pub status: TicketStatus,
    /// Issuance instant; orders the waiting list.
    pub timestamp: DateTime<Utc>,
    /// Row creation instant, assigned by the store.
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    pub fn is_waiting(&self) -> bool {
        self.status == TicketStatus::Waiting
    }
}

/// What happened to a row in the tickets table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Change-feed notification.
///
/// Carries only the affected id; subscribers re-query for the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketChange {
    pub kind: ChangeKind,
    pub ticket_id: String,
}

impl TicketChange {
    pub fn new(kind: ChangeKind, ticket_id: impl Into<String>) -> Self {
        Self {
            kind,
            ticket_id: ticket_id.into(),
        }
    }
}

/// A persisted, cancellable request to delete a ticket once `due_at` passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRemoval {
    pub ticket_id: String,
    pub due_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
}
