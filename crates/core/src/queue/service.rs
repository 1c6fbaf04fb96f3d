//! Queue service: the ticket issuer and the queue controller.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::ticket::{IssueTicketRequest, Ticket, TicketFilter, TicketStatus, TicketStore};

use super::{QueueError, QueueSubscription};

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").expect("email pattern is valid"));

/// Shape check only: one `@` with something on both sides and no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Outcome of [`QueueService::advance`].
#[derive(Debug, Clone, Default)]
pub struct Advanced {
    /// Former head of the line, present only if it was marked `called`.
    pub called: Option<Ticket>,
    /// Ticket now first in line.
    pub on_deck: Option<Ticket>,
}

/// Issues tickets and drives the waiting line.
///
/// All state lives in the [`TicketStore`]; the service itself holds no queue
/// state and is cheap to clone.
#[derive(Clone)]
pub struct QueueService {
    store: Arc<dyn TicketStore>,
    removal_delay: Duration,
}

impl QueueService {
    pub fn new(store: Arc<dyn TicketStore>, config: &QueueConfig) -> Self {
        Self {
            store,
            removal_delay: config.removal_delay(),
        }
    }

    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    pub fn removal_delay(&self) -> Duration {
        self.removal_delay
    }

    /// Issue the next ticket for `email`.
    ///
    /// Store failures propagate so the caller can ask the visitor to retry.
    pub fn issue_ticket(&self, email: &str) -> Result<Ticket, QueueError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(QueueError::InvalidEmail(email.to_string()));
        }

        let ticket = self.store.issue(IssueTicketRequest::new(email)).map_err(|e| {
            error!("Error adding ticket: {}", e);
            QueueError::from(e)
        })?;

        info!("Issued ticket #{} ({})", ticket.ticket_number, ticket.id);
        Ok(ticket)
    }

    /// Look up a single ticket.
    pub fn get_ticket(&self, id: &str) -> Result<Option<Ticket>, QueueError> {
        Ok(self.store.get(id)?)
    }

    /// Waiting tickets, oldest first. Degrades to an empty list on store failure.
    pub fn list_waiting(&self) -> Vec<Ticket> {
        match self.store.list(&TicketFilter::waiting()) {
            Ok(tickets) => tickets,
            Err(e) => {
                error!("Error fetching queue: {}", e);
                Vec::new()
            }
        }
    }

    /// Number of waiting tickets.
    pub fn waiting_count(&self) -> Result<i64, QueueError> {
        Ok(self.store.count(&TicketFilter::waiting())?)
    }

    /// Call the head of the waiting list and schedule its removal.
    ///
    /// An empty queue returns [`Advanced::default`] without touching the
    /// store. The removal is scheduled even if marking the head failed.
    pub fn advance(&self) -> Advanced {
        let mut waiting = self.list_waiting().into_iter();
        let Some(head) = waiting.next() else {
            return Advanced::default();
        };
        let on_deck = waiting.next();

        let called = match self.store.update_status(&head.id, TicketStatus::Called) {
            Ok(Some(ticket)) => {
                info!("Called ticket #{} ({})", ticket.ticket_number, ticket.id);
                Some(ticket)
            }
            // Removed concurrently; nothing left to update
            Ok(None) => {
                debug!("Ticket {} was gone before it could be called", head.id);
                None
            }
            Err(e) => {
                error!("Error updating ticket status for {}: {}", head.id, e);
                None
            }
        };

        let due_at = self.removal_due_at(Utc::now());
        if let Err(e) = self.store.schedule_removal(&head.id, due_at) {
            error!("Error scheduling removal of ticket {}: {}", head.id, e);
        }

        Advanced { called, on_deck }
    }

    /// Delete a ticket. Returns `false` only when the store reported an error;
    /// removing an unknown id succeeds.
    pub fn remove(&self, id: &str) -> bool {
        match self.store.delete(id) {
            Ok(Some(ticket)) => {
                info!("Removed ticket #{} ({})", ticket.ticket_number, ticket.id);
                true
            }
            Ok(None) => {
                debug!("Remove requested for unknown ticket {}", id);
                true
            }
            Err(e) => {
                error!("Error removing ticket {}: {}", id, e);
                false
            }
        }
    }

    /// Cancel the pending removal of a called ticket. Returns whether one was pending.
    pub fn cancel_removal(&self, id: &str) -> bool {
        match self.store.cancel_removal(id) {
            Ok(cancelled) => {
                if cancelled {
                    info!("Cancelled scheduled removal of ticket {}", id);
                }
                cancelled
            }
            Err(e) => {
                error!("Error cancelling removal of ticket {}: {}", id, e);
                false
            }
        }
    }

    /// Invoke `callback` with a fresh waiting list after every store change.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe_to_changes<F>(&self, callback: F) -> QueueSubscription
    where
        F: Fn(Vec<Ticket>) + Send + Sync + 'static,
    {
        // Subscribe before spawning so no change after this call is missed
        let mut rx = self.store.subscribe();
        let queue = self.clone();

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) => {
                        debug!("Queue change {:?} on ticket {}", change.kind, change.ticket_id)
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("Queue subscriber lagged, skipped {} notifications", n)
                    }
                    Err(RecvError::Closed) => {
                        debug!("Queue change feed closed");
                        break;
                    }
                }
                callback(queue.list_waiting());
            }
        });

        QueueSubscription::new(task)
    }

    fn removal_due_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.removal_delay)
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(now)
    }
}
