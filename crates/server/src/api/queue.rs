//! Queue controller API handlers.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use super::tickets::TicketResponse;
use crate::metrics::TICKETS_CALLED_TOTAL;
use crate::state::AppState;

/// Response for listing the waiting line
#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub tickets: Vec<TicketResponse>,
    pub total: usize,
}

impl QueueResponse {
    pub fn new(tickets: Vec<TicketResponse>) -> Self {
        Self {
            total: tickets.len(),
            tickets,
        }
    }
}

/// Response for advancing the queue
#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    /// Ticket that was just called.
    pub called: Option<TicketResponse>,
    /// Ticket now first in line, if anyone is still waiting.
    pub on_deck: Option<TicketResponse>,
}

/// List waiting tickets, oldest first
pub async fn list_waiting(State(state): State<Arc<AppState>>) -> Json<QueueResponse> {
    let tickets = state
        .queue()
        .list_waiting()
        .into_iter()
        .map(TicketResponse::from)
        .collect();
    Json(QueueResponse::new(tickets))
}

/// Call the next visitor
pub async fn advance(State(state): State<Arc<AppState>>) -> Json<AdvanceResponse> {
    let advanced = state.queue().advance();
    if advanced.called.is_some() {
        TICKETS_CALLED_TOTAL.inc();
    }

    Json(AdvanceResponse {
        called: advanced.called.map(TicketResponse::from),
        on_deck: advanced.on_deck.map(TicketResponse::from),
    })
}
