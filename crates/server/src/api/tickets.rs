//! Ticket API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use walkin_core::{QueueError, Ticket, TicketStatus};

use crate::metrics::{TICKETS_ISSUED_TOTAL, TICKETS_REMOVED_TOTAL};
use crate::state::AppState;

/// Shown to the visitor when a ticket could not be stored.
pub const ISSUE_FAILED_MESSAGE: &str = "Failed to get ticket. Please try again.";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for issuing a ticket
#[derive(Debug, Deserialize)]
pub struct IssueTicketBody {
    pub email: String,
}

/// Ticket as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketResponse {
    pub id: String,
    pub ticket_number: u32,
    pub email: String,
    pub status: TicketStatus,
    pub timestamp: String,
    pub created_at: String,
}

impl From<Ticket> for TicketResponse {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id,
            ticket_number: ticket.ticket_number,
            email: ticket.email,
            status: ticket.status,
            timestamp: ticket.timestamp.to_rfc3339(),
            created_at: ticket.created_at.to_rfc3339(),
        }
    }
}

/// Response for removing a ticket
#[derive(Debug, Serialize)]
pub struct RemoveTicketResponse {
    pub removed: bool,
}

/// Response for cancelling a scheduled removal
#[derive(Debug, Serialize)]
pub struct CancelRemovalResponse {
    pub cancelled: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Handlers
// ============================================================================

/// Issue the next ticket
pub async fn issue_ticket(
    State(state): State<Arc<AppState>>,
    Json(body): Json<IssueTicketBody>,
) -> Result<(StatusCode, Json<TicketResponse>), ApiError> {
    match state.queue().issue_ticket(&body.email) {
        Ok(ticket) => {
            TICKETS_ISSUED_TOTAL.inc();
            Ok((StatusCode::CREATED, Json(TicketResponse::from(ticket))))
        }
        Err(e @ QueueError::InvalidEmail(_)) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(e.to_string())),
        )),
        Err(QueueError::Store(_)) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(ISSUE_FAILED_MESSAGE)),
        )),
    }
}

/// Get a ticket by ID
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TicketResponse>, ApiError> {
    match state.queue().get_ticket(&id) {
        Ok(Some(ticket)) => Ok(Json(TicketResponse::from(ticket))),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("Ticket not found: {}", id))),
        )),
        Err(e) => {
            warn!("Failed to load ticket {}: {}", id, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            ))
        }
    }
}

/// Remove a ticket (DELETE endpoint)
pub async fn remove_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<RemoveTicketResponse> {
    let removed = state.queue().remove(&id);
    if removed {
        TICKETS_REMOVED_TOTAL.inc();
    }
    Json(RemoveTicketResponse { removed })
}

/// Cancel the pending removal of a called ticket
pub async fn cancel_removal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<CancelRemovalResponse> {
    Json(CancelRemovalResponse {
        cancelled: state.queue().cancel_removal(&id),
    })
}
