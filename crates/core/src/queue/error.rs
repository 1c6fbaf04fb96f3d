use thiserror::Error;

use crate::ticket::TicketError;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Invalid email address: {0:?}")]
    InvalidEmail(String),

    #[error(transparent)]
    Store(#[from] TicketError),
}
