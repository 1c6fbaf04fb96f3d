pub mod handlers;
pub mod middleware;
pub mod queue;
pub mod routes;
pub mod tickets;
pub mod ws;

pub use routes::create_router;
pub use tickets::{ErrorResponse, TicketResponse};
pub use ws::{forward_queue_changes, WsBroadcaster, WsMessage};
