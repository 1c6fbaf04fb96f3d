//! WebSocket support for the live front-desk view.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use walkin_core::{QueueService, QueueSubscription, Ticket};

use super::tickets::TicketResponse;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// How often a heartbeat is sent to each client.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket message sent to clients for real-time updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// The full waiting line after a change.
    QueueSnapshot {
        tickets: Vec<TicketResponse>,
        total: usize,
    },
    /// Server heartbeat (sent periodically to keep connection alive).
    Heartbeat { timestamp: i64 },
}

impl WsMessage {
    pub fn queue_snapshot(tickets: Vec<Ticket>) -> Self {
        let tickets: Vec<TicketResponse> = tickets.into_iter().map(TicketResponse::from).collect();
        WsMessage::QueueSnapshot {
            total: tickets.len(),
            tickets,
        }
    }

    pub fn heartbeat() -> Self {
        WsMessage::Heartbeat {
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            WsMessage::QueueSnapshot { .. } => "queue_snapshot",
            WsMessage::Heartbeat { .. } => "heartbeat",
        }
    }
}

/// Broadcaster for WebSocket messages using tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsMessage>,
}

impl WsBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast a message to all connected clients.
    pub fn broadcast(&self, msg: WsMessage) {
        // Send errors only mean no one is listening
        let _ = self.sender.send(msg);
    }

    /// Subscribe to receive messages.
    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }

    /// Broadcast the current waiting line.
    pub fn queue_changed(&self, tickets: Vec<Ticket>) {
        self.broadcast(WsMessage::queue_snapshot(tickets));
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Push a fresh waiting line to every WebSocket client whenever the queue changes.
///
/// Forwarding stops when the returned subscription is dropped.
pub fn forward_queue_changes(queue: &QueueService, broadcaster: &WsBroadcaster) -> QueueSubscription {
    let broadcaster = broadcaster.clone();
    queue.subscribe_to_changes(move |tickets| broadcaster.queue_changed(tickets))
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Serialize and send one message. Returns `false` once the client is gone.
async fn send_message(sender: &mut SplitSink<WebSocket, Message>, msg: &WsMessage) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize WsMessage: {}", e);
            return true;
        }
    };

    if sender.send(Message::Text(json.into())).await.is_err() {
        debug!("WebSocket send failed, client disconnected");
        return false;
    }

    WS_MESSAGES_SENT.with_label_values(&[msg.type_name()]).inc();
    true
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before taking the snapshot so no change falls in between
    let mut rx = state.ws_broadcaster().subscribe();
    let initial = WsMessage::queue_snapshot(state.queue().list_waiting());

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        if !send_message(&mut sender, &initial).await {
            return;
        }

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        // The first tick completes immediately
        heartbeat.tick().await;

        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(msg) => {
                            if !send_message(&mut sender, &msg).await {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            // Snapshots are complete, the next one catches the client up
                            warn!("WebSocket client lagged, skipped {} messages", n);
                            WS_LAG_EVENTS.inc();
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Broadcast channel closed");
                            break;
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    if !send_message(&mut sender, &WsMessage::heartbeat()).await {
                        break;
                    }
                }
            }
        }
    });

    // Handle incoming messages from client (ping/pong, close)
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => {
                debug!("Ignoring text message from client: {}", text);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}
