//! Background deletion of called tickets.
//!
//! Removals are persisted by the store, so a restart before a removal is due
//! only delays it until the worker runs again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::ticket::TicketStore;

/// Polls the store for due removals and deletes the tickets.
pub struct RemovalScheduler {
    store: Arc<dyn TicketStore>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RemovalScheduler {
    pub fn new(store: Arc<dyn TicketStore>, config: &QueueConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            store,
            poll_interval: config.removal_poll_interval(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            worker: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start the worker loop.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Removal scheduler already running");
            return;
        }

        let store = Arc::clone(&self.store);
        let running = Arc::clone(&self.running);
        let poll_interval = self.poll_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            info!("Removal scheduler started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Removal scheduler received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(poll_interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        process_due(store.as_ref(), Utc::now());
                    }
                }
            }
        });

        *self.worker.lock().await = Some(handle);
    }

    /// Stop the worker loop and wait for it to exit.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Removal scheduler not running");
            return;
        }

        info!("Stopping removal scheduler");
        let _ = self.shutdown_tx.send(());

        if let Some(handle) = self.worker.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Removal scheduler task failed: {}", e);
            }
        }

        info!("Removal scheduler stopped");
    }

    /// Run one pass over removals due at `now`. Returns how many tickets were deleted.
    pub fn process_due(&self, now: DateTime<Utc>) -> usize {
        process_due(self.store.as_ref(), now)
    }
}

fn process_due(store: &dyn TicketStore, now: DateTime<Utc>) -> usize {
    let due = match store.due_removals(now) {
        Ok(due) => due,
        Err(e) => {
            warn!("Failed to load due removals: {}", e);
            return 0;
        }
    };

    let mut removed = 0;
    for removal in due {
        match store.delete(&removal.ticket_id) {
            Ok(Some(ticket)) => {
                info!(
                    "Removed called ticket #{} ({})",
                    ticket.ticket_number, ticket.id
                );
                removed += 1;
            }
            Ok(None) => debug!("Ticket {} already gone", removal.ticket_id),
            // Left in place; retried on the next pass
            Err(e) => warn!("Failed to remove ticket {}: {}", removal.ticket_id, e),
        }
    }

    removed
}
