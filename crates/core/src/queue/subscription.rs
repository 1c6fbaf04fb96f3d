use tokio::task::JoinHandle;

/// Handle for a change subscription created by
/// [`QueueService::subscribe_to_changes`](super::QueueService::subscribe_to_changes).
///
/// Delivery stops when the handle is unsubscribed or dropped.
#[derive(Debug)]
pub struct QueueSubscription {
    task: JoinHandle<()>,
}

impl QueueSubscription {
    pub(super) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Stop receiving callbacks.
    pub fn unsubscribe(self) {
        self.task.abort();
    }

    /// Whether the listener task is still alive.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for QueueSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
