//! Mock ticket store for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::ticket::{
    IssueTicketRequest, ScheduledRemoval, SqliteTicketStore, Ticket, TicketChange, TicketError,
    TicketFilter, TicketStatus, TicketStore,
};

/// Ticket store backed by in-memory SQLite with switchable failures.
///
/// - Reads (`get`, `list`, `count`, `due_removals`) fail while `fail_reads` is set
/// - Writes (everything else except `subscribe`) fail while `fail_writes` is set
/// - Every write attempt is recorded by operation name, failed or not
pub struct MockTicketStore {
    inner: SqliteTicketStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: Mutex<Vec<String>>,
}

impl Default for MockTicketStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTicketStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteTicketStore::in_memory().expect("in-memory sqlite store"),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Names of the write operations attempted so far, in order.
    pub fn recorded_writes(&self) -> Vec<String> {
        self.writes.lock().expect("writes lock").clone()
    }

    pub fn clear_recorded_writes(&self) {
        self.writes.lock().expect("writes lock").clear();
    }

    fn read(&self) -> Result<(), TicketError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(TicketError::Database("mock read failure".to_string()));
        }
        Ok(())
    }

    fn write(&self, operation: &str) -> Result<(), TicketError> {
        self.writes
            .lock()
            .expect("writes lock")
            .push(operation.to_string());
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TicketError::Database("mock write failure".to_string()));
        }
        Ok(())
    }
}

impl TicketStore for MockTicketStore {
    fn issue(&self, request: IssueTicketRequest) -> Result<Ticket, TicketError> {
        self.write("issue")?;
        self.inner.issue(request)
    }

    fn get(&self, id: &str) -> Result<Option<Ticket>, TicketError> {
        self.read()?;
        self.inner.get(id)
    }

    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError> {
        self.read()?;
        self.inner.list(filter)
    }

    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError> {
        self.read()?;
        self.inner.count(filter)
    }

    fn update_status(
        &self,
        id: &str,
        status: TicketStatus,
    ) -> Result<Option<Ticket>, TicketError> {
        self.write("update_status")?;
        self.inner.update_status(id, status)
    }

    fn delete(&self, id: &str) -> Result<Option<Ticket>, TicketError> {
        self.write("delete")?;
        self.inner.delete(id)
    }

    fn schedule_removal(&self, id: &str, due_at: DateTime<Utc>) -> Result<(), TicketError> {
        self.write("schedule_removal")?;
        self.inner.schedule_removal(id, due_at)
    }

    fn cancel_removal(&self, id: &str) -> Result<bool, TicketError> {
        self.write("cancel_removal")?;
        self.inner.cancel_removal(id)
    }

    fn due_removals(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledRemoval>, TicketError> {
        self.read()?;
        self.inner.due_removals(now)
    }

    fn subscribe(&self) -> broadcast::Receiver<TicketChange> {
        self.inner.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_through_when_healthy() {
        let store = MockTicketStore::new();
        let ticket = store.issue(IssueTicketRequest::new("a@x.com")).unwrap();
        assert_eq!(store.list(&TicketFilter::new()).unwrap(), vec![ticket]);
        assert_eq!(store.recorded_writes(), vec!["issue"]);
    }

    #[test]
    fn test_failure_switches() {
        let store = MockTicketStore::new();

        store.set_fail_writes(true);
        assert!(store.issue(IssueTicketRequest::new("a@x.com")).is_err());
        assert!(store.list(&TicketFilter::new()).unwrap().is_empty());

        store.set_fail_reads(true);
        assert!(store.list(&TicketFilter::new()).is_err());

        store.set_fail_writes(false);
        store.set_fail_reads(false);
        assert!(store.issue(IssueTicketRequest::new("a@x.com")).is_ok());
        assert_eq!(store.recorded_writes(), vec!["issue", "issue"]);
    }
}
