//! SQLite-backed ticket store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension, TransactionBehavior};
use tokio::sync::broadcast;
use tracing::debug;

use super::{
    ChangeKind, IssueTicketRequest, ScheduledRemoval, Ticket, TicketChange, TicketError,
    TicketFilter, TicketStatus, TicketStore,
};

/// Buffered change notifications per subscriber before it starts lagging.
const CHANGE_FEED_CAPACITY: usize = 256;

/// How long a writer waits for another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SEQUENCE_NAME: &str = "ticket_number";

const TICKET_COLUMNS: &str = "id, ticket_number, email, status, timestamp, created_at";

/// SQLite-backed ticket store.
pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<TicketChange>,
}

impl SqliteTicketStore {
    /// Create a new SQLite ticket store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TicketError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory SQLite ticket store (useful for testing).
    pub fn in_memory() -> Result<Self, TicketError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, TicketError> {
        Self::initialize_schema(&conn)?;
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TicketError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                id TEXT PRIMARY KEY,
                ticket_number INTEGER NOT NULL UNIQUE,
                email TEXT NOT NULL,
                status TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_status_timestamp ON tickets(status, timestamp);

            CREATE TABLE IF NOT EXISTS ticket_sequence (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS scheduled_removals (
                ticket_id TEXT PRIMARY KEY,
                due_at TEXT NOT NULL,
                scheduled_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_scheduled_removals_due_at ON scheduled_removals(due_at);
            "#,
        )?;

        // Seed the sequence from existing rows so an older database keeps counting up.
        conn.execute(
            "INSERT OR IGNORE INTO ticket_sequence (name, value) \
             SELECT ?1, COALESCE(MAX(ticket_number), 0) FROM tickets",
            params![SEQUENCE_NAME],
        )?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, TicketError> {
        self.conn
            .lock()
            .map_err(|_| TicketError::Database("connection mutex poisoned".to_string()))
    }

    fn notify(&self, kind: ChangeKind, ticket_id: &str) {
        // Send only fails when nobody is subscribed
        let _ = self.changes.send(TicketChange::new(kind, ticket_id));
    }

    fn build_where_clause(filter: &TicketFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn select_one(conn: &Connection, id: &str) -> Result<Option<Ticket>, TicketError> {
        let ticket = conn
            .query_row(
                &format!("SELECT {} FROM tickets WHERE id = ?", TICKET_COLUMNS),
                params![id],
                Self::row_to_ticket,
            )
            .optional()?;
        Ok(ticket)
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let status_str: String = row.get(3)?;
        let status = status_str
            .parse::<TicketStatus>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?;

        Ok(Ticket {
            id: row.get(0)?,
            ticket_number: row.get(1)?,
            email: row.get(2)?,
            status,
            timestamp: parse_instant(row, 4)?,
            created_at: parse_instant(row, 5)?,
        })
    }
}

/// Instants are stored with microsecond precision.
fn truncate_to_micros(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .with_nanosecond(instant.nanosecond() / 1_000 * 1_000)
        .unwrap_or(instant)
}

/// Fixed-width RFC 3339 so that text ordering matches chronological ordering.
fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_instant(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl TicketStore for SqliteTicketStore {
    fn issue(&self, request: IssueTicketRequest) -> Result<Ticket, TicketError> {
        let ticket = {
            let mut conn = self.conn()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let ticket_number: u32 = tx.query_row(
                "UPDATE ticket_sequence SET value = value + 1 WHERE name = ?1 RETURNING value",
                params![SEQUENCE_NAME],
                |row| row.get(0),
            )?;

            let created_at = truncate_to_micros(Utc::now());
            let ticket = Ticket {
                id: uuid::Uuid::new_v4().to_string(),
                ticket_number,
                email: request.email,
                status: TicketStatus::Waiting,
                timestamp: request.timestamp.map_or(created_at, truncate_to_micros),
                created_at,
            };

            tx.execute(
                "INSERT INTO tickets (id, ticket_number, email, status, timestamp, created_at) VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    ticket.id,
                    ticket.ticket_number,
                    ticket.email,
                    ticket.status.as_str(),
                    format_instant(&ticket.timestamp),
                    format_instant(&ticket.created_at),
                ],
            )?;

            tx.commit()?;
            ticket
        };

        debug!("Issued ticket #{} ({})", ticket.ticket_number, ticket.id);
        self.notify(ChangeKind::Insert, &ticket.id);
        Ok(ticket)
    }

    fn get(&self, id: &str) -> Result<Option<Ticket>, TicketError> {
        let conn = self.conn()?;
        Self::select_one(&conn, id)
    }

    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM tickets {} ORDER BY timestamp ASC, ticket_number ASC LIMIT ? OFFSET ?",
            TICKET_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql)?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let tickets = stmt
            .query_map(param_refs.as_slice(), Self::row_to_ticket)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tickets)
    }

    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM tickets {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
        Ok(count)
    }

    fn update_status(
        &self,
        id: &str,
        status: TicketStatus,
    ) -> Result<Option<Ticket>, TicketError> {
        let updated = {
            let conn = self.conn()?;
            let changed = conn.execute(
                "UPDATE tickets SET status = ? WHERE id = ?",
                params![status.as_str(), id],
            )?;
            if changed == 0 {
                None
            } else {
                Self::select_one(&conn, id)?
            }
        };

        if updated.is_some() {
            self.notify(ChangeKind::Update, id);
        }
        Ok(updated)
    }

    fn delete(&self, id: &str) -> Result<Option<Ticket>, TicketError> {
        let deleted = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;

            let ticket = Self::select_one(&tx, id)?;
            tx.execute("DELETE FROM tickets WHERE id = ?", params![id])?;
            tx.execute(
                "DELETE FROM scheduled_removals WHERE ticket_id = ?",
                params![id],
            )?;

            tx.commit()?;
            ticket
        };

        if deleted.is_some() {
            self.notify(ChangeKind::Delete, id);
        }
        Ok(deleted)
    }

    fn schedule_removal(&self, id: &str, due_at: DateTime<Utc>) -> Result<(), TicketError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO scheduled_removals (ticket_id, due_at, scheduled_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(ticket_id) DO UPDATE SET due_at = excluded.due_at, scheduled_at = excluded.scheduled_at",
            params![id, format_instant(&due_at), format_instant(&Utc::now())],
        )?;
        Ok(())
    }

    fn cancel_removal(&self, id: &str) -> Result<bool, TicketError> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM scheduled_removals WHERE ticket_id = ?",
            params![id],
        )?;
        Ok(removed > 0)
    }

    fn due_removals(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledRemoval>, TicketError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT ticket_id, due_at, scheduled_at FROM scheduled_removals \
             WHERE due_at <= ? ORDER BY due_at ASC",
        )?;

        let removals = stmt
            .query_map(params![format_instant(&now)], |row| {
                Ok(ScheduledRemoval {
                    ticket_id: row.get(0)?,
                    due_at: parse_instant(row, 1)?,
                    scheduled_at: parse_instant(row, 2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(removals)
    }

    fn subscribe(&self) -> broadcast::Receiver<TicketChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::Duration as ChronoDuration;

    fn create_test_store() -> SqliteTicketStore {
        SqliteTicketStore::in_memory().unwrap()
    }

    fn at(offset_secs: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + ChronoDuration::seconds(offset_secs)
    }

    #[test]
    fn test_issue_ticket() {
        let store = create_test_store();

        let ticket = store.issue(IssueTicketRequest::new("a@x.com")).unwrap();

        assert!(!ticket.id.is_empty());
        assert_eq!(ticket.ticket_number, 1);
        assert_eq!(ticket.email, "a@x.com");
        assert_eq!(ticket.status, TicketStatus::Waiting);
    }

    #[test]
    fn test_issue_numbers_increase_by_one() {
        let store = create_test_store();

        let numbers: Vec<u32> = (0..5)
            .map(|i| {
                store
                    .issue(IssueTicketRequest::new(format!("user{}@x.com", i)))
                    .unwrap()
                    .ticket_number
            })
            .collect();

        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_numbers_not_reused_after_delete() {
        let store = create_test_store();

        let first = store.issue(IssueTicketRequest::new("a@x.com")).unwrap();
        store.delete(&first.id).unwrap();

        let second = store.issue(IssueTicketRequest::new("b@x.com")).unwrap();
        assert_eq!(second.ticket_number, 2);
    }

    #[test]
    fn test_concurrent_issuance_yields_unique_numbers() {
        let store = Arc::new(create_test_store());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..10)
                        .map(|j| {
                            store
                                .issue(IssueTicketRequest::new(format!("t{}-{}@x.com", i, j)))
                                .unwrap()
                                .ticket_number
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let numbers: HashSet<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        assert_eq!(numbers.len(), 80);
        assert_eq!(numbers.iter().max(), Some(&80));
    }

    #[test]
    fn test_concurrent_issuance_lists_in_number_order() {
        for _ in 0..20 {
            let store = Arc::new(create_test_store());

            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let store = Arc::clone(&store);
                    std::thread::spawn(move || {
                        store
                            .issue(IssueTicketRequest::new(format!("t{}@x.com", i)))
                            .unwrap();
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            let listed: Vec<u32> = store
                .list(&TicketFilter::waiting())
                .unwrap()
                .iter()
                .map(|t| t.ticket_number)
                .collect();
            assert_eq!(listed, (1..=16).collect::<Vec<u32>>());
        }
    }

    #[test]
    fn test_issue_stamps_timestamp_at_creation() {
        let store = create_test_store();
        let ticket = store.issue(IssueTicketRequest::new("a@x.com")).unwrap();
        assert_eq!(ticket.timestamp, ticket.created_at);

        let pinned = store
            .issue(IssueTicketRequest::new("b@x.com").at(at(0)))
            .unwrap();
        assert_eq!(pinned.timestamp, at(0));
    }

    #[test]
    fn test_get_ticket() {
        let store = create_test_store();
        let created = store.issue(IssueTicketRequest::new("a@x.com")).unwrap();

        let fetched = store.get(&created.id).unwrap().unwrap();

        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.ticket_number, created.ticket_number);
        assert_eq!(fetched.timestamp, created.timestamp);
    }

    #[test]
    fn test_get_nonexistent_ticket() {
        let store = create_test_store();
        assert!(store.get("nonexistent-id").unwrap().is_none());
    }

    #[test]
    fn test_list_orders_by_timestamp() {
        let store = create_test_store();

        // Issued out of chronological order on purpose
        store
            .issue(IssueTicketRequest::new("late@x.com").at(at(30)))
            .unwrap();
        store
            .issue(IssueTicketRequest::new("early@x.com").at(at(0)))
            .unwrap();
        store
            .issue(IssueTicketRequest::new("middle@x.com").at(at(10)))
            .unwrap();

        let emails: Vec<String> = store
            .list(&TicketFilter::new())
            .unwrap()
            .into_iter()
            .map(|t| t.email)
            .collect();

        assert_eq!(emails, vec!["early@x.com", "middle@x.com", "late@x.com"]);
    }

    #[test]
    fn test_list_equal_timestamps_fall_back_to_number() {
        let store = create_test_store();

        for email in ["a@x.com", "b@x.com", "c@x.com"] {
            store
                .issue(IssueTicketRequest::new(email).at(at(0)))
                .unwrap();
        }

        let numbers: Vec<u32> = store
            .list(&TicketFilter::new())
            .unwrap()
            .iter()
            .map(|t| t.ticket_number)
            .collect();

        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_list_with_status_filter() {
        let store = create_test_store();

        store.issue(IssueTicketRequest::new("a@x.com")).unwrap();
        let second = store.issue(IssueTicketRequest::new("b@x.com")).unwrap();
        store
            .update_status(&second.id, TicketStatus::Called)
            .unwrap();

        let waiting = store.list(&TicketFilter::waiting()).unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].email, "a@x.com");

        let called = store
            .list(&TicketFilter::new().with_status(TicketStatus::Called))
            .unwrap();
        assert_eq!(called.len(), 1);
        assert_eq!(called[0].id, second.id);
    }

    #[test]
    fn test_list_pagination() {
        let store = create_test_store();

        for i in 0..5 {
            store
                .issue(IssueTicketRequest::new(format!("u{}@x.com", i)).at(at(i)))
                .unwrap();
        }

        let page = store
            .list(&TicketFilter::new().with_limit(2).with_offset(4))
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].ticket_number, 5);
    }

    #[test]
    fn test_count_with_filter() {
        let store = create_test_store();

        store.issue(IssueTicketRequest::new("a@x.com")).unwrap();
        let second = store.issue(IssueTicketRequest::new("b@x.com")).unwrap();
        store
            .update_status(&second.id, TicketStatus::Called)
            .unwrap();

        assert_eq!(store.count(&TicketFilter::new()).unwrap(), 2);
        assert_eq!(store.count(&TicketFilter::waiting()).unwrap(), 1);
    }

    #[test]
    fn test_update_status() {
        let store = create_test_store();
        let ticket = store.issue(IssueTicketRequest::new("a@x.com")).unwrap();

        let updated = store
            .update_status(&ticket.id, TicketStatus::Called)
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, TicketStatus::Called);

        let fetched = store.get(&ticket.id).unwrap().unwrap();
        assert_eq!(fetched.status, TicketStatus::Called);
    }

    #[test]
    fn test_update_status_nonexistent_ticket() {
        let store = create_test_store();
        let result = store
            .update_status("nonexistent-id", TicketStatus::Called)
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_delete_ticket() {
        let store = create_test_store();
        let ticket = store.issue(IssueTicketRequest::new("a@x.com")).unwrap();

        let deleted = store.delete(&ticket.id).unwrap().unwrap();
        assert_eq!(deleted.id, ticket.id);
        assert!(store.get(&ticket.id).unwrap().is_none());

        // Second delete finds nothing
        assert!(store.delete(&ticket.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_drops_scheduled_removal() {
        let store = create_test_store();
        let ticket = store.issue(IssueTicketRequest::new("a@x.com")).unwrap();
        store.schedule_removal(&ticket.id, at(0)).unwrap();

        store.delete(&ticket.id).unwrap();

        assert!(store.due_removals(at(60)).unwrap().is_empty());
        assert!(!store.cancel_removal(&ticket.id).unwrap());
    }

    #[test]
    fn test_due_removals() {
        let store = create_test_store();
        store.schedule_removal("later", at(20)).unwrap();
        store.schedule_removal("sooner", at(5)).unwrap();

        assert!(store.due_removals(at(0)).unwrap().is_empty());

        let due: Vec<String> = store
            .due_removals(at(10))
            .unwrap()
            .into_iter()
            .map(|r| r.ticket_id)
            .collect();
        assert_eq!(due, vec!["sooner"]);

        let due = store.due_removals(at(20)).unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].ticket_id, "sooner");
        assert_eq!(due[1].due_at, at(20));
    }

    #[test]
    fn test_reschedule_replaces_due_time() {
        let store = create_test_store();
        store.schedule_removal("t1", at(5)).unwrap();
        store.schedule_removal("t1", at(50)).unwrap();

        assert!(store.due_removals(at(10)).unwrap().is_empty());
        assert_eq!(store.due_removals(at(50)).unwrap().len(), 1);
    }

    #[test]
    fn test_cancel_removal() {
        let store = create_test_store();
        store.schedule_removal("t1", at(5)).unwrap();

        assert!(store.cancel_removal("t1").unwrap());
        assert!(!store.cancel_removal("t1").unwrap());
        assert!(store.due_removals(at(10)).unwrap().is_empty());
    }

    #[test]
    fn test_change_feed_events() {
        let store = create_test_store();
        let mut rx = store.subscribe();

        let ticket = store.issue(IssueTicketRequest::new("a@x.com")).unwrap();
        store
            .update_status(&ticket.id, TicketStatus::Called)
            .unwrap();
        store.delete(&ticket.id).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            TicketChange::new(ChangeKind::Insert, &ticket.id)
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            TicketChange::new(ChangeKind::Update, &ticket.id)
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            TicketChange::new(ChangeKind::Delete, &ticket.id)
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_no_event_when_nothing_matched() {
        let store = create_test_store();
        let mut rx = store.subscribe();

        store
            .update_status("missing", TicketStatus::Called)
            .unwrap();
        store.delete("missing").unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_file_based_store_keeps_sequence_across_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("walkin.db");

        {
            let store = SqliteTicketStore::new(&db_path).unwrap();
            store.issue(IssueTicketRequest::new("a@x.com")).unwrap();
            store.issue(IssueTicketRequest::new("b@x.com")).unwrap();
        }

        assert!(db_path.exists());

        let store = SqliteTicketStore::new(&db_path).unwrap();
        let ticket = store.issue(IssueTicketRequest::new("c@x.com")).unwrap();
        assert_eq!(ticket.ticket_number, 3);
        assert_eq!(store.count(&TicketFilter::new()).unwrap(), 3);
    }
}
