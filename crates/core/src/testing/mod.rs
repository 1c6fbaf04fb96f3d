//! Testing utilities for the queue.
//!
//! # Example
//!
//! ```rust,ignore
//! use walkin_core::testing::MockTicketStore;
//!
//! let store = Arc::new(MockTicketStore::new());
//! store.set_fail_reads(true);
//!
//! let queue = QueueService::new(store.clone(), &QueueConfig::default());
//! assert!(queue.list_waiting().is_empty());
//! ```

mod mock_ticket_store;

pub use mock_ticket_store::MockTicketStore;
