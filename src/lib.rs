//! Maintenance Work-Order Tracking
//!
//! Work orders move through a role-gated lifecycle
//! (`pending → in_progress → completed | cancelled`) and every status change
//! is recorded in an append-only history.

pub mod domain;
pub use domain::{
    Actor, Config, HistoryEntry, IdentityProvider, OrderDraft, OrderUpdate, Priority, Role,
    Status, ValidationError, WorkOrder,
};

/// Lifecycle orchestration: create, update, transition, list, delete.
pub mod service;
pub use service::{Error, Tracker};

/// Persistence seam and the bundled store implementations.
pub mod storage;
pub use storage::{DirectoryStore, MemoryStore, Store, StoreError};
