//! Persistence for work orders and their history.
//!
//! The [`Store`] trait is the contract the lifecycle service relies on. Its
//! one non-negotiable invariant: a status transition and its history entry
//! are committed as a single atomic unit, serialized per order id.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{HistoryEntry, Status, WorkOrder};

/// Filesystem-backed store: one JSON document per order.
pub mod directory;
mod document;
/// In-memory store for tests and embedding.
pub mod memory;

pub use directory::DirectoryStore;
pub use memory::MemoryStore;

/// Errors surfaced by store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No work order with the given id exists.
    #[error("work order {0} not found")]
    NotFound(Uuid),

    /// The order changed between load and commit; the caller must re-read
    /// and re-decide against the new state.
    #[error("work order {0} was modified concurrently")]
    Conflict(Uuid),

    /// The order mutation committed but the history append did not.
    ///
    /// The store is left inconsistent; reconciliation is an operational
    /// concern. Never retried automatically, since a retry could append the
    /// history entry twice.
    #[error("work order {id} was updated but its history entry was not recorded")]
    Consistency {
        /// The order whose history append failed.
        id: Uuid,
        /// The underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A stored document could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] serde_json::Error),
}

/// CRUD for work orders plus the atomic transition commit.
pub trait Store {
    /// Persist a newly created order.
    ///
    /// # Errors
    ///
    /// Returns an error if the order cannot be written.
    fn insert(&self, order: &WorkOrder) -> Result<(), StoreError>;

    /// Load the order with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such order exists.
    fn load(&self, id: Uuid) -> Result<WorkOrder, StoreError>;

    /// Load every stored order, in no particular sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list(&self) -> Result<Vec<WorkOrder>, StoreError>;

    /// Replace an order's detail fields.
    ///
    /// Compare-and-swap on `updated_at`: fails with [`StoreError::Conflict`]
    /// if the stored order no longer carries `expected_updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such order exists, or
    /// [`StoreError::Conflict`] on a concurrent modification.
    fn replace(
        &self,
        order: &WorkOrder,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Commit a status transition: write the mutated order and append its
    /// history entry as one unit.
    ///
    /// Compare-and-swap on status: fails with [`StoreError::Conflict`] if the
    /// stored order is no longer in `expected_status`, so at most one
    /// transition commits per order per invocation window.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such order exists,
    /// [`StoreError::Conflict`] if another transition committed first, or
    /// [`StoreError::Consistency`] if the order was written but the history
    /// entry was not.
    fn commit_transition(
        &self,
        order: &WorkOrder,
        entry: &HistoryEntry,
        expected_status: Status,
    ) -> Result<(), StoreError>;

    /// The order's history entries in commit order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such order exists.
    fn history(&self, id: Uuid) -> Result<Vec<HistoryEntry>, StoreError>;

    /// Delete an order and, by cascade, its history.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such order exists.
    fn remove(&self, id: Uuid) -> Result<(), StoreError>;
}
