//! Domain models for work-order tracking.
//!
//! This module contains the core domain types: work orders, actors and
//! roles, history entries, the transition policy, and configuration.

/// Work order domain model and validation.
pub mod order;
pub use order::{OrderDraft, OrderUpdate, Priority, Status, ValidationError, WorkOrder};

/// Actors, roles, and the identity provider seam.
pub mod actor;
pub use actor::{Actor, IdentityProvider, Role};

/// Append-only audit record of status changes.
pub mod history;
pub use history::HistoryEntry;

/// The pure transition decision function.
pub mod policy;

mod config;
pub use config::Config;
