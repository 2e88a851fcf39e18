use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Store, StoreError};
use crate::domain::{HistoryEntry, Status, WorkOrder};

/// An in-memory [`Store`].
///
/// Primarily for tests, but also usable for embedding the tracker without
/// persistence. A single mutex over the whole map gives the per-order commit
/// serialization the [`Store`] contract requires.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<Uuid, Record>>,
}

#[derive(Debug)]
struct Record {
    order: WorkOrder,
    history: Vec<HistoryEntry>,
}

impl MemoryStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Record>> {
        // A poisoned lock only means some caller panicked while holding it;
        // the map itself is still structurally sound.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for MemoryStore {
    fn insert(&self, order: &WorkOrder) -> Result<(), StoreError> {
        self.lock().insert(
            order.id(),
            Record {
                order: order.clone(),
                history: Vec::new(),
            },
        );
        Ok(())
    }

    fn load(&self, id: Uuid) -> Result<WorkOrder, StoreError> {
        self.lock()
            .get(&id)
            .map(|record| record.order.clone())
            .ok_or(StoreError::NotFound(id))
    }

    fn list(&self) -> Result<Vec<WorkOrder>, StoreError> {
        Ok(self
            .lock()
            .values()
            .map(|record| record.order.clone())
            .collect())
    }

    fn replace(
        &self,
        order: &WorkOrder,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let record = inner
            .get_mut(&order.id())
            .ok_or_else(|| StoreError::NotFound(order.id()))?;

        if record.order.updated_at() != expected_updated_at {
            return Err(StoreError::Conflict(order.id()));
        }

        record.order = order.clone();
        Ok(())
    }

    fn commit_transition(
        &self,
        order: &WorkOrder,
        entry: &HistoryEntry,
        expected_status: Status,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let record = inner
            .get_mut(&order.id())
            .ok_or_else(|| StoreError::NotFound(order.id()))?;

        if record.order.status() != expected_status {
            return Err(StoreError::Conflict(order.id()));
        }

        record.order = order.clone();
        record.history.push(entry.clone());
        Ok(())
    }

    fn history(&self, id: Uuid) -> Result<Vec<HistoryEntry>, StoreError> {
        self.lock()
            .get(&id)
            .map(|record| record.history.clone())
            .ok_or(StoreError::NotFound(id))
    }

    fn remove(&self, id: Uuid) -> Result<(), StoreError> {
        self.lock()
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}
