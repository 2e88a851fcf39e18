//! The work-order lifecycle service.
//!
//! [`Tracker`] is the one write path for work orders: every mutation is
//! validated, checked against the transition policy where status is
//! involved, and persisted together with its audit record. Reads are
//! filtered by the caller's role before anything else happens.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    domain::{
        Actor, HistoryEntry, OrderDraft, OrderUpdate, Role, Status, ValidationError, WorkOrder,
        policy,
    },
    storage::{Store, StoreError},
};

/// Errors surfaced by [`Tracker`] operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A field failed validation; nothing was persisted.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No visible work order with the given id.
    ///
    /// Also returned when the order exists but the caller's role does not
    /// allow seeing it, so callers cannot probe for ids they may not read.
    #[error("work order {0} not found")]
    NotFound(Uuid),

    /// The transition policy denied the request; nothing was persisted.
    #[error("{role} may not move a work order from {current} to {requested}")]
    Forbidden {
        /// The caller's role.
        role: Role,
        /// The order's status at the time of the request.
        current: Status,
        /// The status the caller asked for.
        requested: Status,
    },

    /// A transition committed but its history entry was not recorded.
    #[error("work order {id} was updated but its history entry was not recorded")]
    Consistency {
        /// The order whose audit trail is now incomplete.
        id: Uuid,
        /// The underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The underlying store failed.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Consistency { id, source } => Self::Consistency { id, source },
            other => Self::Store(other),
        }
    }
}

/// The work-order tracker, generic over its backing [`Store`].
#[derive(Debug)]
pub struct Tracker<S> {
    store: S,
}

impl<S> Tracker<S> {
    /// Construct a tracker over the given store.
    pub const fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: Store> Tracker<S> {
    /// Create a new pending work order on behalf of `actor`.
    ///
    /// Any actor may create orders; the creator is recorded as the
    /// requester regardless of their role. Creation produces no history
    /// entry, the audit trail records status changes only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the title or description is too
    /// short, or a store error if persistence fails.
    pub fn create(&self, draft: OrderDraft, actor: &Actor) -> Result<WorkOrder, Error> {
        let order = WorkOrder::new(draft, actor.id.clone(), Utc::now())?;
        self.store.insert(&order)?;
        tracing::info!(id = %order.id(), requester = %actor.id, "created work order");
        Ok(order)
    }

    /// Fetch a single order, subject to visibility.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the order does not exist or the actor
    /// may not see it.
    pub fn get(&self, id: Uuid, actor: &Actor) -> Result<WorkOrder, Error> {
        let order = self.store.load(id)?;
        if visible(&order, actor) {
            Ok(order)
        } else {
            Err(Error::NotFound(id))
        }
    }

    /// Apply a partial update to an order's detail fields.
    ///
    /// Status is not updatable here; use [`Tracker::transition`]. Retries
    /// on concurrent modification until the update applies cleanly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the order is not visible to the
    /// actor, or [`Error::Validation`] if a replacement field is invalid.
    pub fn update(
        &self,
        id: Uuid,
        update: OrderUpdate,
        actor: &Actor,
    ) -> Result<WorkOrder, Error> {
        loop {
            let mut order = self.get(id, actor)?;
            let expected = order.updated_at();

            order.apply_update(update.clone())?;
            order.touch(Utc::now());

            match self.store.replace(&order, expected) {
                Ok(()) => {
                    tracing::info!(id = %id, "updated work order");
                    return Ok(order);
                }
                Err(StoreError::Conflict(_)) => {
                    tracing::debug!(id = %id, "concurrent update, retrying");
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Request a status transition.
    ///
    /// The policy decides against the order's current status and the
    /// actor's role; a denial changes nothing and is repeatable. An allowed
    /// transition mutates the order, records its side effects, and commits
    /// atomically with a history entry. On a concurrent commit the request
    /// is re-evaluated against the new state rather than blindly retried.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the order is not visible to the
    /// actor, [`Error::Forbidden`] if the policy denies the transition, or
    /// [`Error::Consistency`] if the order committed without its audit
    /// record.
    pub fn transition(
        &self,
        id: Uuid,
        requested: Status,
        note: Option<String>,
        actor: &Actor,
    ) -> Result<WorkOrder, Error> {
        loop {
            let mut order = self.get(id, actor)?;
            let current = order.status();

            if !policy::decide(current, requested, actor.role) {
                return Err(Error::Forbidden {
                    role: actor.role,
                    current,
                    requested,
                });
            }

            let now = Utc::now();
            order.apply_transition(requested, actor, now);
            let entry = HistoryEntry {
                order: id,
                actor: Some(actor.id.clone()),
                previous: current,
                new: requested,
                note: note.clone(),
                created_at: now,
            };

            match self.store.commit_transition(&order, &entry, current) {
                Ok(()) => {
                    tracing::info!(
                        id = %id,
                        from = %current,
                        to = %requested,
                        actor = %actor.id,
                        "work order transitioned",
                    );
                    return Ok(order);
                }
                Err(StoreError::Conflict(_)) => {
                    tracing::debug!(id = %id, "concurrent transition, re-evaluating");
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Every order the actor may see, newest first.
    ///
    /// Requesters see their own orders, approvers and executors see all,
    /// and actors without a recognized role see none.
    ///
    /// # Errors
    ///
    /// Returns a store error if the store cannot be read.
    pub fn list_visible(&self, actor: &Actor) -> Result<Vec<WorkOrder>, Error> {
        let mut orders: Vec<WorkOrder> = match actor.role {
            Role::None => Vec::new(),
            _ => self
                .store
                .list()?
                .into_iter()
                .filter(|order| visible(order, actor))
                .collect(),
        };
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(orders)
    }

    /// Visible orders still awaiting approval, newest first.
    ///
    /// # Errors
    ///
    /// Returns a store error if the store cannot be read.
    pub fn list_pending(&self, actor: &Actor) -> Result<Vec<WorkOrder>, Error> {
        let mut orders = self.list_visible(actor)?;
        orders.retain(|order| order.status() == Status::Pending);
        Ok(orders)
    }

    /// Visible orders the actor requested, newest first.
    ///
    /// For requesters this equals [`Tracker::list_visible`]; for approvers
    /// and executors it narrows the full listing to their own requests.
    ///
    /// # Errors
    ///
    /// Returns a store error if the store cannot be read.
    pub fn list_mine(&self, actor: &Actor) -> Result<Vec<WorkOrder>, Error> {
        let mut orders = self.list_visible(actor)?;
        orders.retain(|order| order.requester() == actor.id);
        Ok(orders)
    }

    /// The order's audit trail in commit order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the order is not visible to the
    /// actor.
    pub fn history(&self, id: Uuid, actor: &Actor) -> Result<Vec<HistoryEntry>, Error> {
        // Visibility first so history is no more discoverable than the
        // order itself.
        self.get(id, actor)?;
        Ok(self.store.history(id)?)
    }

    /// Delete an order and its history.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the order is not visible to the
    /// actor.
    pub fn remove(&self, id: Uuid, actor: &Actor) -> Result<(), Error> {
        self.get(id, actor)?;
        self.store.remove(id)?;
        tracing::info!(id = %id, "removed work order");
        Ok(())
    }
}

/// Whether `actor` may see `order` at all.
fn visible(order: &WorkOrder, actor: &Actor) -> bool {
    match actor.role {
        Role::Requester => order.requester() == actor.id,
        Role::Approver | Role::Executor => true,
        Role::None => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use crate::storage::MemoryStore;

    fn requester() -> Actor {
        Actor::new("r1", Role::Requester)
    }

    fn approver() -> Actor {
        Actor::new("a1", Role::Approver)
    }

    fn executor() -> Actor {
        Actor::new("e1", Role::Executor)
    }

    fn draft(title: &str) -> OrderDraft {
        OrderDraft {
            title: title.to_string(),
            description: "Something is broken and needs fixing".to_string(),
            ..OrderDraft::default()
        }
    }

    fn tracker() -> Tracker<MemoryStore> {
        Tracker::new(MemoryStore::new())
    }

    #[test]
    fn full_lifecycle_pending_to_completed() {
        let tracker = tracker();
        let order = tracker.create(draft("Broken AC"), &requester()).unwrap();
        let id = order.id();

        let order = tracker
            .transition(id, Status::InProgress, None, &approver())
            .unwrap();
        assert_eq!(order.status(), Status::InProgress);
        assert_eq!(order.approver(), Some("a1"));
        assert!(order.approved_at().is_some());

        let order = tracker
            .transition(id, Status::Completed, Some("Replaced the valve".to_string()), &executor())
            .unwrap();
        assert_eq!(order.status(), Status::Completed);
        assert_eq!(order.executor(), Some("e1"));
        assert!(order.completed_at().is_some());

        let history = tracker.history(id, &executor()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].previous, Status::Pending);
        assert_eq!(history[0].new, Status::InProgress);
        assert_eq!(history[1].previous, Status::InProgress);
        assert_eq!(history[1].new, Status::Completed);
        assert_eq!(history[1].note.as_deref(), Some("Replaced the valve"));
    }

    #[test]
    fn create_rejects_short_description_without_persisting() {
        let tracker = tracker();

        let error = tracker
            .create(
                OrderDraft {
                    title: "Broken AC".to_string(),
                    description: "short".to_string(),
                    ..OrderDraft::default()
                },
                &requester(),
            )
            .unwrap_err();

        assert!(matches!(error, Error::Validation(e) if e.field == "description"));
        assert!(tracker.list_visible(&approver()).unwrap().is_empty());
    }

    #[test]
    fn requester_cannot_change_status() {
        let tracker = tracker();
        let id = tracker.create(draft("Broken AC"), &requester()).unwrap().id();

        let error = tracker
            .transition(id, Status::InProgress, None, &requester())
            .unwrap_err();
        assert!(matches!(error, Error::Forbidden { .. }));

        // Nothing changed and no history was written.
        assert_eq!(tracker.get(id, &requester()).unwrap().status(), Status::Pending);
        assert!(tracker.history(id, &requester()).unwrap().is_empty());
    }

    #[test]
    fn executor_cannot_complete_an_unapproved_order() {
        let tracker = tracker();
        let id = tracker.create(draft("Broken AC"), &requester()).unwrap().id();

        let error = tracker
            .transition(id, Status::Completed, None, &executor())
            .unwrap_err();
        assert!(matches!(
            error,
            Error::Forbidden {
                role: Role::Executor,
                current: Status::Pending,
                requested: Status::Completed,
            }
        ));

        let order = tracker.get(id, &executor()).unwrap();
        assert_eq!(order.status(), Status::Pending);
        assert!(order.executor().is_none());
        assert!(order.completed_at().is_none());
    }

    #[test]
    fn executor_may_cancel_a_pending_order() {
        let tracker = tracker();
        let id = tracker.create(draft("Broken AC"), &requester()).unwrap().id();

        let order = tracker
            .transition(id, Status::Cancelled, None, &executor())
            .unwrap();
        assert_eq!(order.status(), Status::Cancelled);
        assert!(order.executor().is_none());
        assert!(order.completed_at().is_none());
    }

    #[test]
    fn denied_transition_is_repeatable() {
        let tracker = tracker();
        let id = tracker.create(draft("Broken AC"), &requester()).unwrap().id();

        for _ in 0..3 {
            let error = tracker
                .transition(id, Status::Completed, None, &executor())
                .unwrap_err();
            assert!(matches!(error, Error::Forbidden { .. }));
        }
        assert!(tracker.history(id, &executor()).unwrap().is_empty());
    }

    #[test]
    fn completed_is_terminal() {
        let tracker = tracker();
        let id = tracker.create(draft("Broken AC"), &requester()).unwrap().id();
        tracker
            .transition(id, Status::InProgress, None, &approver())
            .unwrap();
        tracker
            .transition(id, Status::Completed, None, &executor())
            .unwrap();

        for actor in [approver(), executor()] {
            for requested in [Status::Pending, Status::InProgress, Status::Cancelled] {
                assert!(matches!(
                    tracker.transition(id, requested, None, &actor),
                    Err(Error::Forbidden { .. })
                ));
            }
        }
    }

    #[test]
    fn requesters_see_only_their_own_orders() {
        let tracker = tracker();
        let mine = tracker.create(draft("Broken AC"), &requester()).unwrap();
        let theirs = tracker
            .create(draft("Flickering lights"), &Actor::new("r2", Role::Requester))
            .unwrap();

        let visible = tracker.list_visible(&requester()).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id(), mine.id());

        // Access by id is indistinguishable from the order not existing.
        assert!(matches!(
            tracker.get(theirs.id(), &requester()),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            tracker.history(theirs.id(), &requester()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn approvers_and_executors_see_everything() {
        let tracker = tracker();
        tracker.create(draft("Broken AC"), &requester()).unwrap();
        tracker
            .create(draft("Flickering lights"), &Actor::new("r2", Role::Requester))
            .unwrap();

        assert_eq!(tracker.list_visible(&approver()).unwrap().len(), 2);
        assert_eq!(tracker.list_visible(&executor()).unwrap().len(), 2);
    }

    #[test]
    fn unrecognized_roles_see_nothing() {
        let tracker = tracker();
        let id = tracker.create(draft("Broken AC"), &requester()).unwrap().id();
        let stranger = Actor::new("s1", Role::None);

        assert!(tracker.list_visible(&stranger).unwrap().is_empty());
        assert!(matches!(
            tracker.get(id, &stranger),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn listings_are_newest_first() {
        let tracker = tracker();
        let first = tracker.create(draft("First order"), &requester()).unwrap();
        let second = tracker.create(draft("Second order"), &requester()).unwrap();

        // Force distinct creation instants regardless of clock resolution.
        let store = MemoryStore::new();
        let mut older = first.clone();
        older.created_at = second.created_at() - Duration::seconds(10);
        older.updated_at = older.created_at;
        store.insert(&older).unwrap();
        store.insert(&second).unwrap();
        let tracker = Tracker::new(store);

        let visible = tracker.list_visible(&requester()).unwrap();
        assert_eq!(visible[0].id(), second.id());
        assert_eq!(visible[1].id(), older.id());
    }

    #[test]
    fn pending_listing_filters_by_status() {
        let tracker = tracker();
        let open = tracker.create(draft("Broken AC"), &requester()).unwrap();
        let approved = tracker.create(draft("Flickering lights"), &requester()).unwrap();
        tracker
            .transition(approved.id(), Status::InProgress, None, &approver())
            .unwrap();

        let pending = tracker.list_pending(&approver()).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id(), open.id());
    }

    #[test]
    fn mine_listing_narrows_to_own_requests() {
        let tracker = tracker();
        tracker.create(draft("Broken AC"), &requester()).unwrap();
        let own = tracker.create(draft("Approver's own order"), &approver()).unwrap();

        let mine = tracker.list_mine(&approver()).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id(), own.id());
    }

    #[test]
    fn update_rejects_invalid_fields_without_mutating() {
        let tracker = tracker();
        let id = tracker.create(draft("Broken AC"), &requester()).unwrap().id();

        let error = tracker
            .update(
                id,
                OrderUpdate {
                    description: Some("short".to_string()),
                    ..OrderUpdate::default()
                },
                &requester(),
            )
            .unwrap_err();
        assert!(matches!(error, Error::Validation(_)));
        assert_eq!(tracker.get(id, &requester()).unwrap().title(), "Broken AC");
    }

    #[test]
    fn update_advances_updated_at() {
        let tracker = tracker();
        let order = tracker.create(draft("Broken AC"), &requester()).unwrap();

        let updated = tracker
            .update(
                order.id(),
                OrderUpdate {
                    priority: Some(crate::domain::Priority::High),
                    ..OrderUpdate::default()
                },
                &requester(),
            )
            .unwrap();

        assert_eq!(updated.priority(), crate::domain::Priority::High);
        assert!(updated.updated_at() >= order.updated_at());
        assert_eq!(updated.created_at(), order.created_at());
    }

    #[test]
    fn remove_is_visibility_checked() {
        let tracker = tracker();
        let theirs = tracker
            .create(draft("Broken AC"), &Actor::new("r2", Role::Requester))
            .unwrap();

        assert!(matches!(
            tracker.remove(theirs.id(), &requester()),
            Err(Error::NotFound(_))
        ));
        tracker.remove(theirs.id(), &approver()).unwrap();
        assert!(matches!(
            tracker.get(theirs.id(), &approver()),
            Err(Error::NotFound(_))
        ));
    }

    /// Delegates to a [`MemoryStore`] but reports a conflict on the first
    /// transition commit, as if another process won the race.
    struct ConflictOnce {
        inner: MemoryStore,
        conflicted: std::sync::atomic::AtomicBool,
    }

    impl Store for ConflictOnce {
        fn insert(&self, order: &WorkOrder) -> Result<(), StoreError> {
            self.inner.insert(order)
        }

        fn load(&self, id: Uuid) -> Result<WorkOrder, StoreError> {
            self.inner.load(id)
        }

        fn list(&self) -> Result<Vec<WorkOrder>, StoreError> {
            self.inner.list()
        }

        fn replace(
            &self,
            order: &WorkOrder,
            expected_updated_at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            self.inner.replace(order, expected_updated_at)
        }

        fn commit_transition(
            &self,
            order: &WorkOrder,
            entry: &HistoryEntry,
            expected_status: Status,
        ) -> Result<(), StoreError> {
            if !self
                .conflicted
                .swap(true, std::sync::atomic::Ordering::SeqCst)
            {
                return Err(StoreError::Conflict(order.id()));
            }
            self.inner.commit_transition(order, entry, expected_status)
        }

        fn history(&self, id: Uuid) -> Result<Vec<HistoryEntry>, StoreError> {
            self.inner.history(id)
        }

        fn remove(&self, id: Uuid) -> Result<(), StoreError> {
            self.inner.remove(id)
        }
    }

    #[test]
    fn transition_retries_after_a_conflicted_commit() {
        let tracker = Tracker::new(ConflictOnce {
            inner: MemoryStore::new(),
            conflicted: std::sync::atomic::AtomicBool::new(false),
        });
        let id = tracker.create(draft("Broken AC"), &requester()).unwrap().id();

        let order = tracker
            .transition(id, Status::InProgress, None, &approver())
            .unwrap();
        assert_eq!(order.status(), Status::InProgress);
        assert_eq!(tracker.history(id, &approver()).unwrap().len(), 1);
    }

    /// Delegates to a [`MemoryStore`] but fails every history append.
    struct BrokenHistory {
        inner: MemoryStore,
    }

    impl Store for BrokenHistory {
        fn insert(&self, order: &WorkOrder) -> Result<(), StoreError> {
            self.inner.insert(order)
        }

        fn load(&self, id: Uuid) -> Result<WorkOrder, StoreError> {
            self.inner.load(id)
        }

        fn list(&self) -> Result<Vec<WorkOrder>, StoreError> {
            self.inner.list()
        }

        fn replace(
            &self,
            order: &WorkOrder,
            expected_updated_at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            self.inner.replace(order, expected_updated_at)
        }

        fn commit_transition(
            &self,
            order: &WorkOrder,
            _entry: &HistoryEntry,
            _expected_status: Status,
        ) -> Result<(), StoreError> {
            // The order write lands, the history append does not.
            self.inner
                .replace(order, self.inner.load(order.id())?.updated_at())?;
            Err(StoreError::Consistency {
                id: order.id(),
                source: std::io::Error::other("disk full"),
            })
        }

        fn history(&self, id: Uuid) -> Result<Vec<HistoryEntry>, StoreError> {
            self.inner.history(id)
        }

        fn remove(&self, id: Uuid) -> Result<(), StoreError> {
            self.inner.remove(id)
        }
    }

    #[test]
    fn consistency_fault_propagates_without_retry() {
        let tracker = Tracker::new(BrokenHistory {
            inner: MemoryStore::new(),
        });
        let id = tracker.create(draft("Broken AC"), &requester()).unwrap().id();

        let error = tracker
            .transition(id, Status::InProgress, None, &approver())
            .unwrap_err();
        assert!(matches!(error, Error::Consistency { id: e, .. } if e == id));

        // The status change itself landed.
        assert_eq!(
            tracker.get(id, &approver()).unwrap().status(),
            Status::InProgress
        );
    }
}
