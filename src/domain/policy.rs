//! The transition decision table.
//!
//! All role/state logic lives in this one pure function so it can be tested
//! exhaustively in isolation. Everything not explicitly allowed is denied.

use crate::domain::{Role, Status};

/// Decide whether `role` may move a work order from `current` to `requested`.
///
/// The table:
///
/// | role     | current                | requested            |
/// |----------|------------------------|----------------------|
/// | approver | pending                | `in_progress`        |
/// | executor | `in_progress`          | completed, cancelled |
/// | executor | pending                | cancelled            |
///
/// Requesters and users without a recognized role may not change status at
/// all. Completion always requires prior approval: an executor cannot close
/// out an order that was never moved into progress, though they may still
/// cancel a pending one.
#[must_use]
pub const fn decide(current: Status, requested: Status, role: Role) -> bool {
    match role {
        Role::Approver => {
            matches!((current, requested), (Status::Pending, Status::InProgress))
        }
        Role::Executor => matches!(
            (current, requested),
            (Status::InProgress, Status::Completed | Status::Cancelled)
                | (Status::Pending, Status::Cancelled)
        ),
        Role::Requester | Role::None => false,
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    const ALL_STATUSES: [Status; 4] = [
        Status::Pending,
        Status::InProgress,
        Status::Completed,
        Status::Cancelled,
    ];

    #[test_case(Status::Pending, Status::InProgress, Role::Approver; "approver approves pending")]
    #[test_case(Status::InProgress, Status::Completed, Role::Executor; "executor completes approved")]
    #[test_case(Status::InProgress, Status::Cancelled, Role::Executor; "executor cancels approved")]
    #[test_case(Status::Pending, Status::Cancelled, Role::Executor; "executor cancels pending")]
    fn allowed(current: Status, requested: Status, role: Role) {
        assert!(decide(current, requested, role));
    }

    #[test_case(Status::Pending, Status::Completed, Role::Executor; "executor cannot skip approval")]
    #[test_case(Status::InProgress, Status::InProgress, Role::Approver; "approver cannot re-approve")]
    #[test_case(Status::Completed, Status::InProgress, Role::Approver; "completed is terminal for approver")]
    #[test_case(Status::Completed, Status::Cancelled, Role::Executor; "completed is terminal for executor")]
    #[test_case(Status::Cancelled, Status::InProgress, Role::Approver; "cancelled is terminal")]
    #[test_case(Status::Pending, Status::InProgress, Role::Executor; "executor cannot approve")]
    #[test_case(Status::InProgress, Status::Completed, Role::Approver; "approver cannot complete")]
    fn denied(current: Status, requested: Status, role: Role) {
        assert!(!decide(current, requested, role));
    }

    #[test]
    fn requesters_and_unknown_roles_are_always_denied() {
        for current in ALL_STATUSES {
            for requested in ALL_STATUSES {
                assert!(!decide(current, requested, Role::Requester));
                assert!(!decide(current, requested, Role::None));
            }
        }
    }

    /// Every triple outside the decision table is denied.
    #[test]
    fn exhaustive_matrix_matches_table() {
        let allowed = [
            (Status::Pending, Status::InProgress, Role::Approver),
            (Status::InProgress, Status::Completed, Role::Executor),
            (Status::InProgress, Status::Cancelled, Role::Executor),
            (Status::Pending, Status::Cancelled, Role::Executor),
        ];

        for current in ALL_STATUSES {
            for requested in ALL_STATUSES {
                for role in [Role::Requester, Role::Approver, Role::Executor, Role::None] {
                    let expected = allowed.contains(&(current, requested, role));
                    assert_eq!(
                        decide(current, requested, role),
                        expected,
                        "({current}, {requested}, {role})"
                    );
                }
            }
        }
    }
}
