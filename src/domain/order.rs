use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Actor;

/// Minimum number of non-whitespace-trimmed characters in a title.
const MIN_TITLE_CHARS: usize = 5;
/// Minimum number of non-whitespace-trimmed characters in a description.
const MIN_DESCRIPTION_CHARS: usize = 10;

/// Urgency of a work order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Needs attention as soon as possible.
    High,
    /// The default urgency.
    #[default]
    Medium,
    /// Can wait.
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        })
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(ParseEnumError {
                what: "priority",
                value: other.to_string(),
                expected: "high, medium, low",
            }),
        }
    }
}

/// Lifecycle state of a work order.
///
/// Only the lifecycle service changes this field; every change goes through
/// the transition policy and produces a history entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Submitted, awaiting approval.
    #[default]
    Pending,
    /// Approved and being worked on.
    InProgress,
    /// Work finished.
    Completed,
    /// Withdrawn without completion.
    Cancelled,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        })
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ParseEnumError {
                what: "status",
                value: other.to_string(),
                expected: "pending, in_progress, completed, cancelled",
            }),
        }
    }
}

/// Error returned when a status or priority string is not recognized.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown {what} '{value}': expected one of {expected}")]
pub struct ParseEnumError {
    what: &'static str,
    value: String,
    expected: &'static str,
}

/// A field-level validation failure.
///
/// Carries the name of the offending field so callers can surface it next to
/// the input that caused it.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Name of the field that failed validation.
    pub field: &'static str,
    /// Human-readable description of the failure.
    pub message: String,
}

/// Caller-supplied fields for creating a work order.
#[derive(Debug, Clone, Default)]
pub struct OrderDraft {
    /// Short summary of the problem.
    pub title: String,
    /// Detailed description of the problem or need.
    pub description: String,
    /// Urgency; defaults to medium.
    pub priority: Priority,
    /// Where the maintenance is needed.
    pub location: Option<String>,
    /// Additional free-form notes.
    pub notes: Option<String>,
    /// Opaque reference to externally stored attachment content.
    pub attachment: Option<String>,
}

/// A partial update to a work order's details.
///
/// `None` fields are left untouched. Status is deliberately absent: status
/// only changes through [`crate::Tracker::transition`].
#[derive(Debug, Clone, Default)]
pub struct OrderUpdate {
    /// Replacement title, if any.
    pub title: Option<String>,
    /// Replacement description, if any.
    pub description: Option<String>,
    /// Replacement priority, if any.
    pub priority: Option<Priority>,
    /// Replacement location, if any (`Some(None)` clears it).
    pub location: Option<Option<String>>,
    /// Replacement notes, if any (`Some(None)` clears them).
    pub notes: Option<Option<String>>,
    /// Replacement attachment reference, if any (`Some(None)` clears it).
    pub attachment: Option<Option<String>>,
}

/// A maintenance work order.
///
/// Submitted by a requester, approved into progress by an approver, and
/// closed out by an executor. Title and description length constraints hold
/// at creation and at every subsequent mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkOrder {
    /// Globally unique, perpetually stable identifier.
    pub(crate) id: Uuid,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) priority: Priority,
    pub(crate) status: Status,
    pub(crate) location: Option<String>,
    pub(crate) notes: Option<String>,
    pub(crate) attachment: Option<String>,
    /// Identity of the creator; immutable after creation.
    pub(crate) requester: String,
    pub(crate) approver: Option<String>,
    pub(crate) executor: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) approved_at: Option<DateTime<Utc>>,
    pub(crate) completed_at: Option<DateTime<Utc>>,
}

impl WorkOrder {
    /// Construct a new pending [`WorkOrder`] from a draft.
    ///
    /// A new UUID is generated and `created_at`/`updated_at` are set to the
    /// given instant.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the offending field if the title
    /// or description is too short.
    pub(crate) fn new(
        draft: OrderDraft,
        requester: String,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        validate_title(&draft.title)?;
        validate_description(&draft.description)?;

        Ok(Self {
            id: Uuid::new_v4(),
            title: draft.title,
            description: draft.description,
            priority: draft.priority,
            status: Status::Pending,
            location: draft.location,
            notes: draft.notes,
            attachment: draft.attachment,
            requester,
            approver: None,
            executor: None,
            created_at: now,
            updated_at: now,
            approved_at: None,
            completed_at: None,
        })
    }

    /// The unique, stable identifier of this work order.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Short summary of the problem.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Detailed description of the problem or need.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Urgency of the order.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Where the maintenance is needed, if recorded.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Additional notes, if recorded.
    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Opaque attachment reference, if recorded.
    #[must_use]
    pub fn attachment(&self) -> Option<&str> {
        self.attachment.as_deref()
    }

    /// Identity of the user that created the order.
    #[must_use]
    pub fn requester(&self) -> &str {
        &self.requester
    }

    /// Identity of the user that approved the order, once set.
    #[must_use]
    pub fn approver(&self) -> Option<&str> {
        self.approver.as_deref()
    }

    /// Identity of the user that closed the order out, once set.
    #[must_use]
    pub fn executor(&self) -> Option<&str> {
        self.executor.as_deref()
    }

    /// When the order was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the order was last mutated.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// When the order was approved, once set.
    #[must_use]
    pub const fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    /// When the order was completed, once set.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Replace the title.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the new title is too short.
    pub(crate) fn set_title(&mut self, title: String) -> Result<(), ValidationError> {
        validate_title(&title)?;
        self.title = title;
        Ok(())
    }

    /// Replace the description.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the new description is too short.
    pub(crate) fn set_description(&mut self, description: String) -> Result<(), ValidationError> {
        validate_description(&description)?;
        self.description = description;
        Ok(())
    }

    /// Apply a partial update to the detail fields.
    ///
    /// Validates before mutating: a failing update leaves the order entirely
    /// unchanged.
    pub(crate) fn apply_update(&mut self, update: OrderUpdate) -> Result<(), ValidationError> {
        if let Some(title) = &update.title {
            validate_title(title)?;
        }
        if let Some(description) = &update.description {
            validate_description(description)?;
        }

        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(location) = update.location {
            self.location = location;
        }
        if let Some(notes) = update.notes {
            self.notes = notes;
        }
        if let Some(attachment) = update.attachment {
            self.attachment = attachment;
        }
        Ok(())
    }

    /// Apply a status transition and its side effects.
    ///
    /// The caller is responsible for having consulted the transition policy;
    /// this method only performs the mutation:
    ///
    /// - into `in_progress` with `approved_at` unset: records the approval
    ///   instant and the approver
    /// - into `completed`: records the completion instant and the executor
    /// - into `cancelled`: the status change alone
    ///
    /// `updated_at` is always advanced to `now`.
    pub(crate) fn apply_transition(&mut self, requested: Status, actor: &Actor, now: DateTime<Utc>) {
        self.status = requested;

        match requested {
            Status::InProgress if self.approved_at.is_none() => {
                self.approved_at = Some(now);
                self.approver = Some(actor.id.clone());
            }
            Status::Completed => {
                self.completed_at = Some(now);
                self.executor = Some(actor.id.clone());
            }
            _ => {}
        }

        self.updated_at = now;
    }

    /// Advance `updated_at` after a detail mutation.
    pub(crate) const fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().chars().count() < MIN_TITLE_CHARS {
        return Err(ValidationError {
            field: "title",
            message: format!("must be at least {MIN_TITLE_CHARS} characters"),
        });
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), ValidationError> {
    if description.trim().chars().count() < MIN_DESCRIPTION_CHARS {
        return Err(ValidationError {
            field: "description",
            message: format!("must be at least {MIN_DESCRIPTION_CHARS} characters"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    fn draft(title: &str, description: &str) -> OrderDraft {
        OrderDraft {
            title: title.to_string(),
            description: description.to_string(),
            ..OrderDraft::default()
        }
    }

    #[test]
    fn new_order_is_pending_with_defaults() {
        let order = WorkOrder::new(
            draft("Broken AC", "The AC unit in room 4 is leaking water"),
            "r1".to_string(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(order.status(), Status::Pending);
        assert_eq!(order.priority(), Priority::Medium);
        assert_eq!(order.requester(), "r1");
        assert!(order.approver().is_none());
        assert!(order.executor().is_none());
        assert!(order.approved_at().is_none());
        assert!(order.completed_at().is_none());
        assert_eq!(order.created_at(), order.updated_at());
    }

    #[test]
    fn short_description_is_rejected() {
        let error = WorkOrder::new(draft("Valid title", "short"), "r1".to_string(), Utc::now())
            .unwrap_err();
        assert_eq!(error.field, "description");
    }

    #[test]
    fn short_title_is_rejected() {
        let error = WorkOrder::new(
            draft("AC", "The AC unit in room 4 is leaking water"),
            "r1".to_string(),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(error.field, "title");
    }

    #[test]
    fn whitespace_does_not_count_towards_minimums() {
        // 10 characters, but only 5 after trimming.
        let error = WorkOrder::new(
            draft("Valid title", "  short   "),
            "r1".to_string(),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(error.field, "description");
    }

    #[test]
    fn update_validates_before_mutating() {
        let mut order = WorkOrder::new(
            draft("Broken AC", "The AC unit in room 4 is leaking water"),
            "r1".to_string(),
            Utc::now(),
        )
        .unwrap();

        let result = order.apply_update(OrderUpdate {
            title: Some("New title here".to_string()),
            description: Some("short".to_string()),
            ..OrderUpdate::default()
        });

        assert!(result.is_err());
        // The valid title must not have been applied either.
        assert_eq!(order.title(), "Broken AC");
    }

    #[test]
    fn update_can_clear_optional_fields() {
        let mut order = WorkOrder::new(
            OrderDraft {
                location: Some("Room 4".to_string()),
                ..draft("Broken AC", "The AC unit in room 4 is leaking water")
            },
            "r1".to_string(),
            Utc::now(),
        )
        .unwrap();

        order
            .apply_update(OrderUpdate {
                location: Some(None),
                ..OrderUpdate::default()
            })
            .unwrap();

        assert!(order.location().is_none());
    }

    #[test]
    fn transition_into_progress_records_approval_once() {
        let mut order = WorkOrder::new(
            draft("Broken AC", "The AC unit in room 4 is leaking water"),
            "r1".to_string(),
            Utc::now(),
        )
        .unwrap();
        let approver = Actor::new("a1", Role::Approver);

        let first = Utc::now();
        order.apply_transition(Status::InProgress, &approver, first);
        assert_eq!(order.approved_at(), Some(first));
        assert_eq!(order.approver(), Some("a1"));

        // A later transition into in_progress must not overwrite the approval.
        let later = Utc::now();
        order.apply_transition(Status::InProgress, &Actor::new("a2", Role::Approver), later);
        assert_eq!(order.approved_at(), Some(first));
        assert_eq!(order.approver(), Some("a1"));
    }

    #[test]
    fn cancellation_sets_no_actor_or_timestamp() {
        let mut order = WorkOrder::new(
            draft("Broken AC", "The AC unit in room 4 is leaking water"),
            "r1".to_string(),
            Utc::now(),
        )
        .unwrap();

        order.apply_transition(Status::Cancelled, &Actor::new("e1", Role::Executor), Utc::now());

        assert_eq!(order.status(), Status::Cancelled);
        assert!(order.executor().is_none());
        assert!(order.completed_at().is_none());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            Status::Pending,
            Status::InProgress,
            Status::Completed,
            Status::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<Status>().unwrap(), status);
        }
        assert!("done".parse::<Status>().is_err());
    }

    #[test]
    fn priority_round_trips_through_strings() {
        for priority in [Priority::High, Priority::Medium, Priority::Low] {
            assert_eq!(priority.to_string().parse::<Priority>().unwrap(), priority);
        }
        assert!("urgent".parse::<Priority>().is_err());
    }
}
