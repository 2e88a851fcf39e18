use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Priority, Status, WorkOrder};

/// The on-disk form of a [`WorkOrder`].
///
/// Tagged with a `_version` field so the stored format can evolve without
/// breaking existing stores. Stored documents are trusted: validation runs
/// when orders are created and mutated, not when they are read back.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
pub(super) enum OrderDocument {
    #[serde(rename = "1")]
    V1 {
        id: Uuid,
        title: String,
        description: String,
        priority: Priority,
        status: Status,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attachment: Option<String>,
        requester: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        approver: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        executor: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        approved_at: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        completed_at: Option<DateTime<Utc>>,
    },
}

impl From<&WorkOrder> for OrderDocument {
    fn from(order: &WorkOrder) -> Self {
        Self::V1 {
            id: order.id,
            title: order.title.clone(),
            description: order.description.clone(),
            priority: order.priority,
            status: order.status,
            location: order.location.clone(),
            notes: order.notes.clone(),
            attachment: order.attachment.clone(),
            requester: order.requester.clone(),
            approver: order.approver.clone(),
            executor: order.executor.clone(),
            created_at: order.created_at,
            updated_at: order.updated_at,
            approved_at: order.approved_at,
            completed_at: order.completed_at,
        }
    }
}

impl From<OrderDocument> for WorkOrder {
    fn from(document: OrderDocument) -> Self {
        match document {
            OrderDocument::V1 {
                id,
                title,
                description,
                priority,
                status,
                location,
                notes,
                attachment,
                requester,
                approver,
                executor,
                created_at,
                updated_at,
                approved_at,
                completed_at,
            } => Self {
                id,
                title,
                description,
                priority,
                status,
                location,
                notes,
                attachment,
                requester,
                approver,
                executor,
                created_at,
                updated_at,
                approved_at,
                completed_at,
            },
        }
    }
}
