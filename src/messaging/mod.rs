// ============================================================================
// Workflow Notifications
// ============================================================================
//
// Published after a transition is committed. Delivery is best-effort: a sink
// failure never rolls back or fails the transition that produced it.
//
// ============================================================================

mod redpanda;

pub use redpanda::RedpandaNotificationSink;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::travel_order::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// The order reached a level; the recipient is that level's approver
    AwaitingApproval,
    Completed,
    Rejected,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::AwaitingApproval => "awaiting_approval",
            NotificationKind::Completed => "completed",
            NotificationKind::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNotification {
    pub order_id: Uuid,
    pub kind: NotificationKind,
    pub status: OrderStatus,
    /// Employee whose action caused the transition
    pub triggered_by: Uuid,
    pub recipients: Vec<Uuid>,
    pub travel_order_number: Option<String>,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, notification: &WorkflowNotification) -> anyhow::Result<()>;
}

/// Writes each notification to the log
#[derive(Debug, Default)]
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn publish(&self, notification: &WorkflowNotification) -> anyhow::Result<()> {
        tracing::info!(
            order_id = %notification.order_id,
            kind = notification.kind.as_str(),
            status = %notification.status,
            recipients = ?notification.recipients,
            "Workflow notification"
        );
        Ok(())
    }
}

/// Keeps everything published in memory; used by tests and the demo binary
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    published: Mutex<Vec<WorkflowNotification>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<WorkflowNotification> {
        self.published.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.published.lock().await.clear();
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn publish(&self, notification: &WorkflowNotification) -> anyhow::Result<()> {
        self.published.lock().await.push(notification.clone());
        Ok(())
    }
}
