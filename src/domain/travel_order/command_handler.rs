use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::approval_chain::{ApprovalChainBuilder, ApproverRoster};
use crate::domain::errors::WorkflowError;
use crate::domain::hierarchy::HierarchyTable;
use crate::event_sourcing::core::{Aggregate, EventEnvelope};
use crate::event_sourcing::store::{load_aggregate, EventStore, StoreError};
use crate::messaging::{LoggingNotificationSink, NotificationKind, NotificationSink, WorkflowNotification};
use crate::metrics::WorkflowMetrics;

use super::aggregate::TravelOrderAggregate;
use super::commands::TravelOrderCommand;
use super::events::{OrderNumberAssigned, TravelOrderEvent};
use super::numbering::{MonthlySequenceAllocator, OrderNumberAllocator};
use super::resubmission::ResubmissionHandler;
use super::value_objects::{
    DecisionRequest, OrderAmendment, OrderStatus, Submitter, TravelDetails, WorkflowPolicy,
};

// ============================================================================
// Travel Order Command Handler
// ============================================================================
//
// Orchestrates: load → Aggregate::handle_command → events → append
//
// Every append names the version the decision was computed against, so two
// racing callers cannot both commit. The loser gets StaleState and must
// reload. Notifications go out only after the append succeeds.
//
// ============================================================================

/// Everything needed to open a new draft
#[derive(Debug, Clone)]
pub struct DraftRequest {
    pub submitter: Submitter,
    pub details: TravelDetails,
    /// Explicit approver per level index; unlisted levels take the default pick
    pub approver_overrides: BTreeMap<usize, Uuid>,
}

impl DraftRequest {
    pub fn new(submitter: Submitter, details: TravelDetails) -> Self {
        Self {
            submitter,
            details,
            approver_overrides: BTreeMap::new(),
        }
    }

    pub fn with_override(mut self, level: usize, approver_id: Uuid) -> Self {
        self.approver_overrides.insert(level, approver_id);
        self
    }
}

pub struct TravelOrderCommandHandler {
    event_store: Arc<dyn EventStore<TravelOrderEvent>>,
    hierarchy: Arc<HierarchyTable>,
    roster: Arc<dyn ApproverRoster>,
    numbers: Arc<dyn OrderNumberAllocator>,
    notifications: Arc<dyn NotificationSink>,
    metrics: Option<Arc<WorkflowMetrics>>,
    policy: WorkflowPolicy,
}

impl TravelOrderCommandHandler {
    pub fn new(
        event_store: Arc<dyn EventStore<TravelOrderEvent>>,
        hierarchy: Arc<HierarchyTable>,
        roster: Arc<dyn ApproverRoster>,
    ) -> Self {
        Self {
            numbers: Arc::new(MonthlySequenceAllocator::new("R1", event_store.clone())),
            event_store,
            hierarchy,
            roster,
            notifications: Arc::new(LoggingNotificationSink),
            metrics: None,
            policy: WorkflowPolicy::default(),
        }
    }

    pub fn with_numbering(mut self, numbers: Arc<dyn OrderNumberAllocator>) -> Self {
        self.numbers = numbers;
        self
    }

    pub fn with_notifications(mut self, notifications: Arc<dyn NotificationSink>) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<WorkflowMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Policy frozen onto orders drafted from now on
    pub fn with_policy(mut self, policy: WorkflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Resolve and bind the submitter's chain, then persist a new draft
    pub async fn create_draft(&self, request: DraftRequest) -> Result<TravelOrderAggregate, WorkflowError> {
        self.instrumented("create_draft", self.create_draft_inner(request)).await
    }

    /// Re-bind one level of a draft to another candidate from its snapshot
    pub async fn reassign_approver(
        &self,
        order_id: Uuid,
        level: usize,
        approver_id: Uuid,
    ) -> Result<TravelOrderAggregate, WorkflowError> {
        self.instrumented(
            "reassign_approver",
            self.execute(order_id, |_| Ok(TravelOrderCommand::ReassignApprover { level, approver_id })),
        )
        .await
    }

    pub async fn submit(&self, order_id: Uuid) -> Result<TravelOrderAggregate, WorkflowError> {
        self.instrumented("submit", self.execute(order_id, |_| Ok(TravelOrderCommand::Submit)))
            .await
    }

    pub async fn decide(
        &self,
        order_id: Uuid,
        request: DecisionRequest,
    ) -> Result<TravelOrderAggregate, WorkflowError> {
        self.instrumented("decide", self.execute(order_id, |_| Ok(TravelOrderCommand::Decide(request))))
            .await
    }

    /// Send a rejected order back to level 0 in a new round
    pub async fn resubmit(
        &self,
        order_id: Uuid,
        amendment: OrderAmendment,
    ) -> Result<TravelOrderAggregate, WorkflowError> {
        let planner = ResubmissionHandler::new(&self.hierarchy, self.roster.as_ref());
        self.instrumented(
            "resubmit",
            self.execute(order_id, |order| {
                planner.plan(order, &amendment).map(TravelOrderCommand::Resubmit)
            }),
        )
        .await
    }

    /// Current state of an order, rebuilt from its events
    pub async fn load(&self, order_id: Uuid) -> Result<TravelOrderAggregate, WorkflowError> {
        load_aggregate::<TravelOrderAggregate>(self.event_store.as_ref(), order_id)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?
            .ok_or(WorkflowError::OrderNotFound(order_id))
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn create_draft_inner(&self, request: DraftRequest) -> Result<TravelOrderAggregate, WorkflowError> {
        let levels = self.hierarchy.resolve_chain(&request.submitter.unit)?;
        let chain = ApprovalChainBuilder::new(self.roster.as_ref())
            .build_with_overrides(&levels, &request.approver_overrides)?;

        let order_id = Uuid::now_v7();
        let events = TravelOrderAggregate::draft(&request.submitter, request.details, chain, self.policy)?;
        let first = events.first().ok_or(WorkflowError::NotInitialized)?;
        let mut order = TravelOrderAggregate::apply_first_event(order_id, first)?;

        let version = self.append(order_id, 0, events, request.submitter.employee_id).await?;
        order.set_version(version);

        tracing::info!(
            order_id = %order_id,
            submitter = %order.submitter.employee_id,
            unit = %order.submitter.unit,
            levels = order.chain.len(),
            "Drafted travel order"
        );
        Ok(order)
    }

    async fn execute<F>(&self, order_id: Uuid, command_for: F) -> Result<TravelOrderAggregate, WorkflowError>
    where
        F: FnOnce(&TravelOrderAggregate) -> Result<TravelOrderCommand, WorkflowError>,
    {
        let before = self.load(order_id).await?;
        let command = command_for(&before)?;
        let actor = match &command {
            TravelOrderCommand::Decide(request) => request.approver_id,
            _ => before.submitter.employee_id,
        };

        let mut events = before.handle_command(&command)?;
        let mut after = before.clone();
        for event in &events {
            after.apply_event(event)?;
        }

        // Numbering rides in the same append as the completing decision
        if after.status == OrderStatus::Completed && before.status != OrderStatus::Completed {
            let completed_at = after.completed_at.unwrap_or_else(Utc::now);
            let number = self
                .numbers
                .next_number(completed_at)
                .await
                .map_err(|e| WorkflowError::Storage(format!("order number allocation failed: {}", e)))?;
            let event = TravelOrderEvent::OrderNumberAssigned(OrderNumberAssigned {
                travel_order_number: number,
                assigned_at: completed_at,
            });
            after.apply_event(&event)?;
            events.push(event);
        }

        let version = self.append(order_id, before.version(), events, actor).await?;
        after.set_version(version);

        tracing::info!(
            order_id = %order_id,
            command = command.name(),
            from = %before.status,
            to = %after.status,
            round = after.round,
            version = version,
            "Travel order transition committed"
        );

        self.observe_transition(&before, &after);
        self.notify(&before, &after, actor).await;

        Ok(after)
    }

    async fn append(
        &self,
        order_id: Uuid,
        expected_version: i64,
        events: Vec<TravelOrderEvent>,
        actor: Uuid,
    ) -> Result<i64, WorkflowError> {
        let correlation_id = Uuid::now_v7();
        let envelopes = events
            .into_iter()
            .enumerate()
            .map(|(i, event)| {
                EventEnvelope::new(order_id, expected_version + i as i64 + 1, event, correlation_id)
                    .with_user(Some(actor))
            })
            .collect();

        self.event_store
            .append_events(order_id, expected_version, envelopes)
            .await
            .map_err(|e| match e {
                StoreError::ConcurrencyConflict { expected, actual } => WorkflowError::StaleState(format!(
                    "order {} changed concurrently (expected version {}, found {})",
                    order_id, expected, actual
                )),
                other => WorkflowError::Storage(other.to_string()),
            })
    }

    async fn instrumented<T>(
        &self,
        command: &'static str,
        operation: impl Future<Output = Result<T, WorkflowError>>,
    ) -> Result<T, WorkflowError> {
        let started = Instant::now();
        let result = operation.await;

        if let Err(e) = &result {
            match e {
                WorkflowError::Storage(_) => tracing::error!(command, error = %e, "Workflow command failed"),
                _ => tracing::debug!(command, error = %e, "Workflow command refused"),
            }
        }

        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(_) => "ok",
                Err(e) => e.kind().as_str(),
            };
            metrics.record_command(command, outcome, started.elapsed().as_secs_f64());
            if matches!(&result, Err(e) if e.is_stale_state()) {
                metrics.record_stale_state();
            }
        }

        result
    }

    fn observe_transition(&self, before: &TravelOrderAggregate, after: &TravelOrderAggregate) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        for decision in after.decisions.iter().skip(before.decisions.len()) {
            metrics.record_decision(decision.verdict.as_str());
        }
        if after.status.is_terminal() && after.status != before.status {
            metrics.record_terminal(after.status.label());
        }
    }

    async fn notify(&self, before: &TravelOrderAggregate, after: &TravelOrderAggregate, actor: Uuid) {
        for notification in transition_notifications(before, after, actor) {
            if let Err(e) = self.notifications.publish(&notification).await {
                tracing::warn!(
                    order_id = %notification.order_id,
                    kind = notification.kind.as_str(),
                    error = %e,
                    "Failed to deliver workflow notification"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_notification_failure();
                }
            }
        }
    }
}

/// Notifications owed for the move from `before` to `after`
fn transition_notifications(
    before: &TravelOrderAggregate,
    after: &TravelOrderAggregate,
    triggered_by: Uuid,
) -> Vec<WorkflowNotification> {
    let moved = before.status != after.status || before.round != after.round;
    if !moved {
        return Vec::new();
    }

    let (kind, recipients, comment) = match after.status {
        OrderStatus::PendingApproval { .. } => match after.current_approver() {
            Some(approver) => (NotificationKind::AwaitingApproval, vec![approver.id], None),
            None => return Vec::new(),
        },
        OrderStatus::Completed => (NotificationKind::Completed, vec![after.submitter.employee_id], None),
        OrderStatus::Rejected | OrderStatus::RejectedFinal => {
            let mut recipients = vec![after.submitter.employee_id];
            recipients.extend(
                after
                    .prior_signers()
                    .into_iter()
                    .filter(|id| *id != after.submitter.employee_id),
            );
            (NotificationKind::Rejected, recipients, after.rejection_comment.clone())
        }
        OrderStatus::Draft => return Vec::new(),
    };

    vec![WorkflowNotification {
        order_id: after.id,
        kind,
        status: after.status,
        triggered_by,
        recipients,
        travel_order_number: after.travel_order_number.clone(),
        comment,
        occurred_at: after.updated_at,
    }]
}
