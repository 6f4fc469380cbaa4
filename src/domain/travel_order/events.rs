use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::domain::approval_chain::ApprovalChain;
use crate::event_sourcing::core::DomainEvent;
use super::value_objects::{Decision, Submitter, TravelDetails, WorkflowPolicy};

// ============================================================================
// Travel Order Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TravelOrderEvent {
    Drafted(OrderDrafted),
    ApproverReassigned(ApproverReassigned),
    Submitted(OrderSubmitted),
    DecisionRecorded(DecisionRecorded),
    OrderNumberAssigned(OrderNumberAssigned),
    Resubmitted(OrderResubmitted),
}

impl DomainEvent for TravelOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TravelOrderEvent::Drafted(_) => "TravelOrderDrafted",
            TravelOrderEvent::ApproverReassigned(_) => "TravelOrderApproverReassigned",
            TravelOrderEvent::Submitted(_) => "TravelOrderSubmitted",
            TravelOrderEvent::DecisionRecorded(_) => "TravelOrderDecisionRecorded",
            TravelOrderEvent::OrderNumberAssigned(_) => "TravelOrderNumberAssigned",
            TravelOrderEvent::Resubmitted(_) => "TravelOrderResubmitted",
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Order created with its chain frozen
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderDrafted {
    pub submitter: Submitter,
    pub details: TravelDetails,
    pub chain: ApprovalChain,
    pub policy: WorkflowPolicy,
    pub drafted_at: DateTime<Utc>,
}

/// A draft's level re-bound to another candidate from the snapshot
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApproverReassigned {
    pub level: usize,
    pub approver_id: Uuid,
    pub reassigned_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderSubmitted {
    pub submitted_at: DateTime<Utc>,
}

/// An approver's verdict on the current level.
///
/// `final_rejection` is fixed when the event is emitted so replay never
/// depends on the policy in force at load time.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DecisionRecorded {
    pub decision: Decision,
    pub final_rejection: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderNumberAssigned {
    pub travel_order_number: String,
    pub assigned_at: DateTime<Utc>,
}

/// Rejected order re-entering approval at level 0 in a new round
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderResubmitted {
    pub round: u32,
    pub submitter: Submitter,
    pub details: TravelDetails,
    /// Present only when the chain was rebuilt
    pub chain: Option<ApprovalChain>,
    pub resubmitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        let event = TravelOrderEvent::Submitted(OrderSubmitted { submitted_at: Utc::now() });
        assert_eq!(event.event_type(), "TravelOrderSubmitted");

        let event = TravelOrderEvent::OrderNumberAssigned(OrderNumberAssigned {
            travel_order_number: "R1-202503-0001".into(),
            assigned_at: Utc::now(),
        });
        assert_eq!(event.event_type(), "TravelOrderNumberAssigned");
    }

    #[test]
    fn test_adjacent_tagging() {
        let event = TravelOrderEvent::ApproverReassigned(ApproverReassigned {
            level: 1,
            approver_id: Uuid::nil(),
            reassigned_at: Utc::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ApproverReassigned");
        assert_eq!(json["data"]["level"], 1);
    }
}
