use uuid::Uuid;

use crate::domain::approval_chain::ApprovalChain;
use super::value_objects::{DecisionRequest, Submitter, TravelDetails};

// ============================================================================
// Travel Order Commands - Represent user intent
// ============================================================================
//
// Creation is not a command on an existing aggregate; see
// `TravelOrderAggregate::draft`.
//
// ============================================================================

#[derive(Debug, Clone)]
pub enum TravelOrderCommand {
    ReassignApprover {
        level: usize,
        approver_id: Uuid,
    },
    Submit,
    Decide(DecisionRequest),
    Resubmit(ResubmissionPlan),
}

impl TravelOrderCommand {
    pub fn name(&self) -> &'static str {
        match self {
            TravelOrderCommand::ReassignApprover { .. } => "reassign_approver",
            TravelOrderCommand::Submit => "submit",
            TravelOrderCommand::Decide(_) => "decide",
            TravelOrderCommand::Resubmit(_) => "resubmit",
        }
    }
}

/// Fully resolved resubmission, produced by `ResubmissionHandler::plan`
#[derive(Debug, Clone, PartialEq)]
pub struct ResubmissionPlan {
    pub round: u32,
    pub submitter: Submitter,
    pub details: TravelDetails,
    pub chain: Option<ApprovalChain>,
}
