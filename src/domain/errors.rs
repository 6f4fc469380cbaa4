use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::hierarchy::ChainLevel;
use super::travel_order::OrderStatus;

// ============================================================================
// Workflow Errors
// ============================================================================
//
// Every failure is a synchronous, typed result. None of these are retried
// inside the engine.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Unknown organizational unit: {0}")]
    UnknownOrgUnit(String),

    #[error("No qualified approver for chain level {index} ({level})")]
    NoQualifiedApprover { index: usize, level: ChainLevel },

    #[error("Approver {approver_id} is not a candidate for chain level {index}")]
    InvalidApproverOverride { index: usize, approver_id: Uuid },

    #[error("Invalid approval chain: {0}")]
    InvalidChain(String),

    #[error("Approver {approver_id} is not the current approver for level {level}")]
    NotCurrentApprover { approver_id: Uuid, level: usize },

    #[error("Invalid decision payload: {0}")]
    InvalidDecisionPayload(String),

    #[error("Stale order state: {0}")]
    StaleState(String),

    #[error("Order is not rejected (status: {0})")]
    NotRejected(OrderStatus),

    #[error("Invalid travel details: {0}")]
    InvalidTravelDetails(String),

    #[error("Travel order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Aggregate not initialized")]
    NotInitialized,
}

/// Stable, serializable failure code for callers mapping errors to responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownOrgUnit,
    NoQualifiedApprover,
    InvalidApproverOverride,
    InvalidChain,
    NotCurrentApprover,
    InvalidDecisionPayload,
    StaleState,
    NotRejected,
    InvalidTravelDetails,
    OrderNotFound,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownOrgUnit => "unknown_org_unit",
            ErrorKind::NoQualifiedApprover => "no_qualified_approver",
            ErrorKind::InvalidApproverOverride => "invalid_approver_override",
            ErrorKind::InvalidChain => "invalid_chain",
            ErrorKind::NotCurrentApprover => "not_current_approver",
            ErrorKind::InvalidDecisionPayload => "invalid_decision_payload",
            ErrorKind::StaleState => "stale_state",
            ErrorKind::NotRejected => "not_rejected",
            ErrorKind::InvalidTravelDetails => "invalid_travel_details",
            ErrorKind::OrderNotFound => "order_not_found",
            ErrorKind::Storage => "storage",
        }
    }
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::UnknownOrgUnit(_) => ErrorKind::UnknownOrgUnit,
            WorkflowError::NoQualifiedApprover { .. } => ErrorKind::NoQualifiedApprover,
            WorkflowError::InvalidApproverOverride { .. } => ErrorKind::InvalidApproverOverride,
            WorkflowError::InvalidChain(_) => ErrorKind::InvalidChain,
            WorkflowError::NotCurrentApprover { .. } => ErrorKind::NotCurrentApprover,
            WorkflowError::InvalidDecisionPayload(_) => ErrorKind::InvalidDecisionPayload,
            WorkflowError::StaleState(_) => ErrorKind::StaleState,
            WorkflowError::NotRejected(_) => ErrorKind::NotRejected,
            WorkflowError::InvalidTravelDetails(_) => ErrorKind::InvalidTravelDetails,
            WorkflowError::OrderNotFound(_) => ErrorKind::OrderNotFound,
            WorkflowError::Storage(_) | WorkflowError::NotInitialized => ErrorKind::Storage,
        }
    }

    pub fn is_stale_state(&self) -> bool {
        matches!(self, WorkflowError::StaleState(_))
    }
}
