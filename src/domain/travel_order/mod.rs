// ============================================================================
// Travel Order Domain - Approval Workflow
// ============================================================================
//
// - Value objects (Submitter, TravelDetails, OrderStatus, Decision, ...)
// - Events (Drafted, Submitted, DecisionRecorded, ...)
// - Commands (ReassignApprover, Submit, Decide, Resubmit)
// - Aggregate (TravelOrderAggregate state machine)
// - Decision recording and resubmission planning
// - Order numbering
// - Command Handler (TravelOrderCommandHandler)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod aggregate;
pub mod decision_recorder;
pub mod resubmission;
pub mod numbering;
pub mod command_handler;

#[cfg(test)]
pub(crate) mod fixtures;

pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use aggregate::*;
pub use decision_recorder::DecisionRecorder;
pub use resubmission::ResubmissionHandler;
pub use numbering::{MonthlySequenceAllocator, OrderNumberAllocator};
pub use command_handler::*;
