// ============================================================================
// Domain Layer
// ============================================================================
//
// - hierarchy: unit -> ordered approval levels (data, not code)
// - approval_chain: levels bound to concrete approvers
// - travel_order: the event-sourced approval workflow
// - errors: the failure taxonomy shared by all of the above
//
// ============================================================================

pub mod errors;
pub mod hierarchy;
pub mod approval_chain;
pub mod travel_order;

pub use errors::{ErrorKind, WorkflowError};
