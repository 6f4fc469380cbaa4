// ============================================================================
// Travel Order Approval Workflow
// ============================================================================
//
// Event-sourced engine that routes travel orders through a table-driven,
// multi-level approval chain.
//
// ============================================================================

pub mod config;
pub mod domain;
pub mod event_sourcing;
pub mod messaging;
pub mod metrics;

pub use config::WorkflowConfig;
pub use domain::{ErrorKind, WorkflowError};
