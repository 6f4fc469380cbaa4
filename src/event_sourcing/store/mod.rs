// ============================================================================
// Event Sourcing Store - Persistence Layer
// ============================================================================

pub mod event_store;
pub mod scylla_store;

pub use event_store::{load_aggregate, EventStore, InMemoryEventStore, StoreError};
pub use scylla_store::ScyllaEventStore;
