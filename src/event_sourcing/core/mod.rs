// ============================================================================
// Event Sourcing Core - Generic Abstractions
// ============================================================================
//
// Nothing in here knows about travel orders. Domain aggregates live in
// src/domain/ and plug into these traits.
//
// ============================================================================

pub mod aggregate;
pub mod event;

pub use aggregate::Aggregate;
pub use event::{DomainEvent, EventEnvelope, serialize_event, deserialize_event};
