use uuid::Uuid;
use anyhow::Result;
use super::event::EventEnvelope;

// ============================================================================
// Aggregate Root Pattern
// ============================================================================
//
// 1. State is derived from events, never written directly
// 2. Commands are validated against current state before any event exists
// 3. handle_command is pure: it reads &self and returns events or an error
// 4. apply_event is the only place state changes
//
// ============================================================================

/// Generic Aggregate trait - all event-sourced aggregates implement this
///
/// Type Parameters:
/// - `Event`: The domain event type for this aggregate
/// - `Command`: The command type for this aggregate
/// - `Error`: The error type for business rule violations
pub trait Aggregate: Sized + Send + Sync {
    type Event;
    type Command;
    type Error;

    /// Create new aggregate from its first event
    fn apply_first_event(aggregate_id: Uuid, event: &Self::Event) -> Result<Self, Self::Error>;

    /// Apply subsequent events to update state
    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// Handle command and emit events (business logic)
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    fn aggregate_id(&self) -> Uuid;

    /// Sequence number of the last applied event
    fn version(&self) -> i64;

    fn set_version(&mut self, version: i64);

    /// Rebuild the aggregate from its event history
    fn load_from_events(events: Vec<EventEnvelope<Self::Event>>) -> Result<Self>
    where
        Self::Error: std::fmt::Display,
    {
        let Some(first) = events.first() else {
            anyhow::bail!("No events to load");
        };

        let mut aggregate = Self::apply_first_event(first.aggregate_id, &first.event_data)
            .map_err(|e| anyhow::anyhow!("Failed to apply first event: {}", e))?;
        aggregate.set_version(first.sequence_number);

        for envelope in events.iter().skip(1) {
            if envelope.sequence_number <= aggregate.version() {
                anyhow::bail!(
                    "Out-of-order event for {}: sequence {} after {}",
                    envelope.aggregate_id,
                    envelope.sequence_number,
                    aggregate.version()
                );
            }
            aggregate.apply_event(&envelope.event_data)
                .map_err(|e| anyhow::anyhow!("Failed to apply event: {}", e))?;
            aggregate.set_version(envelope.sequence_number);
        }

        Ok(aggregate)
    }
}
