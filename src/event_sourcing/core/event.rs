use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use anyhow::Result;

// ============================================================================
// Event Envelope - Event Metadata
// ============================================================================
//
// Wraps domain events with the metadata the store needs: identity, position
// in the aggregate stream, correlation and timing.
//
// ============================================================================

/// Generic Event Envelope - wraps any domain event with metadata
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EventEnvelope<E> {
    // Event Identity
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub sequence_number: i64,

    // Event Type Information
    pub event_type: String,
    pub event_version: i32,

    // Event Payload
    pub event_data: E,

    // Correlation (groups the events of one inbound request)
    pub correlation_id: Uuid,

    // Who triggered this event
    pub user_id: Option<Uuid>,

    pub timestamp: DateTime<Utc>,

    pub metadata: HashMap<String, String>,
}

impl<E: DomainEvent> EventEnvelope<E> {
    pub fn new(
        aggregate_id: Uuid,
        sequence_number: i64,
        event_data: E,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            aggregate_id,
            sequence_number,
            event_type: event_data.event_type().to_string(),
            event_version: E::event_version(),
            event_data,
            correlation_id,
            user_id: None,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_user(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// All domain events must implement this trait to be used with the event store.
pub trait DomainEvent: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync {
    /// Name of the concrete variant, stored alongside the payload
    fn event_type(&self) -> &'static str;

    fn event_version() -> i32 where Self: Sized { 1 }
}

pub fn serialize_event<E: Serialize>(event: &E) -> Result<String> {
    Ok(serde_json::to_string(event)?)
}

pub fn deserialize_event<E: for<'de> Deserialize<'de>>(json: &str) -> Result<E> {
    Ok(serde_json::from_str(json)?)
}
