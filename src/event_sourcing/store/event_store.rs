use std::collections::HashMap;
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::event_sourcing::core::{Aggregate, DomainEvent, EventEnvelope};

// ============================================================================
// Event Store - Repository for Events
// ============================================================================
//
// Responsibilities:
// 1. Append events to an aggregate stream (append-only)
// 2. Load event history for aggregates
// 3. Optimistic concurrency: an append names the version it was computed
//    against and fails if the stream moved in between
// 4. Named counters shared by every writer of the store
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Concurrency conflict: expected version {expected}, but current is {actual}")]
    ConcurrencyConflict { expected: i64, actual: i64 },

    #[error("Cannot append empty event list")]
    EmptyAppend,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait EventStore<E: DomainEvent>: Send + Sync {
    /// Append events atomically. Returns the new version after appending.
    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<EventEnvelope<E>>,
    ) -> Result<i64, StoreError>;

    /// All events for an aggregate, ordered by sequence number
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<EventEnvelope<E>>, StoreError>;

    /// Version of the aggregate stream; 0 when it does not exist
    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, StoreError>;

    /// Increment the named counter and return the new value; the first call yields 1.
    /// Two callers never receive the same value for one counter.
    async fn next_counter_value(&self, counter: &str) -> Result<i64, StoreError>;

    async fn aggregate_exists(&self, aggregate_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.current_version(aggregate_id).await? > 0)
    }
}

/// Rebuild an aggregate from its stream, `None` if the stream is empty
pub async fn load_aggregate<A>(
    store: &dyn EventStore<A::Event>,
    aggregate_id: Uuid,
) -> Result<Option<A>, StoreError>
where
    A: Aggregate,
    A::Event: DomainEvent,
    A::Error: std::fmt::Display,
{
    let events = store.load_events(aggregate_id).await?;
    if events.is_empty() {
        return Ok(None);
    }

    Ok(Some(A::load_from_events(events)?))
}

// ============================================================================
// In-Memory Event Store
// ============================================================================

/// Process-local store. Version check and append happen under one write guard.
pub struct InMemoryEventStore<E: DomainEvent> {
    streams: RwLock<HashMap<Uuid, Vec<EventEnvelope<E>>>>,
    counters: Mutex<HashMap<String, i64>>,
}

impl<E: DomainEvent> InMemoryEventStore<E> {
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub async fn aggregate_count(&self) -> usize {
        self.streams.read().await.len()
    }
}

impl<E: DomainEvent> Default for InMemoryEventStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: DomainEvent + 'static> EventStore<E> for InMemoryEventStore<E> {
    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<EventEnvelope<E>>,
    ) -> Result<i64, StoreError> {
        if events.is_empty() {
            return Err(StoreError::EmptyAppend);
        }

        let mut streams = self.streams.write().await;

        let current_version = streams
            .get(&aggregate_id)
            .and_then(|stream| stream.last())
            .map(|e| e.sequence_number)
            .unwrap_or(0);
        if current_version != expected_version {
            return Err(StoreError::ConcurrencyConflict {
                expected: expected_version,
                actual: current_version,
            });
        }

        let stream = streams.entry(aggregate_id).or_default();
        let mut new_version = expected_version;
        for mut envelope in events {
            new_version += 1;
            envelope.sequence_number = new_version;
            stream.push(envelope);
        }

        tracing::debug!(
            aggregate_id = %aggregate_id,
            new_version = new_version,
            "Appended events to in-memory store"
        );

        Ok(new_version)
    }

    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<EventEnvelope<E>>, StoreError> {
        let streams = self.streams.read().await;
        Ok(streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, StoreError> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(&aggregate_id)
            .and_then(|stream| stream.last())
            .map(|e| e.sequence_number)
            .unwrap_or(0))
    }

    async fn next_counter_value(&self, counter: &str) -> Result<i64, StoreError> {
        let mut counters = self.counters.lock().await;
        let value = counters.entry(counter.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}
