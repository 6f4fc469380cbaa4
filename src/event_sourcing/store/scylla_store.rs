use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::client::session::Session;
use scylla::statement::batch::Batch;
use scylla::value::{CqlValue, Row};
use uuid::Uuid;

use crate::event_sourcing::core::{serialize_event, DomainEvent, EventEnvelope};
use super::event_store::{EventStore, StoreError};

// ============================================================================
// ScyllaDB Event Store
// ============================================================================
//
// One partition per aggregate. Events are clustering rows; the stream version
// is a static column on the same partition, so a single-partition LWT batch
// can check the version and insert the events atomically:
//
//   UPDATE ... SET current_sequence = new WHERE aggregate_id = ? IF current_sequence = expected
//   INSERT event 1
//   INSERT event 2 ...
//
// Either every statement applies or none does.
//
// Named counters live in a companion `<table>_counters` table and advance by
// compare-and-set, retried while another writer wins.
//
// ============================================================================

const MAX_COUNTER_ATTEMPTS: usize = 16;

pub struct ScyllaEventStore<E: DomainEvent> {
    session: Arc<Session>,
    table: String,
    counters_table: String,
    _phantom: PhantomData<E>,
}

impl<E: DomainEvent> ScyllaEventStore<E> {
    pub fn new(session: Arc<Session>, table: &str) -> Self {
        Self {
            session,
            table: table.to_string(),
            counters_table: format!("{}_counters", table),
            _phantom: PhantomData,
        }
    }

    /// Create keyspace and event table if missing, then switch to the keyspace
    pub async fn ensure_schema(&self, keyspace: &str) -> anyhow::Result<()> {
        self.session
            .query_unpaged(
                format!(
                    "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                     {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                    keyspace
                ),
                &[],
            )
            .await?;

        self.session.use_keyspace(keyspace, false).await?;

        self.session
            .query_unpaged(create_table_statement(&self.table), &[])
            .await?;
        self.session
            .query_unpaged(create_counters_table_statement(&self.counters_table), &[])
            .await?;

        tracing::info!(keyspace = %keyspace, table = %self.table, "Event store schema ready");
        Ok(())
    }

    async fn read_counter(&self, counter: &str) -> Result<Option<i64>, StoreError> {
        let result = self
            .session
            .query_unpaged(format!("SELECT value FROM {} WHERE name = ?", self.counters_table), (counter,))
            .await
            .context("Failed to query counter")?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(None),
        };

        match rows_result.maybe_first_row::<(Option<i64>,)>() {
            Ok(Some((value,))) => Ok(value),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Backend(anyhow!("Failed to read counter {}: {}", counter, e))),
        }
    }

    /// Move the counter one past `current`; `None` when another writer got there first
    async fn try_advance_counter(&self, counter: &str, current: Option<i64>) -> Result<Option<i64>, StoreError> {
        let (result, next) = match current {
            None => (
                self.session
                    .query_unpaged(counter_claim_statement(&self.counters_table), (counter,))
                    .await,
                1,
            ),
            Some(value) => (
                self.session
                    .query_unpaged(counter_advance_statement(&self.counters_table), (value + 1, counter, value))
                    .await,
                value + 1,
            ),
        };

        let rows = result
            .context("Counter LWT failed")?
            .into_rows_result()
            .context("Counter LWT returned no result rows")?;
        let row = rows
            .first_row::<Row>()
            .context("Failed to read counter LWT row")?;

        Ok(lwt_applied(&row)?.then_some(next))
    }
}

fn create_table_statement(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            aggregate_id uuid,
            sequence_number bigint,
            current_sequence bigint static,
            event_id uuid,
            event_type text,
            event_version int,
            event_data text,
            correlation_id uuid,
            user_id uuid,
            timestamp timestamp,
            PRIMARY KEY (aggregate_id, sequence_number)
        ) WITH CLUSTERING ORDER BY (sequence_number ASC)",
        table
    )
}

fn create_counters_table_statement(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            name text PRIMARY KEY,
            value bigint
        )",
        table
    )
}

fn counter_claim_statement(table: &str) -> String {
    format!("INSERT INTO {} (name, value) VALUES (?, 1) IF NOT EXISTS", table)
}

fn counter_advance_statement(table: &str) -> String {
    format!("UPDATE {} SET value = ? WHERE name = ? IF value = ?", table)
}

/// Version guard for the batch. A brand-new stream has no static value yet.
fn version_guard_statement(table: &str, expected_version: i64) -> String {
    if expected_version == 0 {
        format!(
            "UPDATE {} SET current_sequence = ? WHERE aggregate_id = ? IF current_sequence = null",
            table
        )
    } else {
        format!(
            "UPDATE {} SET current_sequence = ? WHERE aggregate_id = ? IF current_sequence = ?",
            table
        )
    }
}

fn insert_event_statement(table: &str) -> String {
    format!(
        "INSERT INTO {} (
            aggregate_id, sequence_number, event_id, event_type, event_version,
            event_data, correlation_id, user_id, timestamp
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        table
    )
}

/// First column of an LWT result is `[applied]`
fn lwt_applied(row: &Row) -> anyhow::Result<bool> {
    match row.columns.first() {
        Some(Some(CqlValue::Boolean(applied))) => Ok(*applied),
        other => Err(anyhow!("Unexpected LWT result column: {:?}", other)),
    }
}

#[async_trait]
impl<E: DomainEvent + 'static> EventStore<E> for ScyllaEventStore<E> {
    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<EventEnvelope<E>>,
    ) -> Result<i64, StoreError> {
        if events.is_empty() {
            return Err(StoreError::EmptyAppend);
        }

        let new_version = expected_version + events.len() as i64;

        let mut batch = Batch::default();
        let mut values: Vec<Box<dyn scylla::serialize::row::SerializeRow + Send + Sync>> = vec![];

        batch.append_statement(version_guard_statement(&self.table, expected_version).as_str());
        if expected_version == 0 {
            values.push(Box::new((new_version, aggregate_id)));
        } else {
            values.push(Box::new((new_version, aggregate_id, expected_version)));
        }

        let insert = insert_event_statement(&self.table);
        let mut seq = expected_version;
        for envelope in &events {
            seq += 1;
            let event_json = serialize_event(&envelope.event_data)?;

            batch.append_statement(insert.as_str());
            values.push(Box::new((
                aggregate_id,
                seq,
                envelope.event_id,
                envelope.event_type.clone(),
                envelope.event_version,
                event_json,
                envelope.correlation_id,
                envelope.user_id,
                envelope.timestamp,
            )));
        }

        let result = self
            .session
            .batch(&batch, values)
            .await
            .context("LWT batch append failed")?;

        let rows = result
            .into_rows_result()
            .context("LWT batch returned no result rows")?;
        let row = rows
            .first_row::<Row>()
            .context("Failed to read LWT result row")?;

        if !lwt_applied(&row)? {
            let actual = self.current_version(aggregate_id).await?;
            tracing::debug!(
                aggregate_id = %aggregate_id,
                expected = expected_version,
                actual = actual,
                "LWT version guard rejected append"
            );
            return Err(StoreError::ConcurrencyConflict {
                expected: expected_version,
                actual,
            });
        }

        tracing::info!(
            aggregate_id = %aggregate_id,
            new_version = new_version,
            event_count = events.len(),
            "Appended events to event store"
        );

        Ok(new_version)
    }

    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<EventEnvelope<E>>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                format!(
                    "SELECT aggregate_id, sequence_number, event_id, event_type, event_version,
                            event_data, correlation_id, user_id, timestamp
                     FROM {}
                     WHERE aggregate_id = ?
                     ORDER BY sequence_number ASC",
                    self.table
                ),
                (aggregate_id,),
            )
            .await
            .context("Failed to query events")?;

        let mut events = Vec::new();

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(events),
        };

        let rows = rows_result
            .rows::<(Uuid, i64, Uuid, String, i32, String, Uuid, Option<Uuid>, DateTime<Utc>)>()
            .context("Failed to deserialize event rows")?;

        for row in rows {
            let (agg_id, sequence_number, event_id, event_type, event_version, event_data_json, correlation_id, user_id, timestamp) =
                row.context("Failed to read event row")?;

            let event_data: E = serde_json::from_str(&event_data_json)
                .with_context(|| format!("Corrupt {} payload at sequence {}", event_type, sequence_number))?;

            events.push(EventEnvelope {
                event_id,
                aggregate_id: agg_id,
                sequence_number,
                event_type,
                event_version,
                event_data,
                correlation_id,
                user_id,
                timestamp,
                metadata: std::collections::HashMap::new(),
            });
        }

        tracing::debug!("Loaded {} events for aggregate {}", events.len(), aggregate_id);
        Ok(events)
    }

    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, StoreError> {
        let result = self
            .session
            .query_unpaged(
                format!(
                    "SELECT current_sequence FROM {} WHERE aggregate_id = ? LIMIT 1",
                    self.table
                ),
                (aggregate_id,),
            )
            .await
            .context("Failed to query stream version")?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(0),
        };

        match rows_result.maybe_first_row::<(Option<i64>,)>() {
            Ok(Some((Some(version),))) => Ok(version),
            Ok(_) => Ok(0),
            Err(e) => Err(StoreError::Backend(anyhow!("Failed to read stream version: {}", e))),
        }
    }

    async fn next_counter_value(&self, counter: &str) -> Result<i64, StoreError> {
        for attempt in 1..=MAX_COUNTER_ATTEMPTS {
            let current = self.read_counter(counter).await?;
            if let Some(value) = self.try_advance_counter(counter, current).await? {
                return Ok(value);
            }
            tracing::debug!(counter = %counter, attempt = attempt, "Counter moved concurrently, retrying");
        }

        Err(StoreError::Backend(anyhow!(
            "counter {} still contended after {} attempts",
            counter,
            MAX_COUNTER_ATTEMPTS
        )))
    }
}
