use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};

use crate::event_sourcing::store::EventStore;
use super::events::TravelOrderEvent;

/// Issues the human-facing travel order number when an order completes
#[async_trait]
pub trait OrderNumberAllocator: Send + Sync {
    async fn next_number(&self, completed_at: DateTime<Utc>) -> anyhow::Result<String>;
}

/// `{prefix}-{YYYYMM}-{NNNN}`, with the counter restarting every month.
///
/// The sequence is a named counter in the event store, so every handler
/// writing to the same store draws from one sequence and restarts resume
/// where the store left off. A number allocated for an append that then
/// loses a concurrency race is not reused.
pub struct MonthlySequenceAllocator {
    prefix: String,
    store: Arc<dyn EventStore<TravelOrderEvent>>,
}

impl MonthlySequenceAllocator {
    pub fn new(prefix: impl Into<String>, store: Arc<dyn EventStore<TravelOrderEvent>>) -> Self {
        Self {
            prefix: prefix.into(),
            store,
        }
    }

    fn counter_name(&self, year: i32, month: u32) -> String {
        format!("travel_order_number:{}:{:04}{:02}", self.prefix, year, month)
    }
}

#[async_trait]
impl OrderNumberAllocator for MonthlySequenceAllocator {
    async fn next_number(&self, completed_at: DateTime<Utc>) -> anyhow::Result<String> {
        let (year, month) = (completed_at.year(), completed_at.month());
        let sequence = self.store.next_counter_value(&self.counter_name(year, month)).await?;

        Ok(format!("{}-{:04}{:02}-{:04}", self.prefix, year, month, sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::event_sourcing::store::InMemoryEventStore;

    #[tokio::test]
    async fn test_sequence_is_monthly() {
        let allocator = MonthlySequenceAllocator::new("R1", Arc::new(InMemoryEventStore::new()));
        let march = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();
        let april = Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap();

        assert_eq!(allocator.next_number(march).await.unwrap(), "R1-202503-0001");
        assert_eq!(allocator.next_number(march).await.unwrap(), "R1-202503-0002");
        assert_eq!(allocator.next_number(april).await.unwrap(), "R1-202504-0001");
    }

    #[tokio::test]
    async fn test_allocators_sharing_a_store_never_collide() {
        let store: Arc<dyn EventStore<TravelOrderEvent>> = Arc::new(InMemoryEventStore::new());
        let first = MonthlySequenceAllocator::new("R1", store.clone());
        let second = MonthlySequenceAllocator::new("R1", store.clone());
        let march = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();

        assert_eq!(first.next_number(march).await.unwrap(), "R1-202503-0001");
        assert_eq!(second.next_number(march).await.unwrap(), "R1-202503-0002");

        // A restarted allocator picks up from the store
        let restarted = MonthlySequenceAllocator::new("R1", store);
        assert_eq!(restarted.next_number(march).await.unwrap(), "R1-202503-0003");
    }

    #[tokio::test]
    async fn test_prefixes_number_independently() {
        let store: Arc<dyn EventStore<TravelOrderEvent>> = Arc::new(InMemoryEventStore::new());
        let r1 = MonthlySequenceAllocator::new("R1", store.clone());
        let r2 = MonthlySequenceAllocator::new("R2", store);
        let march = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();

        assert_eq!(r1.next_number(march).await.unwrap(), "R1-202503-0001");
        assert_eq!(r2.next_number(march).await.unwrap(), "R2-202503-0001");
    }
}
