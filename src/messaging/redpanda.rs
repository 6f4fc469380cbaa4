use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
};

use super::{NotificationSink, WorkflowNotification};

/// Publishes workflow notifications as JSON to a Redpanda topic
pub struct RedpandaNotificationSink {
    producer: FutureProducer,
    topic: String,
    send_timeout: Duration,
}

impl RedpandaNotificationSink {
    pub fn new(brokers: &str, topic: impl Into<String>) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .context("Failed to create Redpanda producer")?;

        Ok(Self {
            producer,
            topic: topic.into(),
            send_timeout: Duration::from_secs(5),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Partition key: every notification for one order stays in order
fn record_key(notification: &WorkflowNotification) -> String {
    notification.order_id.to_string()
}

#[async_trait]
impl NotificationSink for RedpandaNotificationSink {
    async fn publish(&self, notification: &WorkflowNotification) -> Result<()> {
        let key = record_key(notification);
        let payload = serde_json::to_string(notification)?;

        let record = FutureRecord::to(&self.topic)
            .key(&key)
            .payload(&payload);

        match self.producer.send(record, Timeout::After(self.send_timeout)).await {
            Ok(_) => {
                tracing::debug!(
                    topic = %self.topic,
                    key = %key,
                    kind = notification.kind.as_str(),
                    "Published to Redpanda"
                );
                Ok(())
            }
            Err((e, _)) => {
                tracing::error!(
                    error = %e,
                    topic = %self.topic,
                    "Failed to publish to Redpanda"
                );
                Err(anyhow::anyhow!("Kafka send error: {}", e))
            }
        }
    }
}
