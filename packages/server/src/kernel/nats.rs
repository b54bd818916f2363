//! Event bus abstraction for production and testing.
//!
//! Provides a trait-based bus so the relay can publish to a real NATS
//! connection or to a recording mock.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

/// Header carrying the idempotency key; JetStream uses it for deduplication.
pub const MSG_ID_HEADER: &str = "Nats-Msg-Id";
/// Header carrying the partition key (job id or scan id).
pub const PARTITION_KEY_HEADER: &str = "Partition-Key";

/// An encoded event ready for the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Unique per envelope, for tracing a delivery through logs.
    pub message_id: Uuid,
    pub subject: String,
    pub partition_key: String,
    /// Stable across redeliveries of the same fact.
    pub idempotency_key: String,
    pub content_type: &'static str,
    pub payload: Bytes,
}

/// Publish side of the event bus.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, message: &OutboundMessage) -> Result<()>;
}

/// Real NATS client publisher.
pub struct NatsEventBus {
    client: async_nats::Client,
}

impl NatsEventBus {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventBus for NatsEventBus {
    async fn publish(&self, message: &OutboundMessage) -> Result<()> {
        let mut headers = async_nats::HeaderMap::new();
        headers.insert(MSG_ID_HEADER, message.idempotency_key.as_str());
        headers.insert(PARTITION_KEY_HEADER, message.partition_key.as_str());
        headers.insert("Content-Type", message.content_type);

        self.client
            .publish_with_headers(message.subject.clone(), headers, message.payload.clone())
            .await?;
        Ok(())
    }
}

/// Mock bus that records published messages for testing.
///
/// Can be told to fail the next N publishes to exercise relay retries.
#[derive(Default)]
pub struct TestBus {
    published: RwLock<Vec<OutboundMessage>>,
    failures_remaining: AtomicUsize,
    attempts: AtomicUsize,
}

impl TestBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` publish attempts.
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Get all published messages.
    pub fn published_messages(&self) -> Vec<OutboundMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Get published messages for a specific subject.
    pub fn messages_for_subject(&self, subject: &str) -> Vec<OutboundMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|m| m.subject == subject)
            .cloned()
            .collect()
    }

    /// Get the count of published messages.
    pub fn publish_count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Publish attempts, including failed ones.
    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Clear all recorded messages.
    pub fn clear(&self) {
        self.published
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Deserialize a published message payload as JSON.
    pub fn deserialize_message<T: serde::de::DeserializeOwned>(
        &self,
        msg: &OutboundMessage,
    ) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&msg.payload)
    }
}

#[async_trait]
impl EventBus for TestBus {
    async fn publish(&self, message: &OutboundMessage) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let failed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            anyhow::bail!("test bus unavailable");
        }

        self.published
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(subject: &str) -> OutboundMessage {
        OutboundMessage {
            message_id: Uuid::now_v7(),
            subject: subject.to_string(),
            partition_key: "1".to_string(),
            idempotency_key: "job.updated:1:abc".to_string(),
            content_type: "application/json",
            payload: Bytes::from_static(br#"{"id":1}"#),
        }
    }

    #[tokio::test]
    async fn test_records_published_messages() {
        let bus = TestBus::new();
        bus.publish(&message("jobs.events")).await.unwrap();
        bus.publish(&message("scans.events")).await.unwrap();

        assert_eq!(bus.publish_count(), 2);
        assert_eq!(bus.messages_for_subject("jobs.events").len(), 1);
        assert_eq!(bus.messages_for_subject("scans.events").len(), 1);
    }

    #[tokio::test]
    async fn test_fail_next_rejects_then_recovers() {
        let bus = TestBus::new();
        bus.fail_next(2);

        assert!(bus.publish(&message("jobs.events")).await.is_err());
        assert!(bus.publish(&message("jobs.events")).await.is_err());
        assert!(bus.publish(&message("jobs.events")).await.is_ok());
        assert_eq!(bus.publish_count(), 1);
        assert_eq!(bus.attempt_count(), 3);
    }

    #[tokio::test]
    async fn test_deserialize_payload() {
        let bus = TestBus::new();
        bus.publish(&message("jobs.events")).await.unwrap();

        let msg = &bus.published_messages()[0];
        let value: serde_json::Value = bus.deserialize_message(msg).unwrap();
        assert_eq!(value["id"], 1);

        bus.clear();
        assert_eq!(bus.publish_count(), 0);
    }
}
