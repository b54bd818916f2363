//! Outbound event queue.
//!
//! Request handlers hand composed events to [`EventPublisher::publish`],
//! which encodes them and enqueues them without waiting on the bus. A single
//! [`EventRelay`] task drains the queue in FIFO order and pushes each message
//! to the [`EventBus`], retrying the head message with exponential backoff.
//!
//! ```text
//! handler ──publish()──► queue ──► EventRelay ──► EventBus (NATS)
//!                                     │
//!                                     └─ retry head with backoff, then hold in backlog
//! ```
//!
//! A message that exhausts its attempts stays at the head of the relay's
//! backlog, and everything queued after it waits behind it. The backlog is
//! retried every `max_backoff` or whenever a new message arrives, so an
//! outage delays events without reordering or losing them. Only a backlog
//! still undelivered when the process exits is lost, and that is logged.
//!
//! Delivery is at-least-once: a retry after a lost acknowledgment republishes
//! the same message, so every message carries an idempotency key derived from
//! its kind, partition key and payload digest.

use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::codec::{EventCodec, JsonCodec};
use super::nats::{EventBus, OutboundMessage};
use crate::domains::jobs::errors::JobError;
use crate::domains::jobs::events::{EventKind, JobEvent};

// ============================================================================
// Routes
// ============================================================================

/// Subject and codec for one event kind.
#[derive(Clone)]
pub struct Route {
    pub subject: String,
    pub codec: Arc<dyn EventCodec>,
}

impl Route {
    pub fn new(subject: impl Into<String>, codec: Arc<dyn EventCodec>) -> Self {
        Self {
            subject: subject.into(),
            codec,
        }
    }
}

/// Per-kind routing, fixed at construction.
#[derive(Clone)]
pub struct EventRoutes {
    pub submit: Route,
    pub updated: Route,
    pub cancel: Route,
    pub scan_updated: Route,
}

impl EventRoutes {
    /// Job events on `job_subject`, scan fan-out on `scan_subject`, all JSON.
    pub fn json(job_subject: impl Into<String>, scan_subject: impl Into<String>) -> Self {
        let codec: Arc<dyn EventCodec> = Arc::new(JsonCodec);
        let job_subject = job_subject.into();
        Self {
            submit: Route::new(job_subject.clone(), codec.clone()),
            updated: Route::new(job_subject.clone(), codec.clone()),
            cancel: Route::new(job_subject, codec.clone()),
            scan_updated: Route::new(scan_subject, codec),
        }
    }

    pub fn route(&self, kind: EventKind) -> &Route {
        match kind {
            EventKind::Submit => &self.submit,
            EventKind::Updated => &self.updated,
            EventKind::Cancel => &self.cancel,
            EventKind::ScanUpdated => &self.scan_updated,
        }
    }
}

/// Stable key for deduplicating redeliveries of the same fact.
pub fn idempotency_key(kind: EventKind, partition_key: &str, payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    format!(
        "{}:{}:{}",
        kind.as_str(),
        partition_key,
        &hex::encode(digest)[..16]
    )
}

// ============================================================================
// Publisher
// ============================================================================

/// Enqueues events for the relay. Cheap to clone.
#[derive(Clone)]
pub struct EventPublisher {
    sender: mpsc::UnboundedSender<OutboundMessage>,
    routes: Arc<EventRoutes>,
}

impl EventPublisher {
    /// Create a publisher and the relay that drains it.
    pub fn channel(
        routes: EventRoutes,
        bus: Arc<dyn EventBus>,
        config: RelayConfig,
    ) -> (Self, EventRelay) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let publisher = Self {
            sender,
            routes: Arc::new(routes),
        };
        let relay = EventRelay {
            receiver,
            backlog: VecDeque::new(),
            bus,
            config,
        };
        (publisher, relay)
    }

    /// Encode an event into a bus message using the route for its kind.
    pub fn encode(&self, event: &JobEvent) -> Result<OutboundMessage, JobError> {
        let kind = event.kind();
        let route = self.routes.route(kind);
        let payload = route.codec.encode(event)?;
        let partition_key = event.partition_key();

        Ok(OutboundMessage {
            message_id: Uuid::now_v7(),
            subject: route.subject.clone(),
            idempotency_key: idempotency_key(kind, &partition_key, &payload),
            partition_key,
            content_type: route.codec.content_type(),
            payload,
        })
    }

    /// Hand an event to the relay. Returns once it is queued, not delivered.
    pub fn publish(&self, event: JobEvent) -> Result<(), JobError> {
        let message = self.encode(&event)?;

        debug!(
            event_type = event.kind().as_str(),
            key = %message.partition_key,
            message_id = %message.message_id,
            "Queued event"
        );

        self.sender
            .send(message)
            .map_err(|_| JobError::Bus("event relay is not running".to_string()))
    }
}

// ============================================================================
// Relay
// ============================================================================

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Attempts per message in one delivery round, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// Drains the outbound queue into the bus.
pub struct EventRelay {
    receiver: mpsc::UnboundedReceiver<OutboundMessage>,
    /// Received but not yet accepted by the bus, oldest first
    backlog: VecDeque<OutboundMessage>,
    bus: Arc<dyn EventBus>,
    config: RelayConfig,
}

impl EventRelay {
    /// Run until every publisher has been dropped, then make a last attempt
    /// at whatever is still held back.
    pub async fn run(mut self) {
        info!("Event relay started");
        loop {
            // `None` means the retry timer fired before anything new arrived
            let next = if self.backlog.is_empty() {
                Some(self.receiver.recv().await)
            } else {
                tokio::select! {
                    received = self.receiver.recv() => Some(received),
                    _ = tokio::time::sleep(self.config.max_backoff) => None,
                }
            };

            match next {
                Some(Some(message)) => {
                    self.backlog.push_back(message);
                    self.drain_backlog().await;
                }
                Some(None) => break,
                None => {
                    self.drain_backlog().await;
                }
            }
        }

        self.drain_backlog().await;
        if !self.backlog.is_empty() {
            error!(
                undelivered = self.backlog.len(),
                "Event relay stopped with undelivered events"
            );
        }
        info!("Event relay stopped");
    }

    /// Deliver everything queued so far, then return the number of messages
    /// the bus accepted. Messages the bus keeps refusing stay in the backlog
    /// for the next call.
    pub async fn run_until_idle(&mut self) -> usize {
        while let Ok(message) = self.receiver.try_recv() {
            self.backlog.push_back(message);
        }
        self.drain_backlog().await
    }

    /// Messages held back because the bus refused them.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    async fn drain_backlog(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(message) = self.backlog.front() {
            if !self.deliver(message).await {
                warn!(
                    held = self.backlog.len(),
                    "Bus unavailable, holding events for redelivery"
                );
                break;
            }
            self.backlog.pop_front();
            delivered += 1;
        }
        delivered
    }

    async fn deliver(&self, message: &OutboundMessage) -> bool {
        let mut backoff = self.config.initial_backoff;
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.bus.publish(message).await {
                Ok(()) => {
                    debug!(
                        subject = %message.subject,
                        key = %message.partition_key,
                        idempotency_key = %message.idempotency_key,
                        attempt,
                        "Published event"
                    );
                    return true;
                }
                Err(e) if attempt < max_attempts => {
                    warn!(
                        subject = %message.subject,
                        message_id = %message.message_id,
                        attempt,
                        error = %e,
                        "Publish failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.config.max_backoff);
                }
                Err(e) => {
                    error!(
                        subject = %message.subject,
                        message_id = %message.message_id,
                        idempotency_key = %message.idempotency_key,
                        attempts = attempt,
                        error = %e,
                        "Publish failed after exhausting retries"
                    );
                }
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{JobId, ScanId};
    use crate::domains::jobs::models::{Job, JobType, NewJob};
    use crate::kernel::nats::TestBus;

    fn job(id: i64) -> Job {
        let new_job = NewJob::builder()
            .job_type(JobType::Transfer)
            .machine("m1")
            .build();
        Job::submitted(JobId::from_i64(id), &new_job)
    }

    fn fast_config(max_attempts: u32) -> RelayConfig {
        RelayConfig {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn routes_job_and_scan_events_to_their_subjects() {
        let bus = Arc::new(TestBus::new());
        let (publisher, mut relay) = EventPublisher::channel(
            EventRoutes::json("jobs.events", "scans.events"),
            bus.clone(),
            fast_config(1),
        );

        publisher.publish(JobEvent::updated(&job(1))).unwrap();
        publisher
            .publish(JobEvent::scan_updated(ScanId::from_i64(7), vec![job(1)]))
            .unwrap();
        assert_eq!(relay.run_until_idle().await, 2);

        let messages = bus.published_messages();
        assert_eq!(messages[0].subject, "jobs.events");
        assert_eq!(messages[0].partition_key, "1");
        assert_eq!(messages[1].subject, "scans.events");
        assert_eq!(messages[1].partition_key, "7");
    }

    #[tokio::test]
    async fn retries_until_the_bus_accepts() {
        let bus = Arc::new(TestBus::new());
        bus.fail_next(2);
        let (publisher, mut relay) = EventPublisher::channel(
            EventRoutes::json("jobs.events", "scans.events"),
            bus.clone(),
            fast_config(3),
        );

        publisher.publish(JobEvent::updated(&job(1))).unwrap();
        assert_eq!(relay.run_until_idle().await, 1);
        assert_eq!(bus.attempt_count(), 3);
        assert_eq!(bus.publish_count(), 1);
    }

    #[tokio::test]
    async fn exhausted_message_is_held_and_redelivered_in_order() {
        let bus = Arc::new(TestBus::new());
        bus.fail_next(2);
        let (publisher, mut relay) = EventPublisher::channel(
            EventRoutes::json("jobs.events", "scans.events"),
            bus.clone(),
            fast_config(2),
        );

        publisher.publish(JobEvent::updated(&job(1))).unwrap();
        publisher.publish(JobEvent::updated(&job(2))).unwrap();
        assert_eq!(relay.run_until_idle().await, 0);
        assert_eq!(relay.backlog_len(), 2);
        assert_eq!(bus.publish_count(), 0);

        assert_eq!(relay.run_until_idle().await, 2);
        assert_eq!(relay.backlog_len(), 0);
        let keys: Vec<_> = bus
            .published_messages()
            .into_iter()
            .map(|m| m.partition_key)
            .collect();
        assert_eq!(keys, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn run_retries_the_backlog_before_stopping() {
        let bus = Arc::new(TestBus::new());
        bus.fail_next(1);
        let (publisher, relay) = EventPublisher::channel(
            EventRoutes::json("jobs.events", "scans.events"),
            bus.clone(),
            fast_config(1),
        );

        publisher.publish(JobEvent::updated(&job(1))).unwrap();
        publisher.publish(JobEvent::updated(&job(2))).unwrap();
        drop(publisher);
        relay.run().await;

        assert_eq!(bus.publish_count(), 2);
        assert_eq!(bus.published_messages()[0].partition_key, "1");
    }

    #[tokio::test]
    async fn run_returns_once_publishers_are_dropped() {
        let bus = Arc::new(TestBus::new());
        let (publisher, relay) = EventPublisher::channel(
            EventRoutes::json("jobs.events", "scans.events"),
            bus.clone(),
            fast_config(1),
        );

        publisher.publish(JobEvent::updated(&job(1))).unwrap();
        drop(publisher);
        relay.run().await;

        assert_eq!(bus.publish_count(), 1);
    }

    #[test]
    fn idempotency_key_is_stable_for_the_same_fact() {
        let (publisher, _relay) = EventPublisher::channel(
            EventRoutes::json("jobs.events", "scans.events"),
            Arc::new(TestBus::new()),
            RelayConfig::default(),
        );

        let a = publisher.encode(&JobEvent::updated(&job(1))).unwrap();
        let b = publisher.encode(&JobEvent::updated(&job(1))).unwrap();
        assert_eq!(a.idempotency_key, b.idempotency_key);
        assert_ne!(a.message_id, b.message_id);
        assert!(a.idempotency_key.starts_with("job.updated:1:"));

        let mut running = job(1);
        running.state = crate::domains::jobs::models::JobState::Running;
        let c = publisher.encode(&JobEvent::updated(&running)).unwrap();
        assert_ne!(a.idempotency_key, c.idempotency_key);
    }

    #[test]
    fn publish_fails_when_the_relay_is_gone() {
        let (publisher, relay) = EventPublisher::channel(
            EventRoutes::json("jobs.events", "scans.events"),
            Arc::new(TestBus::new()),
            RelayConfig::default(),
        );
        drop(relay);

        let err = publisher.publish(JobEvent::updated(&job(1))).unwrap_err();
        assert!(matches!(err, JobError::Bus(_)));
    }
}
