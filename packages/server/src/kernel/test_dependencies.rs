// TestDependencies - in-memory wiring for tests
//
// Builds ServerDeps over the in-memory store and the recording bus, and keeps
// the relay so tests decide when queued events reach the bus.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::nats::TestBus;
use super::outbound::{EventPublisher, EventRelay, EventRoutes, RelayConfig};
use super::ServerDeps;
use crate::domains::jobs::store::InMemoryJobStore;

pub const TEST_JOB_SUBJECT: &str = "jobs.events";
pub const TEST_SCAN_SUBJECT: &str = "scans.events";

pub struct TestDependencies {
    pub store: Arc<InMemoryJobStore>,
    pub bus: Arc<TestBus>,
    relay: Mutex<EventRelay>,
    deps: ServerDeps,
}

impl TestDependencies {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryJobStore::new());
        let bus = Arc::new(TestBus::new());
        let config = RelayConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        };
        let (events, relay) = EventPublisher::channel(
            EventRoutes::json(TEST_JOB_SUBJECT, TEST_SCAN_SUBJECT),
            bus.clone(),
            config,
        );
        let deps = ServerDeps::new(store.clone(), events);

        Self {
            store,
            bus,
            relay: Mutex::new(relay),
            deps,
        }
    }

    pub fn deps(&self) -> &ServerDeps {
        &self.deps
    }

    /// Relay everything queued so far to the bus.
    pub async fn flush(&self) -> usize {
        self.relay.lock().await.run_until_idle().await
    }

    /// Flush, then decode every published payload in publish order.
    pub async fn published_events(&self) -> Vec<serde_json::Value> {
        self.flush().await;
        self.bus
            .published_messages()
            .iter()
            .filter_map(|msg| self.bus.deserialize_message(msg).ok())
            .collect()
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
