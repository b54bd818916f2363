//! Server dependencies for activities (using traits for testability)
//!
//! This module provides the dependency container used by the job activities.
//! Persistence and the event bus sit behind traits so tests can swap in the
//! in-memory store and the recording bus.

use std::sync::Arc;

use crate::domains::jobs::linker::ScanLinker;
use crate::domains::jobs::store::JobStore;
use crate::kernel::outbound::EventPublisher;

/// Dependencies accessible to activities
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn JobStore>,
    /// Outbound event queue; delivery happens on the relay task
    pub events: EventPublisher,
}

impl ServerDeps {
    pub fn new(store: Arc<dyn JobStore>, events: EventPublisher) -> Self {
        Self { store, events }
    }

    pub fn linker(&self) -> ScanLinker {
        ScanLinker::new(self.store.clone())
    }
}
