// Scan Job Lifecycle Service - API Core
//
// Tracks transfer, count and streaming jobs run against scan acquisitions and
// publishes every meaningful change to the event bus.
//
// Domain logic lives in domains/jobs; kernel/ holds the bus, the outbound
// event queue and the dependency container; server/ is the HTTP surface.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
