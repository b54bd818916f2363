//! Kernel module - server infrastructure and dependencies.

pub mod codec;
pub mod deps;
pub mod nats;
pub mod outbound;
pub mod test_dependencies;

pub use codec::{EventCodec, JsonCodec};
pub use deps::ServerDeps;
pub use nats::{EventBus, NatsEventBus, OutboundMessage, TestBus};
pub use outbound::{EventPublisher, EventRelay, EventRoutes, RelayConfig, Route};
pub use test_dependencies::TestDependencies;
