//! Event codecs.
//!
//! Each event kind is bound to a codec when the publisher is built (see
//! `EventRoutes`); there is no process-wide registry.

use bytes::Bytes;

use crate::domains::jobs::events::JobEvent;

pub trait EventCodec: Send + Sync {
    fn content_type(&self) -> &'static str;

    fn encode(&self, event: &JobEvent) -> Result<Bytes, serde_json::Error>;
}

/// Compact JSON. Non-finite float params (NaN, ±inf) are written as `null`
/// rather than failing the whole event.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl EventCodec for JsonCodec {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode(&self, event: &JobEvent) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(event).map(Bytes::from)
    }
}
