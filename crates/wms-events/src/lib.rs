//! Realtime event envelope and cross-process pub/sub transport
//! realtime surface.
//!
//! The envelope/validation half is pure; the transport half owns exactly
//! one publisher connection and one subscriber connection per process
//! fanning received events out to every
//! in-process handler over a local broadcast channel.

pub mod envelope;
pub mod transport;

pub use envelope::{parse_envelope, EventEnvelope, RealtimeEventType};
pub use transport::{spawn_subscriber, EventBus};
