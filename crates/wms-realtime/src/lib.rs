//! Authenticated, room-scoped realtime sockets.
//!
//! Built on axum's native WebSocket upgrade, with per-room fan-out driven
//! by JWT claims rather than one broadcast stream for every client.

pub mod auth;
pub mod policy;
pub mod presence;
pub mod presence_events;
pub mod socket;
pub mod state;

pub use auth::Identity;
pub use presence::PresenceRegistry;
pub use socket::build_router;
pub use state::RealtimeState;
