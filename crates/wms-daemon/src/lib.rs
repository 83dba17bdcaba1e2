//! The binary crate's library half: state, auth, routes, ingress, and the
//! queue consumer, split out so `tests/` (and `main.rs`) can compose them
//! without duplicating wiring.

pub mod auth;
pub mod error;
pub mod ingress;
pub mod queue_consumer;
pub mod routes;
pub mod state;

pub use state::AppState;
