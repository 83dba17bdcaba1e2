//! Process-wide realtime state: the JWT secret, the presence registry,
//! and the local broadcast sender events are read from. Acquired at
//! startup and released on graceful shutdown; no lazy construction
//! inside request paths.

use std::sync::Arc;

use tokio::sync::broadcast;
use wms_events::EventEnvelope;

use crate::presence::PresenceRegistry;

#[derive(Clone)]
pub struct RealtimeState {
    /// `None` when unconfigured; every socket upgrade then fails closed
    /// with `UNAUTHORIZED`.
    pub jwt_secret: Option<Arc<String>>,
    pub presence: Arc<PresenceRegistry>,
    pub events: broadcast::Sender<EventEnvelope>,
}

impl RealtimeState {
    pub fn new(jwt_secret: Option<String>, events: broadcast::Sender<EventEnvelope>) -> Self {
        Self {
            jwt_secret: jwt_secret.map(Arc::new),
            presence: Arc::new(PresenceRegistry::new()),
            events,
        }
    }
}
