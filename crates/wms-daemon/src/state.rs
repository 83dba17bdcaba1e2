//! Process-wide shared state, acquired at startup and released on
//! graceful shutdown; no lazy construction inside request paths.

use std::sync::Arc;

use sqlx::PgPool;
use wms_config::Settings;
use wms_events::EventBus;

use crate::auth::CredentialStore;

/// Cloneable (`Arc`-backed) handle every Axum handler receives via
/// `State<Arc<AppState>>`.
pub struct AppState {
    pub pool: PgPool,
    pub events: Arc<EventBus>,
    pub settings: Arc<Settings>,
    pub credentials: Arc<dyn CredentialStore>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        events: Arc<EventBus>,
        settings: Arc<Settings>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            pool,
            events,
            settings,
            credentials,
        }
    }
}
