//! Cross-process pub/sub transport — exactly one publisher connection and
//! one subscriber connection per process.

use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use wms_core::WmsError;

use crate::envelope::{build_envelope, EventEnvelope, RealtimeEventType};

pub const CHANNEL: &str = "wms:events";

/// Owns the process's single Redis publisher connection plus the local
/// broadcast sender every in-process subscriber (`wms-realtime`,
/// `wms-workers`) reads from.
pub struct EventBus {
    publisher: ConnectionManager,
    local: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Connects the publisher side and prepares the local fan-out channel.
    /// `capacity` bounds how far a slow in-process subscriber can lag
    /// before it starts missing events.
    pub async fn connect(redis_url: &str, capacity: usize) -> Result<Self, WmsError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| WmsError::internal(format!("invalid redis url: {e}")))?;
        let publisher = ConnectionManager::new(client)
            .await
            .map_err(|e| WmsError::internal(format!("redis connect failed: {e}")))?;
        let (local, _rx) = broadcast::channel(capacity);
        Ok(Self { publisher, local })
    }

    /// Register another in-process consumer of published events.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.local.subscribe()
    }

    /// A clone of the local broadcast sender, for components (e.g.
    /// `wms-workers`) that need to publish without holding the bus itself.
    pub fn local_sender(&self) -> broadcast::Sender<EventEnvelope> {
        self.local.clone()
    }

    /// Publish an event to Redis. The process's own subscriber loop
    /// receives it back over the same channel and is the only path that
    /// feeds `local` — so every in-process handler sees each event exactly
    /// once, whether it originated here or in another process. Takes
    /// `&self`; `ConnectionManager` is cheaply `Clone` and multiplexes over
    /// one real connection, so concurrent publishers don't need exclusive
    /// access.
    pub async fn publish(
        &self,
        event_type: RealtimeEventType,
        payload: serde_json::Value,
    ) -> Result<(), WmsError> {
        let envelope = build_envelope(event_type, payload, None, Utc::now());
        let body = serde_json::to_string(&envelope)
            .map_err(|e| WmsError::internal(format!("envelope serialize failed: {e}")))?;

        let mut publisher = self.publisher.clone();
        publisher
            .publish::<_, _, ()>(CHANNEL, body)
            .await
            .map_err(|e| WmsError::internal(format!("redis publish failed: {e}")))?;
        Ok(())
    }
}

/// Spawn the process's single Redis subscriber connection: listens on
/// [`CHANNEL`], parses each message, and re-broadcasts it over `local` for
/// every in-process handler. A handler that errors on one event does not
/// affect delivery to the others or to future events; a
/// malformed message is logged and skipped rather than killing the loop.
pub fn spawn_subscriber(
    redis_url: String,
    local: broadcast::Sender<EventEnvelope>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match run_subscriber(&redis_url, &local).await {
                Ok(()) => break,
                Err(e) => {
                    error!(error = %e, "realtime subscriber connection lost, retrying in 1s");
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                }
            }
        }
    })
}

async fn run_subscriber(
    redis_url: &str,
    local: &broadcast::Sender<EventEnvelope>,
) -> Result<(), WmsError> {
    let client = redis::Client::open(redis_url)
        .map_err(|e| WmsError::internal(format!("invalid redis url: {e}")))?;
    let mut pubsub = client
        .get_async_pubsub()
        .await
        .map_err(|e| WmsError::internal(format!("redis pubsub connect failed: {e}")))?;
    pubsub
        .subscribe(CHANNEL)
        .await
        .map_err(|e| WmsError::internal(format!("redis subscribe failed: {e}")))?;

    info!(channel = CHANNEL, "subscribed to realtime event channel");

    let mut stream = pubsub.on_message();
    while let Some(msg) = futures_util::StreamExt::next(&mut stream).await {
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "dropping realtime message with non-utf8 payload");
                continue;
            }
        };
        match serde_json::from_str::<EventEnvelope>(&payload) {
            Ok(envelope) => {
                debug!(event_type = envelope.event_type.as_str(), "relaying realtime event");
                // No local listeners is not an error (process may be
                // mid-startup); any other lag is the receiver's problem.
                let _ = local.send(envelope);
            }
            Err(e) => {
                warn!(error = %e, "dropping malformed realtime message");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn channel_name_is_stable() {
        assert_eq!(CHANNEL, "wms:events");
    }

    #[tokio::test]
    async fn local_broadcast_round_trips() {
        let (tx, mut rx) = broadcast::channel(8);
        let envelope = build_envelope(
            RealtimeEventType::TaskUpdated,
            json!({"taskId": "t1"}),
            None,
            Utc::now(),
        );
        tx.send(envelope.clone()).unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type.as_str(), "TASK_UPDATED");
    }
}
