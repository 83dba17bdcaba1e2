//! Order-event ingress for `POST /api/order-events`: normalize the raw
//! payload just far enough to derive its idempotency key, then hand it to
//! the durable queue. The heavier generation work runs in the queue
//! consumer, not on the request path.

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;

use wms_core::generation::normalize_event;
use wms_core::WmsError;
use wms_db::generation as db_generation;

pub const QUEUE_NAME: &str = "task-generation";

#[derive(Debug, Clone, serde::Serialize)]
pub struct IngressAccepted {
    pub accepted: bool,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(rename = "sourceDocumentId")]
    pub source_document_id: String,
    #[serde(rename = "eventKey")]
    pub event_key: String,
    #[serde(rename = "queueName")]
    pub queue_name: String,
    #[serde(rename = "jobId")]
    pub job_id: String,
}

/// Normalize `raw_payload` and enqueue it under
/// `job_id = eventKey`, which gives the durable queue its own dedup guard. A duplicate `eventKey` is accepted again here —
/// the queue's own `ON CONFLICT DO NOTHING` makes re-enqueueing a no-op,
/// and the generation service's idempotency check is the authoritative
/// dedup guard.
pub async fn accept_order_event(pool: &PgPool, raw_payload: Value) -> Result<IngressAccepted, WmsError> {
    let now = Utc::now();
    let normalized = normalize_event(&raw_payload, now)?;

    db_generation::enqueue(pool, &normalized.event_key, &raw_payload).await?;

    Ok(IngressAccepted {
        accepted: true,
        event_type: normalized.event_type.as_str().to_string(),
        source_document_id: normalized.source_document_id,
        job_id: normalized.event_key.clone(),
        event_key: normalized.event_key,
        queue_name: QUEUE_NAME.to_string(),
    })
}
