//! Task generation service and the durable task-generation queue.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use wms_core::generation::{group_by_zone, normalize_event, GenerationDefaults, TaskSpec};
use wms_core::{Task, TaskLine, TaskLineStatus, TaskWithLines, WmsError};

use crate::zones::load_zone_map;

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub skipped: bool,
    pub reason: Option<String>,
    pub tasks: Vec<TaskWithLines>,
}

/// Run the full generation service: normalize, idempotency-insert, zone-resolve,
/// insert tasks+lines, all inside a single transaction.
pub async fn generate_from_event(
    pool: &PgPool,
    raw_payload: &Value,
    now: DateTime<Utc>,
    defaults: GenerationDefaults,
) -> Result<GenerationOutcome, WmsError> {
    let event = normalize_event(raw_payload, now)?;

    let mut tx = pool.begin().await?;

    let inserted: Option<(Uuid,)> = sqlx::query_as(
        r#"
        insert into task_generation_events (event_key, event_type, source_document_id, payload)
        values ($1, $2, $3, $4)
        on conflict (event_key) do nothing
        returning id
        "#,
    )
    .bind(&event.event_key)
    .bind(event.event_type.as_str())
    .bind(&event.source_document_id)
    .bind(raw_payload)
    .fetch_optional(&mut *tx)
    .await?;

    if inserted.is_none() {
        tx.commit().await?;
        return Ok(GenerationOutcome {
            skipped: true,
            reason: Some("duplicate_event".to_string()),
            tasks: Vec::new(),
        });
    }

    let mut location_ids: Vec<i64> = event
        .lines
        .iter()
        .flat_map(|l| [l.from_location_id, l.to_location_id])
        .flatten()
        .collect();
    location_ids.sort_unstable();
    location_ids.dedup();

    let zone_map = load_zone_map(&mut *tx, &location_ids).await?;
    let specs = group_by_zone(&event, &zone_map, now, defaults)?;

    let mut tasks = Vec::with_capacity(specs.len());
    for spec in &specs {
        tasks.push(insert_task_spec(&mut tx, spec).await?);
    }

    tx.commit().await?;

    Ok(GenerationOutcome {
        skipped: false,
        reason: None,
        tasks,
    })
}

async fn insert_task_spec(
    tx: &mut Transaction<'_, Postgres>,
    spec: &TaskSpec,
) -> Result<TaskWithLines, WmsError> {
    let task: Task = sqlx::query_as(
        r#"
        insert into tasks (
            task_type, priority, status, zone_id, source_document_id,
            estimated_duration_seconds, version
        ) values ($1, $2, 'created', $3, $4, $5, 1)
        returning id, task_type, priority, status, zone_id, assigned_operator_id,
                  source_document_id, estimated_duration_seconds, actual_duration_seconds,
                  version, started_at, completed_at, created_at, updated_at
        "#,
    )
    .bind(spec.task_type.as_str())
    .bind(spec.priority)
    .bind(spec.zone_id)
    .bind(&spec.source_document_id)
    .bind(spec.estimated_duration_seconds)
    .fetch_one(&mut **tx)
    .await?;

    let mut lines = Vec::with_capacity(spec.lines.len());
    for line in &spec.lines {
        let row: TaskLine = sqlx::query_as(
            r#"
            insert into task_lines (task_id, sku_id, from_location_id, to_location_id, quantity, status)
            values ($1, $2, $3, $4, $5, $6)
            returning id, task_id, sku_id, from_location_id, to_location_id, quantity, status
            "#,
        )
        .bind(task.id)
        .bind(line.sku_id)
        .bind(line.from_location_id)
        .bind(line.to_location_id)
        .bind(line.quantity)
        .bind(line_status_str(line.status))
        .fetch_one(&mut **tx)
        .await?;
        lines.push(row);
    }

    Ok(TaskWithLines { task, lines })
}

fn line_status_str(s: TaskLineStatus) -> &'static str {
    match s {
        TaskLineStatus::Created => "created",
        TaskLineStatus::InProgress => "in_progress",
        TaskLineStatus::Completed => "completed",
        TaskLineStatus::Cancelled => "cancelled",
        TaskLineStatus::Failed => "failed",
    }
}

// ---------------------------------------------------------------------
// Durable task-generation queue (order-event ingress -> queue -> consumer)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueueJob {
    pub job_id: String,
    pub payload: Value,
    pub attempts: i32,
}

/// Enqueue a normalized-event payload under `job_id = eventKey`. A
/// duplicate job id is a no-op here — the
/// generation service's own idempotency check is the real dedup guard.
pub async fn enqueue(pool: &PgPool, job_id: &str, payload: &Value) -> Result<bool, WmsError> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        insert into task_generation_queue (job_id, payload)
        values ($1, $2)
        on conflict (job_id) do nothing
        returning job_id
        "#,
    )
    .bind(job_id)
    .bind(payload)
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}

/// Claim up to `batch_size` ready jobs using `FOR UPDATE SKIP LOCKED`, the
/// same idiom the assignment worker uses for candidate tasks.
pub async fn claim_batch(
    pool: &PgPool,
    batch_size: i64,
    worker_id: &str,
) -> Result<Vec<QueueJob>, WmsError> {
    let rows = sqlx::query_as(
        r#"
        with to_claim as (
            select job_id
            from task_generation_queue
            where status = 'pending' and next_attempt_at <= now()
            order by created_at asc
            limit $1
            for update skip locked
        )
        update task_generation_queue
           set status = 'claimed', claimed_by = $2, claimed_at = now(), updated_at = now()
         where job_id in (select job_id from to_claim)
        returning job_id, payload, attempts
        "#,
    )
    .bind(batch_size)
    .bind(worker_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn mark_done(pool: &PgPool, job_id: &str) -> Result<(), WmsError> {
    sqlx::query(
        r#"update task_generation_queue set status = 'done', updated_at = now() where job_id = $1"#,
    )
    .bind(job_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Back off the job with exponential delay (base 1s); after
/// the 5th attempt the job is left `failed` for operator inspection rather
/// than rescheduled.
pub async fn mark_retry_or_failed(
    pool: &PgPool,
    job_id: &str,
    attempts: i32,
    error: &str,
    max_attempts: i32,
) -> Result<(), WmsError> {
    if attempts >= max_attempts {
        sqlx::query(
            r#"
            update task_generation_queue
               set status = 'failed', last_error = $2, updated_at = now()
             where job_id = $1
            "#,
        )
        .bind(job_id)
        .bind(error)
        .execute(pool)
        .await?;
        return Ok(());
    }

    let backoff_seconds = 1i64 << attempts.max(0).min(30);
    sqlx::query(
        r#"
        update task_generation_queue
           set status = 'pending',
               attempts = $2,
               last_error = $3,
               next_attempt_at = now() + make_interval(secs => $4),
               claimed_by = null,
               claimed_at = null,
               updated_at = now()
         where job_id = $1
        "#,
    )
    .bind(job_id)
    .bind(attempts)
    .bind(error)
    .bind(backoff_seconds as f64)
    .execute(pool)
    .await?;
    Ok(())
}

/// Job counts by status, for `wms db queue status`.
pub async fn queue_status_counts(pool: &PgPool) -> Result<Vec<(String, i64)>, WmsError> {
    let rows = sqlx::query_as(
        r#"select status, count(*) from task_generation_queue group by status order by status"#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn requeue(pool: &PgPool, job_id: &str) -> Result<(), WmsError> {
    sqlx::query(
        r#"
        update task_generation_queue
           set status = 'pending', next_attempt_at = now(), claimed_by = null, claimed_at = null,
               updated_at = now()
         where job_id = $1
        "#,
    )
    .bind(job_id)
    .execute(pool)
    .await?;
    Ok(())
}
