//! Task-generation queue consumer.
//! Claims ready jobs, runs the generation service, and acks or backs off.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{error, info, warn};

use wms_core::generation::GenerationDefaults;
use wms_db::generation as db_generation;

const MAX_ATTEMPTS: i32 = 5;
const BATCH_SIZE: i64 = 20;
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Spawns the consumer loop: poll for ready jobs, process each one, sleep
/// briefly when the queue is empty. A job exhausting `MAX_ATTEMPTS` is
/// left `failed` for operator inspection rather than retried forever.
pub fn spawn(
    pool: PgPool,
    defaults: GenerationDefaults,
    worker_id: String,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let claimed = match db_generation::claim_batch(&pool, BATCH_SIZE, &worker_id).await {
                Ok(jobs) => jobs,
                Err(e) => {
                    error!(error = %e, "failed to claim task-generation queue batch");
                    Vec::new()
                }
            };

            if claimed.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(POLL_INTERVAL) => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
                continue;
            }

            for job in claimed {
                process_job(&pool, defaults, job).await;
            }
        }
    })
}

async fn process_job(pool: &PgPool, defaults: GenerationDefaults, job: db_generation::QueueJob) {
    let now = Utc::now();
    match db_generation::generate_from_event(pool, &job.payload, now, defaults).await {
        Ok(outcome) => {
            if let Err(e) = db_generation::mark_done(pool, &job.job_id).await {
                error!(job_id = %job.job_id, error = %e, "failed to mark queue job done");
                return;
            }
            if outcome.skipped {
                info!(job_id = %job.job_id, "task-generation job skipped: duplicate event");
            } else {
                info!(
                    job_id = %job.job_id,
                    tasks_created = outcome.tasks.len(),
                    "task-generation job processed"
                );
            }
        }
        Err(e) => {
            let attempts = job.attempts + 1;
            warn!(
                job_id = %job.job_id,
                attempts,
                error = %e,
                "task-generation job failed, backing off"
            );
            if let Err(mark_err) = db_generation::mark_retry_or_failed(
                pool,
                &job.job_id,
                attempts,
                &e.to_string(),
                MAX_ATTEMPTS,
            )
            .await
            {
                error!(job_id = %job.job_id, error = %mark_err, "failed to record queue job failure");
            }
        }
    }
}
