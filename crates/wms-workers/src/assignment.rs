//! Periodic assignment loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use tracing::{error, info};

use wms_core::WmsError;
use wms_db::tasks as db_tasks;
use wms_events::{EventBus, RealtimeEventType};

#[derive(Debug, Clone, Default)]
pub struct AssignmentCycleStats {
    pub scanned: i64,
    pub assigned: i64,
    pub unassigned: i64,
    pub available_operators: i64,
    pub realtime_publish_failures: i64,
    pub duration_ms: i64,
}

/// Runs one assignment cycle: claim a batch of `created` candidates,
/// assign each to the best available operator in its zone
/// steps 3-4), publishing `TASK_ASSIGNED`/`TASK_UPDATED` for every
/// success. An operator with no eligible candidate, or a task that lost
/// the race to a manual assignment this cycle, counts toward
/// `unassigned` — not an error.
pub async fn run_cycle(
    pool: &PgPool,
    events: &EventBus,
    batch_size: i64,
) -> Result<AssignmentCycleStats, WmsError> {
    let started = std::time::Instant::now();
    let mut stats = AssignmentCycleStats::default();
    let mut tx = pool.begin().await?;

    stats.available_operators = db_tasks::count_available_operators(&mut *tx).await?;

    let candidates = db_tasks::claim_assignment_candidates(&mut tx, batch_size).await?;
    stats.scanned = candidates.len() as i64;

    let mut assigned = Vec::new();

    for task in candidates {
        let operator = db_tasks::find_and_lock_best_operator(&mut tx, task.zone_id).await?;
        let Some(operator) = operator else {
            stats.unassigned += 1;
            continue;
        };

        let now = Utc::now();
        match db_tasks::assign_task(&mut tx, task.id, operator.id, now).await? {
            Some(updated) => {
                stats.assigned += 1;
                assigned.push(json!({
                    "taskId": updated.id,
                    "operatorId": operator.id,
                    "zoneId": updated.zone_id,
                    "status": updated.status.as_str(),
                    "version": updated.version,
                }));
            }
            None => stats.unassigned += 1,
        }
    }

    tx.commit().await?;

    // Publish only after commit. Publish failures are counted and logged;
    // they never roll the transaction back.
    for payload in assigned {
        if let Err(e) = events.publish(RealtimeEventType::TaskAssigned, payload.clone()).await {
            error!(error = %e, "failed to publish TASK_ASSIGNED");
            stats.realtime_publish_failures += 1;
        }
        if let Err(e) = events.publish(RealtimeEventType::TaskUpdated, payload).await {
            error!(error = %e, "failed to publish TASK_UPDATED");
            stats.realtime_publish_failures += 1;
        }
    }

    stats.duration_ms = started.elapsed().as_millis() as i64;
    Ok(stats)
}

/// Spawns the assignment loop: on a fixed interval, skip the tick if the
/// previous cycle is still running, otherwise run one cycle and log its
/// stats. A failed cycle is logged and does not halt the loop.
pub fn spawn(
    pool: PgPool,
    events: Arc<EventBus>,
    interval: Duration,
    batch_size: i64,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let running = Arc::new(tokio::sync::Mutex::new(()));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Ok(_guard) = running.clone().try_lock_owned() else {
                        info!("previous assignment cycle still running, skipping this tick");
                        continue;
                    };
                    match run_cycle(&pool, &events, batch_size).await {
                        Ok(stats) => info!(
                            scanned = stats.scanned,
                            assigned = stats.assigned,
                            unassigned = stats.unassigned,
                            available_operators = stats.available_operators,
                            realtime_publish_failures = stats.realtime_publish_failures,
                            duration_ms = stats.duration_ms,
                            "assignment cycle complete"
                        ),
                        Err(e) => error!(error = %e, "assignment cycle failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
