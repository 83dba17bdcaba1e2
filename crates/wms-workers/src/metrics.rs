//! Scheduled labor metrics aggregator.

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use sqlx::PgPool;
use tracing::{error, info};

use wms_db::metrics as db_metrics;

/// Computes the next run instant for a daily job at wall-clock
/// `hour:minute` local time: if that time has already passed today,
/// advance by 24h.
pub fn next_run_at(now: DateTime<Local>, hour: u32, minute: u32) -> DateTime<Local> {
    let candidate = now
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .expect("hour/minute must be in range");
    let candidate = Local
        .from_local_datetime(&candidate)
        .single()
        .unwrap_or(now);
    if candidate > now {
        candidate
    } else {
        candidate + chrono::Duration::days(1)
    }
}

/// Spawns the daily aggregator loop. Sleeps until the next configured
/// run instant, runs one cycle for "yesterday" relative to that instant
/// (the just-completed local day), logs its stats, and reschedules.
/// Shutdown cancels a pending sleep immediately; an in-flight cycle is
/// always awaited to completion.
pub fn spawn(
    pool: PgPool,
    hour: u32,
    minute: u32,
    run_on_startup: bool,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if run_on_startup {
            let date = Local::now().date_naive();
            run_and_log(&pool, date).await;
        }

        loop {
            let now = Local::now();
            let next = next_run_at(now, hour, minute);
            let sleep_for = (next - now).to_std().unwrap_or(Duration::from_secs(0));

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            // Aggregate the day that just completed at the run instant.
            let date = next.date_naive();
            run_and_log(&pool, date).await;
        }
    })
}

async fn run_and_log(pool: &PgPool, date: NaiveDate) {
    match db_metrics::aggregate_day(pool, date).await {
        Ok(stats) => info!(
            date = %stats.date,
            operators_processed = stats.operators_processed,
            inserted = stats.inserted_count,
            updated = stats.updated_count,
            total_tasks_completed = stats.total_tasks_completed,
            "metrics aggregation cycle complete"
        ),
        Err(e) => error!(error = %e, %date, "metrics aggregation cycle failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_a_day_when_target_time_already_passed() {
        let now = Local.with_ymd_and_hms(2026, 3, 1, 23, 59, 30).unwrap();
        let next = next_run_at(now, 23, 59);
        assert_eq!(next.date_naive(), now.date_naive() + chrono::Duration::days(1));
    }

    #[test]
    fn keeps_today_when_target_time_still_ahead() {
        let now = Local.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let next = next_run_at(now, 23, 59);
        assert_eq!(next.date_naive(), now.date_naive());
    }
}
