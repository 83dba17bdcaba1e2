//! Labor metrics aggregation and the `/api/labor/*` read queries.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use wms_core::metrics::{parse_wall_clock, shift_duration_seconds, utilization_percent};
use wms_core::{LaborDailyMetric, Page, PageParams, Task, WmsError};

#[derive(Debug, Clone, Default)]
pub struct AggregationCycleStats {
    pub date: NaiveDate,
    pub operators_processed: i64,
    pub inserted_count: i64,
    pub updated_count: i64,
    pub total_tasks_completed: i64,
    pub total_units_processed: i64,
    pub average_task_time_seconds: f64,
    pub average_utilization_percent: f64,
}

struct OperatorShift {
    id: Uuid,
    shift_start: String,
    shift_end: String,
}

struct CompletedStats {
    tasks_completed: i64,
    units_processed: i64,
    total_active_time_seconds: i64,
}

/// Run the full aggregation algorithm for date `date`, upserting one
/// row per operator inside a single transaction (the aggregator holds the
/// transaction across operator read, metrics query, and bulk upsert).
pub async fn aggregate_day(pool: &PgPool, date: NaiveDate) -> Result<AggregationCycleStats, WmsError> {
    let mut tx = pool.begin().await?;

    let operators: Vec<(Uuid, String, String)> = sqlx::query_as(
        r#"select id, to_char(shift_start, 'HH24:MI:SS'), to_char(shift_end, 'HH24:MI:SS') from operators"#,
    )
    .fetch_all(&mut *tx)
    .await?;
    let operators: Vec<OperatorShift> = operators
        .into_iter()
        .map(|(id, shift_start, shift_end)| OperatorShift {
            id,
            shift_start,
            shift_end,
        })
        .collect();

    let day_start: DateTime<Utc> = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
    let day_end: DateTime<Utc> = (date + chrono::Duration::days(1))
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();

    let mut stats = AggregationCycleStats {
        date,
        ..Default::default()
    };
    let mut utilization_sum = 0.0;
    let mut task_time_sum = 0.0;

    for op in &operators {
        let completed = completed_stats(&mut tx, op.id, day_start, day_end).await?;

        let start = parse_wall_clock(&op.shift_start)?;
        let end = parse_wall_clock(&op.shift_end)?;
        let shift_seconds = shift_duration_seconds(start, end);

        let avg_task_time = if completed.tasks_completed > 0 {
            completed.total_active_time_seconds as f64 / completed.tasks_completed as f64
        } else {
            0.0
        };
        let utilization = utilization_percent(completed.total_active_time_seconds, shift_seconds);

        let inserted = upsert_metric(
            &mut tx,
            op.id,
            date,
            completed.tasks_completed,
            completed.units_processed,
            avg_task_time,
            utilization,
        )
        .await?;

        if inserted {
            stats.inserted_count += 1;
        } else {
            stats.updated_count += 1;
        }
        stats.operators_processed += 1;
        stats.total_tasks_completed += completed.tasks_completed;
        stats.total_units_processed += completed.units_processed;
        utilization_sum += utilization;
        task_time_sum += avg_task_time;
    }

    tx.commit().await?;

    if stats.operators_processed > 0 {
        stats.average_utilization_percent = utilization_sum / stats.operators_processed as f64;
        stats.average_task_time_seconds = task_time_sum / stats.operators_processed as f64;
    }

    Ok(stats)
}

async fn completed_stats(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    operator_id: Uuid,
    day_start: DateTime<Utc>,
    day_end: DateTime<Utc>,
) -> Result<CompletedStats, WmsError> {
    let row: (i64, Option<i64>, Option<i64>) = sqlx::query_as(
        r#"
        with completed as (
            select t.id, t.actual_duration_seconds, t.started_at, t.completed_at
            from tasks t
            where t.assigned_operator_id = $1
              and t.status = 'completed'
              and t.completed_at >= $2
              and t.completed_at < $3
        )
        select
            (select count(*) from completed) as tasks_completed,
            (select coalesce(sum(coalesce(
                 actual_duration_seconds,
                 greatest(0, extract(epoch from (completed_at - started_at))::bigint)
             )), 0) from completed) as total_active_time,
            (select coalesce(sum(tl.quantity), 0)
               from task_lines tl
               join completed c on c.id = tl.task_id) as units_processed
        "#,
    )
    .bind(operator_id)
    .bind(day_start)
    .bind(day_end)
    .fetch_one(&mut **tx)
    .await?;

    Ok(CompletedStats {
        tasks_completed: row.0,
        total_active_time_seconds: row.1.unwrap_or(0),
        units_processed: row.2.unwrap_or(0),
    })
}

/// `ON CONFLICT (operator, date) DO UPDATE` over all four metric columns.
/// Returns `true` when the row was freshly inserted (`xmax = 0`), `false`
/// when an existing row was updated.
async fn upsert_metric(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    operator_id: Uuid,
    date: NaiveDate,
    tasks_completed: i64,
    units_processed: i64,
    avg_task_time_seconds: f64,
    utilization_percent: f64,
) -> Result<bool, WmsError> {
    let (inserted,): (bool,) = sqlx::query_as(
        r#"
        insert into labor_daily_metrics
            (operator_id, metric_date, tasks_completed, units_processed,
             avg_task_time_seconds, utilization_percent)
        values ($1, $2, $3, $4, $5, $6)
        on conflict (operator_id, metric_date) do update
            set tasks_completed = excluded.tasks_completed,
                units_processed = excluded.units_processed,
                avg_task_time_seconds = excluded.avg_task_time_seconds,
                utilization_percent = excluded.utilization_percent
        returning (xmax = 0) as inserted
        "#,
    )
    .bind(operator_id)
    .bind(date)
    .bind(tasks_completed)
    .bind(units_processed)
    .bind(avg_task_time_seconds)
    .bind(utilization_percent)
    .fetch_one(&mut **tx)
    .await?;
    Ok(inserted)
}

// ---------------------------------------------------------------------
// `/api/labor/*` read queries
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct LaborOverview {
    pub date: NaiveDate,
    pub task_counts_by_status: Vec<(String, i64)>,
    pub average_tasks_completed: f64,
    pub average_units_processed: f64,
    pub average_task_time_seconds: f64,
    pub average_utilization_percent: f64,
}

pub async fn labor_overview(pool: &PgPool, date: NaiveDate) -> Result<LaborOverview, WmsError> {
    let task_counts_by_status: Vec<(String, i64)> =
        sqlx::query_as(r#"select status, count(*) from tasks group by status"#)
            .fetch_all(pool)
            .await?;

    let row: (Option<f64>, Option<f64>, Option<f64>, Option<f64>) = sqlx::query_as(
        r#"
        select avg(tasks_completed)::float8, avg(units_processed)::float8,
               avg(avg_task_time_seconds), avg(utilization_percent)
        from labor_daily_metrics
        where metric_date = $1
        "#,
    )
    .bind(date)
    .fetch_one(pool)
    .await?;

    Ok(LaborOverview {
        date,
        task_counts_by_status,
        average_tasks_completed: row.0.unwrap_or(0.0),
        average_units_processed: row.1.unwrap_or(0.0),
        average_task_time_seconds: row.2.unwrap_or(0.0),
        average_utilization_percent: row.3.unwrap_or(0.0),
    })
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct OperatorPerformanceRow {
    pub operator_id: Uuid,
    pub operator_name: String,
    pub metric: Option<LaborDailyMetric>,
    pub active_task: Option<Task>,
}

/// Per-operator daily metrics plus the current active task, chosen by
/// status priority (`in_progress` > `assigned` > `paused`) then task
/// priority.
pub async fn operator_performance(
    pool: &PgPool,
    date: NaiveDate,
    page: PageParams,
) -> Result<Page<OperatorPerformanceRow>, WmsError> {
    let total: i64 = sqlx::query_scalar("select count(*) from operators").fetch_one(pool).await?;

    let operators: Vec<(Uuid, String)> = sqlx::query_as(
        r#"select id, name from operators order by created_at asc limit $1 offset $2"#,
    )
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let mut items = Vec::with_capacity(operators.len());
    for (operator_id, operator_name) in operators {
        let metric: Option<LaborDailyMetric> = sqlx::query_as(
            r#"
            select operator_id, metric_date, tasks_completed, units_processed,
                   avg_task_time_seconds, utilization_percent
            from labor_daily_metrics
            where operator_id = $1 and metric_date = $2
            "#,
        )
        .bind(operator_id)
        .bind(date)
        .fetch_optional(pool)
        .await?;

        let active_task: Option<Task> = sqlx::query_as(
            r#"
            select id, task_type, priority, status, zone_id, assigned_operator_id,
                   source_document_id, estimated_duration_seconds, actual_duration_seconds,
                   version, started_at, completed_at, created_at, updated_at
            from tasks
            where assigned_operator_id = $1
              and status in ('assigned', 'in_progress', 'paused')
            order by
                case status
                    when 'in_progress' then 0
                    when 'assigned' then 1
                    when 'paused' then 2
                    else 3
                end,
                priority desc
            limit 1
            "#,
        )
        .bind(operator_id)
        .fetch_optional(pool)
        .await?;

        items.push(OperatorPerformanceRow {
            operator_id,
            operator_name,
            metric,
            active_task,
        });
    }

    Ok(Page {
        items,
        page: page.page,
        limit: page.limit,
        total,
    })
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct ZoneWorkloadRow {
    pub zone_id: i64,
    pub zone_code: String,
    pub status: String,
    pub task_count: i64,
    pub average_priority: f64,
}

pub async fn zone_workload(
    pool: &PgPool,
    warehouse_id: Option<i64>,
    page: PageParams,
) -> Result<Page<ZoneWorkloadRow>, WmsError> {
    let total: i64 = sqlx::query_scalar(
        r#"
        select count(*) from (
            select distinct z.id, t.status
            from zones z
            join tasks t on t.zone_id = z.id
            where ($1::bigint is null or z.warehouse_id = $1)
        ) s
        "#,
    )
    .bind(warehouse_id)
    .fetch_one(pool)
    .await?;

    let items = sqlx::query_as(
        r#"
        select z.id as zone_id, z.code as zone_code, t.status,
               count(*) as task_count, avg(t.priority)::float8 as average_priority
        from zones z
        join tasks t on t.zone_id = z.id
        where ($1::bigint is null or z.warehouse_id = $1)
        group by z.id, z.code, t.status
        order by z.id asc, t.status asc
        limit $2 offset $3
        "#,
    )
    .bind(warehouse_id)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok(Page {
        items,
        page: page.page,
        limit: page.limit,
        total,
    })
}
