//! Task state machine persistence and the assignment worker's
//! candidate/operator queries.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use wms_core::{
    validate_transition, Operator, Page, PageParams, Task, TaskDetail, TaskLineDetail,
    TaskStatus, TaskStatusAuditRow, WmsError, ZoneSummary,
};

/// `SELECT ... FOR UPDATE` the task row. Returns `NotFound` if the row doesn't exist.
pub async fn lock_task_for_update(
    tx: &mut Transaction<'_, Postgres>,
    task_id: Uuid,
) -> Result<Task, WmsError> {
    sqlx::query_as(
        r#"
        select id, task_type, priority, status, zone_id, assigned_operator_id,
               source_document_id, estimated_duration_seconds, actual_duration_seconds,
               version, started_at, completed_at, created_at, updated_at
        from tasks
        where id = $1
        for update
        "#,
    )
    .bind(task_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| WmsError::not_found(format!("task {task_id} not found")))
}

#[derive(Debug, Clone, Copy)]
pub struct UpdateStatusArgs {
    pub task_id: Uuid,
    pub new_status: TaskStatus,
    pub expected_version: Option<i64>,
    pub changed_by_operator_id: Option<Uuid>,
}

/// The full `updateStatus` contract: lock, version-check, transition-
/// check, mutate timestamps/duration, bump version, audit, commit. Returns
/// the task row as it exists after the update.
pub async fn update_status(
    pool: &PgPool,
    args: UpdateStatusArgs,
    now: DateTime<Utc>,
) -> Result<Task, WmsError> {
    let mut tx = pool.begin().await?;

    let current = lock_task_for_update(&mut tx, args.task_id).await?;

    if let Some(expected) = args.expected_version {
        if expected != current.version {
            return Err(WmsError::conflict(format!(
                "expected version {expected}, current version is {}",
                current.version
            )));
        }
    }

    validate_transition(current.status, args.new_status)
        .map_err(|e| WmsError::conflict(e.to_string()))?;

    let started_at = if args.new_status == TaskStatus::InProgress && current.started_at.is_none() {
        Some(now)
    } else {
        current.started_at
    };

    let completed_at = if args.new_status == TaskStatus::Completed {
        Some(now)
    } else {
        current.completed_at
    };

    let actual_duration_seconds = if args.new_status == TaskStatus::Completed {
        match started_at {
            Some(start) => Some((now - start).num_seconds().max(0)),
            None => current.actual_duration_seconds,
        }
    } else {
        current.actual_duration_seconds
    };

    let updated: Option<Task> = sqlx::query_as(
        r#"
        update tasks
           set status = $1,
               started_at = $2,
               completed_at = $3,
               actual_duration_seconds = $4,
               version = version + 1,
               updated_at = $5
         where id = $6 and version = $7
        returning id, task_type, priority, status, zone_id, assigned_operator_id,
                  source_document_id, estimated_duration_seconds, actual_duration_seconds,
                  version, started_at, completed_at, created_at, updated_at
        "#,
    )
    .bind(args.new_status.as_str())
    .bind(started_at)
    .bind(completed_at)
    .bind(actual_duration_seconds)
    .bind(now)
    .bind(args.task_id)
    .bind(current.version)
    .fetch_optional(&mut *tx)
    .await?;

    // Zero rows affected means a racing writer got there first between the
    // lock and the predicated update — surfaced as the same conflict class
    // as an explicit version mismatch.
    let updated = updated.ok_or_else(|| WmsError::conflict("task was concurrently modified"))?;

    insert_audit_row(
        &mut tx,
        args.task_id,
        Some(current.status),
        args.new_status,
        updated.version,
        args.changed_by_operator_id,
        now,
    )
    .await?;

    tx.commit().await?;
    Ok(updated)
}

pub async fn insert_audit_row(
    tx: &mut Transaction<'_, Postgres>,
    task_id: Uuid,
    previous_status: Option<TaskStatus>,
    new_status: TaskStatus,
    resulting_version: i64,
    changed_by_operator_id: Option<Uuid>,
    changed_at: DateTime<Utc>,
) -> Result<(), WmsError> {
    sqlx::query(
        r#"
        insert into task_status_audit
            (task_id, previous_status, new_status, resulting_version, changed_by_operator_id, changed_at)
        values ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(task_id)
    .bind(previous_status.map(TaskStatus::as_str))
    .bind(new_status.as_str())
    .bind(resulting_version)
    .bind(changed_by_operator_id)
    .bind(changed_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn audit_trail(pool: &PgPool, task_id: Uuid) -> Result<Vec<TaskStatusAuditRow>, WmsError> {
    let rows = sqlx::query_as(
        r#"
        select id, task_id, previous_status, new_status, resulting_version,
               changed_by_operator_id, changed_at
        from task_status_audit
        where task_id = $1
        order by changed_at asc, id asc
        "#,
    )
    .bind(task_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_detail(pool: &PgPool, task_id: Uuid) -> Result<TaskDetail, WmsError> {
    let task: Task = sqlx::query_as(
        r#"
        select id, task_type, priority, status, zone_id, assigned_operator_id,
               source_document_id, estimated_duration_seconds, actual_duration_seconds,
               version, started_at, completed_at, created_at, updated_at
        from tasks
        where id = $1
        "#,
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| WmsError::not_found(format!("task {task_id} not found")))?;

    let zone: ZoneSummary = sqlx::query_as(
        r#"select id, code, name, warehouse_id from zones where id = $1"#,
    )
    .bind(task.zone_id)
    .fetch_one(pool)
    .await?;

    let lines: Vec<TaskLineDetail> = sqlx::query_as(
        r#"
        select tl.id, tl.task_id, tl.sku_id, p.sku, p.name as product_name,
               tl.from_location_id, fl.code as from_location_code,
               tl.to_location_id, tol.code as to_location_code,
               tl.quantity, tl.status
        from task_lines tl
        join products p on p.id = tl.sku_id
        left join locations fl on fl.id = tl.from_location_id
        left join locations tol on tol.id = tl.to_location_id
        where tl.task_id = $1
        order by tl.id asc
        "#,
    )
    .bind(task_id)
    .fetch_all(pool)
    .await?;

    Ok(TaskDetail { task, zone, lines })
}

#[derive(Debug, Clone, Default)]
pub struct TaskListFilter {
    pub status: Option<TaskStatus>,
    pub operator_id: Option<Uuid>,
    pub zone_id: Option<i64>,
}

/// Paginated list, `priority DESC, created_at ASC`.
pub async fn list_tasks(
    pool: &PgPool,
    filter: TaskListFilter,
    page: PageParams,
) -> Result<Page<Task>, WmsError> {
    let status = filter.status.map(TaskStatus::as_str);

    let total: i64 = sqlx::query_scalar(
        r#"
        select count(*) from tasks
        where ($1::text is null or status = $1)
          and ($2::uuid is null or assigned_operator_id = $2)
          and ($3::bigint is null or zone_id = $3)
        "#,
    )
    .bind(status)
    .bind(filter.operator_id)
    .bind(filter.zone_id)
    .fetch_one(pool)
    .await?;

    let items: Vec<Task> = sqlx::query_as(
        r#"
        select id, task_type, priority, status, zone_id, assigned_operator_id,
               source_document_id, estimated_duration_seconds, actual_duration_seconds,
               version, started_at, completed_at, created_at, updated_at
        from tasks
        where ($1::text is null or status = $1)
          and ($2::uuid is null or assigned_operator_id = $2)
          and ($3::bigint is null or zone_id = $3)
        order by priority desc, created_at asc
        limit $4 offset $5
        "#,
    )
    .bind(status)
    .bind(filter.operator_id)
    .bind(filter.zone_id)
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

// ---------------------------------------------------------------------
// Assignment worker queries
// ---------------------------------------------------------------------

/// Lock a batch of `created` candidate tasks, skipping rows already locked
/// by a concurrent assigner instance.
pub async fn claim_assignment_candidates(
    tx: &mut Transaction<'_, Postgres>,
    batch_size: i64,
) -> Result<Vec<Task>, WmsError> {
    let rows = sqlx::query_as(
        r#"
        select id, task_type, priority, status, zone_id, assigned_operator_id,
               source_document_id, estimated_duration_seconds, actual_duration_seconds,
               version, started_at, completed_at, created_at, updated_at
        from tasks
        where status = 'created'
        order by priority desc, created_at asc
        limit $1
        for update skip locked
        "#,
    )
    .bind(batch_size)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows)
}

/// Count operators available for assignment stats:
/// `status = available` and no active task.
pub async fn count_available_operators(
    executor: impl sqlx::PgExecutor<'_>,
) -> Result<i64, WmsError> {
    let count: i64 = sqlx::query_scalar(
        r#"
        select count(*)
        from operators o
        where o.status = 'available'
          and not exists (
              select 1 from tasks t
              where t.assigned_operator_id = o.id
                and t.status in ('assigned', 'in_progress', 'paused')
          )
        "#,
    )
    .fetch_one(executor)
    .await?;
    Ok(count)
}

/// Find and lock the best available operator for `zone_id`
/// step 4a): linked to the zone, available, no active task, ordered by
/// today's completed-task count ascending, performance score descending,
/// then created_at ascending. Skips operators already locked by a
/// concurrent assigner.
pub async fn find_and_lock_best_operator(
    tx: &mut Transaction<'_, Postgres>,
    zone_id: i64,
) -> Result<Option<Operator>, WmsError> {
    let row = sqlx::query_as(
        r#"
        select o.id, o.name, o.role, o.status, o.shift_start, o.shift_end,
               o.performance_score, o.created_at, o.updated_at
        from operators o
        join operator_zones oz on oz.operator_id = o.id and oz.zone_id = $1
        left join lateral (
            select count(*) as completed_today
            from tasks t
            where t.assigned_operator_id = o.id
              and t.status = 'completed'
              and t.completed_at >= date_trunc('day', now())
              and t.completed_at < date_trunc('day', now()) + interval '1 day'
        ) ct on true
        where o.status = 'available'
          and not exists (
              select 1 from tasks t2
              where t2.assigned_operator_id = o.id
                and t2.status in ('assigned', 'in_progress', 'paused')
          )
        order by ct.completed_today asc, o.performance_score desc, o.created_at asc
        limit 1
        for update of o skip locked
        "#,
    )
    .bind(zone_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row)
}

/// Assign `task_id` to `operator_id`, predicated on the task still being
/// `created` — a pre-commit check against a concurrent transition.
/// Returns `false` (not an error) when the predicate no longer holds, e.g.
/// a manual assignment raced this cycle.
pub async fn assign_task(
    tx: &mut Transaction<'_, Postgres>,
    task_id: Uuid,
    operator_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<Task>, WmsError> {
    let updated: Option<Task> = sqlx::query_as(
        r#"
        update tasks
           set status = 'assigned',
               assigned_operator_id = $2,
               version = version + 1,
               updated_at = $3
         where id = $1 and status = 'created'
        returning id, task_type, priority, status, zone_id, assigned_operator_id,
                  source_document_id, estimated_duration_seconds, actual_duration_seconds,
                  version, started_at, completed_at, created_at, updated_at
        "#,
    )
    .bind(task_id)
    .bind(operator_id)
    .bind(now)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(task) = &updated {
        insert_audit_row(
            tx,
            task_id,
            Some(TaskStatus::Created),
            TaskStatus::Assigned,
            task.version,
            None,
            now,
        )
        .await?;
    }

    Ok(updated)
}
