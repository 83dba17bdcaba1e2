//! Operator reads and status updates for `/api/operators*`.

use uuid::Uuid;

use wms_core::{Operator, OperatorStatus, Page, PageParams, WmsError};

pub async fn exists(executor: impl sqlx::PgExecutor<'_>, operator_id: Uuid) -> Result<bool, WmsError> {
    let found: bool =
        sqlx::query_scalar(r#"select exists(select 1 from operators where id = $1)"#)
            .bind(operator_id)
            .fetch_one(executor)
            .await?;
    Ok(found)
}

pub async fn get(pool: &sqlx::PgPool, operator_id: Uuid) -> Result<Operator, WmsError> {
    sqlx::query_as(
        r#"
        select id, name, role, status, shift_start, shift_end, performance_score,
               created_at, updated_at
        from operators
        where id = $1
        "#,
    )
    .bind(operator_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| WmsError::not_found(format!("operator {operator_id} not found")))
}

pub async fn list(
    pool: &sqlx::PgPool,
    status: Option<OperatorStatus>,
    page: PageParams,
) -> Result<Page<Operator>, WmsError> {
    let status_str = status.map(OperatorStatus::as_str);

    let total: i64 = sqlx::query_scalar(
        r#"select count(*) from operators where ($1::text is null or status = $1)"#,
    )
    .bind(status_str)
    .fetch_one(pool)
    .await?;

    let items = sqlx::query_as(
        r#"
        select id, name, role, status, shift_start, shift_end, performance_score,
               created_at, updated_at
        from operators
        where ($1::text is null or status = $1)
        order by created_at asc
        limit $2 offset $3
        "#,
    )
    .bind(status_str)
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

pub async fn update_status(
    pool: &sqlx::PgPool,
    operator_id: Uuid,
    status: OperatorStatus,
) -> Result<Operator, WmsError> {
    sqlx::query_as(
        r#"
        update operators
           set status = $2, updated_at = now()
         where id = $1
        returning id, name, role, status, shift_start, shift_end, performance_score,
                  created_at, updated_at
        "#,
    )
    .bind(operator_id)
    .bind(status.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| WmsError::not_found(format!("operator {operator_id} not found")))
}
