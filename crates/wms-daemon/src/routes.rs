//! Axum router and every handler for the HTTP surface.
//!
//! `build_router` is the single entry point; `main.rs` attaches
//! middleware (CORS, tracing) after this call so tests can exercise the
//! bare router.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, patch, post};
use axum::{Extension, Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use wms_core::{OperatorStatus, PageParams, TaskStatus, WmsError};
use wms_db::{metrics as db_metrics, operators as db_operators, tasks as db_tasks};
use wms_events::RealtimeEventType;

use crate::auth::{issue_token, AuthUser};
use crate::error::ApiError;
use crate::ingress::accept_order_event;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/order-events", post(create_order_event))
        .route("/api/tasks", get(list_tasks))
        .route("/api/tasks/:task_id", get(get_task))
        .route("/api/tasks/:task_id/start", post(start_task))
        .route("/api/tasks/:task_id/complete", post(complete_task))
        .route("/api/tasks/:task_id/pause", post(pause_task))
        .route("/api/tasks/:task_id/cancel", post(cancel_task))
        .route("/api/tasks/:task_id/status", patch(patch_task_status))
        .route("/api/operators", get(list_operators))
        .route("/api/operators/:operator_id", get(get_operator))
        .route("/api/operators/:operator_id/status", patch(patch_operator_status))
        .route("/api/labor/overview", get(labor_overview))
        .route("/api/labor/operator-performance", get(labor_operator_performance))
        .route("/api/labor/zone-workload", get(labor_zone_workload))
        .route_layer(middleware::from_fn_with_state(state.clone(), crate::auth::require_auth));

    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(login))
        .merge(protected)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------
// POST /api/auth/login
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let principal = state
        .credentials
        .verify(&body.username, &body.password)
        .ok_or_else(|| WmsError::unauthorized("invalid username or password"))?;

    let secret = state
        .settings
        .auth
        .jwt_secret
        .as_deref()
        .ok_or_else(|| WmsError::internal("JWT secret is not configured"))?;

    let token = issue_token(
        secret,
        state.settings.auth.jwt_lifetime_seconds,
        &principal.subject,
        &principal.role,
        principal.operator_id.as_deref(),
    )?;

    Ok(Json(json!({
        "token": token,
        "user": {
            "id": principal.subject,
            "role": principal.role,
            "operatorId": principal.operator_id,
        }
    })))
}

// ---------------------------------------------------------------------
// POST /api/order-events
// ---------------------------------------------------------------------

async fn create_order_event(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let accepted = accept_order_event(&state.pool, body).await?;
    Ok((StatusCode::ACCEPTED, Json(serde_json::to_value(accepted).unwrap())))
}

// ---------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TaskListQuery {
    status: Option<String>,
    operator_id: Option<Uuid>,
    zone_id: Option<i64>,
    page: Option<i64>,
    limit: Option<i64>,
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TaskListQuery>,
) -> Result<Json<Value>, ApiError> {
    let status = match q.status {
        Some(s) => Some(TaskStatus::parse(&s).ok_or_else(|| WmsError::invalid(format!("unknown status: {s}")))?),
        None => None,
    };
    let page = PageParams::parse(q.page, q.limit)?;
    let filter = db_tasks::TaskListFilter {
        status,
        operator_id: q.operator_id,
        zone_id: q.zone_id,
    };
    let page = db_tasks::list_tasks(&state.pool, filter, page).await?;
    Ok(Json(serde_json::to_value(page).unwrap()))
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let detail = db_tasks::get_detail(&state.pool, task_id).await?;
    let total_quantity = detail.total_quantity();
    let mut body = serde_json::to_value(&detail).unwrap();
    body["totalQuantity"] = json!(total_quantity);
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
struct TransitionRequest {
    version: i64,
    #[serde(rename = "changedByOperatorId")]
    changed_by_operator_id: Option<Uuid>,
}

async fn start_task(
    state: State<Arc<AppState>>,
    path: Path<Uuid>,
    auth: Extension<AuthUser>,
    body: Json<TransitionRequest>,
) -> Result<Json<Value>, ApiError> {
    apply_transition(state, path, auth, body, TaskStatus::InProgress).await
}

async fn complete_task(
    state: State<Arc<AppState>>,
    path: Path<Uuid>,
    auth: Extension<AuthUser>,
    body: Json<TransitionRequest>,
) -> Result<Json<Value>, ApiError> {
    apply_transition(state, path, auth, body, TaskStatus::Completed).await
}

async fn pause_task(
    state: State<Arc<AppState>>,
    path: Path<Uuid>,
    auth: Extension<AuthUser>,
    body: Json<TransitionRequest>,
) -> Result<Json<Value>, ApiError> {
    apply_transition(state, path, auth, body, TaskStatus::Paused).await
}

async fn cancel_task(
    state: State<Arc<AppState>>,
    path: Path<Uuid>,
    auth: Extension<AuthUser>,
    body: Json<TransitionRequest>,
) -> Result<Json<Value>, ApiError> {
    apply_transition(state, path, auth, body, TaskStatus::Cancelled).await
}

#[derive(Debug, Deserialize)]
struct PatchStatusRequest {
    status: String,
    version: i64,
    #[serde(rename = "changedByOperatorId")]
    changed_by_operator_id: Option<Uuid>,
}

async fn patch_task_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
    Json(body): Json<PatchStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    let new_status = TaskStatus::parse(&body.status)
        .ok_or_else(|| WmsError::invalid(format!("unknown status: {}", body.status)))?;
    let task = run_update_status(
        &state,
        task_id,
        new_status,
        body.version,
        body.changed_by_operator_id,
    )
    .await?;
    Ok(Json(serde_json::to_value(task).unwrap()))
}

async fn apply_transition(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
    Extension(_auth): Extension<AuthUser>,
    Json(body): Json<TransitionRequest>,
    new_status: TaskStatus,
) -> Result<Json<Value>, ApiError> {
    if body.version <= 0 {
        return Err(WmsError::invalid("version must be a positive integer").into());
    }
    let task = run_update_status(
        &state,
        task_id,
        new_status,
        body.version,
        body.changed_by_operator_id,
    )
    .await?;
    Ok(Json(serde_json::to_value(task).unwrap()))
}

/// The shared body of `updateStatus`: validate the acting operator
/// (if named), apply the transition, and publish the resulting realtime
/// events on a best-effort basis: publish failures log-only and never
/// fail the call.
async fn run_update_status(
    state: &AppState,
    task_id: Uuid,
    new_status: TaskStatus,
    expected_version: i64,
    changed_by_operator_id: Option<Uuid>,
) -> Result<wms_core::Task, WmsError> {
    if let Some(operator_id) = changed_by_operator_id {
        if !db_operators::exists(&state.pool, operator_id).await? {
            return Err(WmsError::invalid(format!("operator {operator_id} does not exist")));
        }
    }

    let now = Utc::now();
    let task = db_tasks::update_status(
        &state.pool,
        db_tasks::UpdateStatusArgs {
            task_id,
            new_status,
            expected_version: Some(expected_version),
            changed_by_operator_id,
        },
        now,
    )
    .await?;

    let payload = json!({
        "taskId": task.id,
        "status": task.status.as_str(),
        "version": task.version,
        "assignedOperatorId": task.assigned_operator_id,
    });

    if let Err(e) = state.events.publish(RealtimeEventType::TaskUpdated, payload.clone()).await {
        tracing::error!(error = %e, "failed to publish TASK_UPDATED");
    }
    if new_status == TaskStatus::Assigned && task.assigned_operator_id.is_some() {
        if let Err(e) = state.events.publish(RealtimeEventType::TaskAssigned, payload).await {
            tracing::error!(error = %e, "failed to publish TASK_ASSIGNED");
        }
    }

    Ok(task)
}

// ---------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OperatorListQuery {
    status: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
}

async fn list_operators(
    State(state): State<Arc<AppState>>,
    Query(q): Query<OperatorListQuery>,
) -> Result<Json<Value>, ApiError> {
    let status = match q.status {
        Some(s) => {
            Some(OperatorStatus::parse(&s).ok_or_else(|| WmsError::invalid(format!("unknown status: {s}")))?)
        }
        None => None,
    };
    let page = PageParams::parse(q.page, q.limit)?;
    let page = db_operators::list(&state.pool, status, page).await?;
    Ok(Json(serde_json::to_value(page).unwrap()))
}

async fn get_operator(
    State(state): State<Arc<AppState>>,
    Path(operator_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let operator = db_operators::get(&state.pool, operator_id).await?;
    Ok(Json(serde_json::to_value(operator).unwrap()))
}

#[derive(Debug, Deserialize)]
struct PatchOperatorStatusRequest {
    status: String,
}

async fn patch_operator_status(
    State(state): State<Arc<AppState>>,
    Path(operator_id): Path<Uuid>,
    Json(body): Json<PatchOperatorStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    let status = OperatorStatus::parse(&body.status)
        .ok_or_else(|| WmsError::invalid(format!("unknown status: {}", body.status)))?;
    let operator = db_operators::update_status(&state.pool, operator_id, status).await?;

    let payload = json!({ "operatorId": operator.id, "status": operator.status.as_str() });
    if let Err(e) = state
        .events
        .publish(RealtimeEventType::OperatorStatusUpdated, payload)
        .await
    {
        tracing::error!(error = %e, "failed to publish OPERATOR_STATUS_UPDATED");
    }

    Ok(Json(serde_json::to_value(operator).unwrap()))
}

// ---------------------------------------------------------------------
// Labor metrics
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: Option<NaiveDate>,
}

async fn labor_overview(
    State(state): State<Arc<AppState>>,
    Query(q): Query<DateQuery>,
) -> Result<Json<Value>, ApiError> {
    let date = q.date.unwrap_or_else(|| Utc::now().date_naive());
    let overview = db_metrics::labor_overview(&state.pool, date).await?;
    Ok(Json(serde_json::to_value(overview).unwrap()))
}

#[derive(Debug, Deserialize)]
struct DatePageQuery {
    date: Option<NaiveDate>,
    page: Option<i64>,
    limit: Option<i64>,
}

async fn labor_operator_performance(
    State(state): State<Arc<AppState>>,
    Query(q): Query<DatePageQuery>,
) -> Result<Json<Value>, ApiError> {
    let date = q.date.unwrap_or_else(|| Utc::now().date_naive());
    let page = PageParams::parse(q.page, q.limit)?;
    let page = db_metrics::operator_performance(&state.pool, date, page).await?;
    Ok(Json(serde_json::to_value(page).unwrap()))
}

#[derive(Debug, Deserialize)]
struct ZoneWorkloadQuery {
    warehouse_id: Option<i64>,
    page: Option<i64>,
    limit: Option<i64>,
}

async fn labor_zone_workload(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ZoneWorkloadQuery>,
) -> Result<Json<Value>, ApiError> {
    let page = PageParams::parse(q.page, q.limit)?;
    let page = db_metrics::zone_workload(&state.pool, q.warehouse_id, page).await?;
    Ok(Json(serde_json::to_value(page).unwrap()))
}
