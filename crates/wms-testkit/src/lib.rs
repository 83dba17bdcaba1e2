//! Postgres-backed test fixtures shared by the workspace's integration
//! tests: a pool bootstrap plus small builders for the warehouse/zone,
//! operator, and task rows every scenario starts from.

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use wms_core::{Operator, OperatorStatus, Task, TaskType};

/// Connects to `WMS_DATABASE_URL` and runs migrations. Every scenario test
/// calls this first; callers are expected to run against a disposable
/// database, since fixtures are inserted directly and never cleaned up.
pub async fn connect_test_pool() -> Result<PgPool> {
    let url = std::env::var(wms_db::ENV_DB_URL)
        .with_context(|| format!("integration tests require {}", wms_db::ENV_DB_URL))?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .context("failed to connect to test database")?;
    wms_db::migrate(&pool).await.context("failed to run migrations")?;
    Ok(pool)
}

pub struct WarehouseFixture {
    pub warehouse_id: i64,
    pub zone_id: i64,
}

/// Inserts one warehouse and one zone, each under a fresh random code so
/// parallel tests never collide on the unique `(warehouse_id, code)`
/// constraint.
pub async fn seed_warehouse_and_zone(pool: &PgPool) -> Result<WarehouseFixture> {
    let suffix = Uuid::new_v4();
    let (warehouse_id,): (i64,) = sqlx::query_as(
        "insert into warehouses (code, name) values ($1, $2) returning id",
    )
    .bind(format!("WH-{suffix}"))
    .bind("Test Warehouse")
    .fetch_one(pool)
    .await?;

    let (zone_id,): (i64,) = sqlx::query_as(
        "insert into zones (warehouse_id, code, name) values ($1, $2, $3) returning id",
    )
    .bind(warehouse_id)
    .bind(format!("Z-{suffix}"))
    .bind("Test Zone")
    .fetch_one(pool)
    .await?;

    Ok(WarehouseFixture { warehouse_id, zone_id })
}

/// Inserts one location bound to `zone_id`, returning its id.
pub async fn seed_location(pool: &PgPool, warehouse_id: i64, zone_id: i64) -> Result<i64> {
    let suffix = Uuid::new_v4();
    let (location_id,): (i64,) = sqlx::query_as(
        "insert into locations (warehouse_id, zone_id, code) values ($1, $2, $3) returning id",
    )
    .bind(warehouse_id)
    .bind(zone_id)
    .bind(format!("LOC-{suffix}"))
    .fetch_one(pool)
    .await?;
    Ok(location_id)
}

/// Inserts one product, returning its id.
pub async fn seed_product(pool: &PgPool) -> Result<i64> {
    let suffix = Uuid::new_v4();
    let (product_id,): (i64,) = sqlx::query_as(
        "insert into products (sku, name) values ($1, $2) returning id",
    )
    .bind(format!("SKU-{suffix}"))
    .bind("Test Product")
    .fetch_one(pool)
    .await?;
    Ok(product_id)
}

/// Builds an `operators` row. Defaults to an always-on shift and a
/// mid-range performance score so a freshly built operator is eligible
/// for assignment without further setup.
pub struct OperatorBuilder {
    name: String,
    role: String,
    status: OperatorStatus,
    shift_start: NaiveTime,
    shift_end: NaiveTime,
    performance_score: f64,
    zone_ids: Vec<i64>,
}

impl OperatorBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: "picker".to_string(),
            status: OperatorStatus::Available,
            shift_start: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            shift_end: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
            performance_score: 1.0,
            zone_ids: Vec::new(),
        }
    }

    pub fn status(mut self, status: OperatorStatus) -> Self {
        self.status = status;
        self
    }

    pub fn performance_score(mut self, score: f64) -> Self {
        self.performance_score = score;
        self
    }

    pub fn shift(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.shift_start = start;
        self.shift_end = end;
        self
    }

    pub fn in_zone(mut self, zone_id: i64) -> Self {
        self.zone_ids.push(zone_id);
        self
    }

    pub async fn insert(self, pool: &PgPool) -> Result<Operator> {
        let operator: Operator = sqlx::query_as(
            r#"
            insert into operators (name, role, status, shift_start, shift_end, performance_score)
            values ($1, $2, $3, $4, $5, $6)
            returning id, name, role, status, shift_start, shift_end, performance_score,
                      created_at, updated_at
            "#,
        )
        .bind(&self.name)
        .bind(&self.role)
        .bind(self.status.as_str())
        .bind(self.shift_start)
        .bind(self.shift_end)
        .bind(self.performance_score)
        .fetch_one(pool)
        .await?;

        for zone_id in &self.zone_ids {
            sqlx::query("insert into operator_zones (operator_id, zone_id) values ($1, $2)")
                .bind(operator.id)
                .bind(zone_id)
                .execute(pool)
                .await?;
        }

        Ok(operator)
    }
}

/// Builds a `tasks` row, `created` by default with no lines. Callers that
/// need line-level data should go through the generation service instead
/// of this builder.
pub struct TaskBuilder {
    task_type: TaskType,
    priority: i32,
    zone_id: i64,
    source_document_id: String,
    estimated_duration_seconds: i64,
}

impl TaskBuilder {
    pub fn new(zone_id: i64) -> Self {
        Self {
            task_type: TaskType::Pick,
            priority: 50,
            zone_id,
            source_document_id: format!("SO:{}", Uuid::new_v4()),
            estimated_duration_seconds: 120,
        }
    }

    pub fn task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub async fn insert(self, pool: &PgPool) -> Result<Task> {
        let task: Task = sqlx::query_as(
            r#"
            insert into tasks (task_type, priority, zone_id, source_document_id, estimated_duration_seconds, version)
            values ($1, $2, $3, $4, $5, 1)
            returning id, task_type, priority, status, zone_id, assigned_operator_id,
                      source_document_id, estimated_duration_seconds, actual_duration_seconds,
                      version, started_at, completed_at, created_at, updated_at
            "#,
        )
        .bind(self.task_type.as_str())
        .bind(self.priority)
        .bind(self.zone_id)
        .bind(&self.source_document_id)
        .bind(self.estimated_duration_seconds)
        .fetch_one(pool)
        .await?;
        Ok(task)
    }
}

/// A well-formed `sales_order_ready_for_pick` ingress payload with one
/// line, for tests exercising the order-event path end to end.
pub fn sample_sales_order_payload(source_order_id: &str, location_id: i64, sku_id: i64, quantity: i64) -> Value {
    json!({
        "type": "sales_order_ready_for_pick",
        "salesOrderId": source_order_id,
        "shipDate": "2026-03-01T00:00:00Z",
        "lines": [
            {"skuId": sku_id, "quantity": quantity, "pickLocationId": location_id}
        ],
    })
}

/// A well-formed `purchase_order_received` ingress payload with one line.
pub fn sample_purchase_order_payload(source_order_id: &str, location_id: i64, sku_id: i64, quantity: i64) -> Value {
    json!({
        "type": "purchase_order_received",
        "purchaseOrderId": source_order_id,
        "lines": [
            {"skuId": sku_id, "quantity": quantity, "destinationLocationId": location_id}
        ],
    })
}
