//! Shared domain DTOs. These mirror the row shapes `wms-db`
//! reads and writes; they carry no behavior of their own beyond the small
//! pure helpers such as `Task::total_quantity`.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::TaskStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Pick,
    Putaway,
    Replenish,
    Count,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Pick => "pick",
            TaskType::Putaway => "putaway",
            TaskType::Replenish => "replenish",
            TaskType::Count => "count",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pick" => TaskType::Pick,
            "putaway" => TaskType::Putaway,
            "replenish" => TaskType::Replenish,
            "count" => TaskType::Count,
            _ => return None,
        })
    }
}

crate::sqlx_text::impl_pg_text_enum!(TaskType);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorStatus {
    Available,
    Busy,
    Offline,
}

impl OperatorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OperatorStatus::Available => "available",
            OperatorStatus::Busy => "busy",
            OperatorStatus::Offline => "offline",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "available" => OperatorStatus::Available,
            "busy" => OperatorStatus::Busy,
            "offline" => OperatorStatus::Offline,
            _ => return None,
        })
    }
}

crate::sqlx_text::impl_pg_text_enum!(OperatorStatus);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskLineStatus {
    Created,
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

impl TaskLineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskLineStatus::Created => "created",
            TaskLineStatus::InProgress => "in_progress",
            TaskLineStatus::Completed => "completed",
            TaskLineStatus::Cancelled => "cancelled",
            TaskLineStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "created" => TaskLineStatus::Created,
            "in_progress" => TaskLineStatus::InProgress,
            "completed" => TaskLineStatus::Completed,
            "cancelled" => TaskLineStatus::Cancelled,
            "failed" => TaskLineStatus::Failed,
            _ => return None,
        })
    }
}

crate::sqlx_text::impl_pg_text_enum!(TaskLineStatus);

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Operator {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub status: OperatorStatus,
    pub shift_start: NaiveTime,
    pub shift_end: NaiveTime,
    pub performance_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskLine {
    pub id: Uuid,
    pub task_id: Uuid,
    pub sku_id: i64,
    pub from_location_id: Option<i64>,
    pub to_location_id: Option<i64>,
    pub quantity: i64,
    pub status: TaskLineStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub task_type: TaskType,
    pub priority: i32,
    pub status: TaskStatus,
    pub zone_id: i64,
    pub assigned_operator_id: Option<Uuid>,
    pub source_document_id: String,
    pub estimated_duration_seconds: i64,
    pub actual_duration_seconds: Option<i64>,
    pub version: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskWithLines {
    #[serde(flatten)]
    pub task: Task,
    pub lines: Vec<TaskLine>,
}

impl TaskWithLines {
    /// `totalQuantity = Σ line.quantity`.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskStatusAuditRow {
    pub id: Uuid,
    pub task_id: Uuid,
    pub previous_status: Option<TaskStatus>,
    pub new_status: TaskStatus,
    pub resulting_version: i64,
    pub changed_by_operator_id: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
}

/// Zone summary embedded in a task read.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ZoneSummary {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub warehouse_id: i64,
}

/// A task line joined to its product and location codes.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskLineDetail {
    pub id: Uuid,
    pub task_id: Uuid,
    pub sku_id: i64,
    pub sku: String,
    pub product_name: String,
    pub from_location_id: Option<i64>,
    pub from_location_code: Option<String>,
    pub to_location_id: Option<i64>,
    pub to_location_code: Option<String>,
    pub quantity: i64,
    pub status: TaskLineStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub zone: ZoneSummary,
    pub lines: Vec<TaskLineDetail>,
}

impl TaskDetail {
    /// `totalQuantity = Σ line.quantity`.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::FromRow)]
pub struct LaborDailyMetric {
    pub operator_id: Uuid,
    pub metric_date: chrono::NaiveDate,
    pub tasks_completed: i64,
    pub units_processed: i64,
    pub avg_task_time_seconds: f64,
    pub utilization_percent: f64,
}
