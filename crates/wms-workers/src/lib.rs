//! The two background cycles that run independently of the HTTP surface
//! the assignment worker and the labor metrics aggregator.

pub mod assignment;
pub mod metrics;

pub use assignment::{run_cycle as run_assignment_cycle, spawn as spawn_assignment_loop, AssignmentCycleStats};
pub use metrics::spawn as spawn_metrics_loop;
