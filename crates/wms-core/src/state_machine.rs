//! Task status state machine.
//!
//! ```text
//! created    -> assigned
//! assigned   -> in_progress, cancelled
//! in_progress -> completed, paused, cancelled
//! paused     -> in_progress, cancelled
//! completed, cancelled, failed -> terminal
//! ```
//!
//! `failed` is reachable only by out-of-band administrative action, not by
//! [`TaskStatus::can_transition_to`] — it is accepted as a terminal status
//! wherever one is read, but no (from, Failed) pair is legal here.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    Assigned,
    InProgress,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Paused => "paused",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "created" => TaskStatus::Created,
            "assigned" => TaskStatus::Assigned,
            "in_progress" => TaskStatus::InProgress,
            "paused" => TaskStatus::Paused,
            "completed" => TaskStatus::Completed,
            "cancelled" => TaskStatus::Cancelled,
            "failed" => TaskStatus::Failed,
            _ => return None,
        })
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Cancelled | TaskStatus::Failed
        )
    }

    /// `true` when `status in {assigned, in_progress, paused}` — the
    /// *active task* predicate used by the at-most-one-active-task
    /// invariant.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            TaskStatus::Assigned | TaskStatus::InProgress | TaskStatus::Paused
        )
    }

    /// Whether `self -> next` is a legal transition.
    /// Self-transitions are rejected; cancellation is legal from any
    /// non-terminal state.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;

        if self == next {
            return false;
        }

        if next == Cancelled {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (Created, Assigned)
                | (Assigned, InProgress)
                | (InProgress, Completed)
                | (InProgress, Paused)
                | (Paused, InProgress)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

crate::sqlx_text::impl_pg_text_enum!(TaskStatus);

/// Rejected when [`TaskStatus::can_transition_to`] returns `false` — the
/// caller (`wms-db`) maps this to a 409 conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal task transition: {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// Validate a requested transition, returning the destination on success.
pub fn validate_transition(
    from: TaskStatus,
    to: TaskStatus,
) -> Result<TaskStatus, IllegalTransition> {
    if from.can_transition_to(to) {
        Ok(to)
    } else {
        Err(IllegalTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TaskStatus::*;

    #[test]
    fn happy_path_transitions_are_legal() {
        assert!(Created.can_transition_to(Assigned));
        assert!(Assigned.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Paused));
        assert!(Paused.can_transition_to(InProgress));
    }

    #[test]
    fn cancel_is_legal_from_any_nonterminal_state() {
        for s in [Created, Assigned, InProgress, Paused] {
            assert!(s.can_transition_to(Cancelled), "{s:?} -> Cancelled");
        }
        for s in [Completed, Cancelled, Failed] {
            assert!(!s.can_transition_to(Cancelled), "{s:?} -> Cancelled");
        }
    }

    #[test]
    fn self_transitions_are_rejected() {
        for s in [Created, Assigned, InProgress, Paused, Completed, Cancelled, Failed] {
            assert!(!s.can_transition_to(s));
        }
    }

    #[test]
    fn transition_closure_matches_spec_exactly() {
        // Every (from, to) pair not explicitly enumerated above
        // other than cancellation, must be rejected.
        let legal: &[(TaskStatus, TaskStatus)] = &[
            (Created, Assigned),
            (Assigned, InProgress),
            (InProgress, Completed),
            (InProgress, Paused),
            (Paused, InProgress),
        ];
        let all = [Created, Assigned, InProgress, Paused, Completed, Cancelled, Failed];
        for &from in &all {
            for &to in &all {
                let expect_legal = legal.contains(&(from, to))
                    || (to == Cancelled && !from.is_terminal() && from != to);
                assert_eq!(
                    from.can_transition_to(to),
                    expect_legal,
                    "{from:?} -> {to:?}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_accept_no_further_transitions_except_rejection_already_false() {
        for s in [Completed, Cancelled, Failed] {
            assert!(s.is_terminal());
        }
        assert!(!Created.is_terminal());
        assert!(!Assigned.is_terminal());
        assert!(!InProgress.is_terminal());
        assert!(!Paused.is_terminal());
    }

    #[test]
    fn active_predicate_matches_glossary() {
        assert!(Assigned.is_active());
        assert!(InProgress.is_active());
        assert!(Paused.is_active());
        assert!(!Created.is_active());
        assert!(!Completed.is_active());
        assert!(!Cancelled.is_active());
        assert!(!Failed.is_active());
    }
}
