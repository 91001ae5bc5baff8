// Session and run entities
//
// A session is the durable conversation surface; runs are single invocations
// of a runnable within a session. Step sequences are scoped to the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::step::UsageMetrics;

/// A durable conversation surface. Created on first run, lives until deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,

    /// Last runnable that produced a run in this session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            created_at: Utc::now(),
            agent_id: None,
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle status of a run. Transitions are monotone; a run is finalized
/// exactly once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Starting,
    Running,
    Completed,
    Failed,
    Cancelled,
    Suspended,
}

impl RunStatus {
    /// Terminal statuses accept no further transitions, with the exception
    /// of `Suspended`, which may resume into `Running`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }

    pub fn can_transition_to(self, next: RunStatus) -> bool {
        match self {
            RunStatus::Starting => next != RunStatus::Starting,
            RunStatus::Running => next != RunStatus::Starting && next != RunStatus::Running,
            RunStatus::Suspended => matches!(
                next,
                RunStatus::Running | RunStatus::Failed | RunStatus::Cancelled
            ),
            _ => false,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Starting => "starting",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Suspended => "suspended",
        };
        write!(f, "{s}")
    }
}

/// Rejected status transition
#[derive(Debug, thiserror::Error)]
#[error("invalid run status transition: {from} -> {to}")]
pub struct StatusTransitionError {
    pub from: RunStatus,
    pub to: RunStatus,
}

/// One invocation of a runnable within a session.
///
/// A run's `[start_sequence, end_sequence]` range is a sub-range of its
/// session's step sequence; child runs nest strictly inside their parent's
/// range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub session_id: Uuid,

    /// Identifier of the agent or workflow that produced this run
    pub runnable_id: String,

    pub status: RunStatus,

    /// First step sequence owned by this run (0 until a step is persisted)
    pub start_sequence: u64,

    /// Last step sequence owned by this run
    pub end_sequence: u64,

    /// Parent run for nested runnables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<Uuid>,

    /// Nesting depth (root = 0)
    pub depth: u32,

    pub metrics: UsageMetrics,

    /// Final textual response, present on completed runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    /// Terminal error, present on failed runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Run {
    pub fn new(session_id: Uuid, runnable_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            session_id,
            runnable_id: runnable_id.into(),
            status: RunStatus::Starting,
            start_sequence: 0,
            end_sequence: 0,
            parent_run_id: None,
            depth: 0,
            metrics: UsageMetrics::default(),
            response: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn nested(mut self, parent_run_id: Uuid, depth: u32) -> Self {
        self.parent_run_id = Some(parent_run_id);
        self.depth = depth;
        self
    }

    /// Move to `next`, rejecting non-monotone transitions.
    pub fn transition(&mut self, next: RunStatus) -> Result<(), StatusTransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(StatusTransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Widen the run's sequence range to include `sequence`.
    pub fn observe_sequence(&mut self, sequence: u64) {
        if self.start_sequence == 0 {
            self.start_sequence = sequence;
        }
        if sequence > self.end_sequence {
            self.end_sequence = sequence;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_reject_transitions() {
        let mut run = Run::new(Uuid::now_v7(), "agent-a");
        run.transition(RunStatus::Running).unwrap();
        run.transition(RunStatus::Completed).unwrap();
        assert!(run.transition(RunStatus::Failed).is_err());
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn suspended_can_resume() {
        let mut run = Run::new(Uuid::now_v7(), "agent-a");
        run.transition(RunStatus::Running).unwrap();
        run.transition(RunStatus::Suspended).unwrap();
        assert!(run.status.can_transition_to(RunStatus::Running));
        run.transition(RunStatus::Running).unwrap();
        assert_eq!(run.status, RunStatus::Running);
    }

    #[test]
    fn observe_sequence_widens_range() {
        let mut run = Run::new(Uuid::now_v7(), "agent-a");
        run.observe_sequence(3);
        run.observe_sequence(5);
        assert_eq!(run.start_sequence, 3);
        assert_eq!(run.end_sequence, 5);
    }
}
