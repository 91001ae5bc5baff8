// Store contracts
//
// The core owns the contracts; concrete backends live outside it. The
// session store must make `next_sequence` atomic per session and reject
// duplicate step sequences.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use runweave_contracts::{
    InteractionResponse, Run, RunStatus, Session, Step, SuspendedState, Usage, UsageMetrics,
};

use crate::error::Result;
use crate::permission::PermissionRules;

// ============================================================================
// SessionStore
// ============================================================================

/// Inclusive sequence range for step queries
#[derive(Debug, Clone, Copy, Default)]
pub struct StepRange {
    pub from: Option<u64>,
    pub to: Option<u64>,
}

impl StepRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn up_to(to: u64) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }

    pub fn from(from: u64) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    pub fn contains(&self, sequence: u64) -> bool {
        self.from.map_or(true, |f| sequence >= f) && self.to.map_or(true, |t| sequence <= t)
    }
}

/// Durable storage for sessions, runs, steps, and suspension records.
///
/// Steps persisted for a session are totally ordered by sequence; range
/// queries return them in that order.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: Session) -> Result<Session>;

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>>;

    /// Insert or update a run record
    async fn save_run(&self, run: &Run) -> Result<()>;

    async fn get_run(&self, run_id: Uuid) -> Result<Option<Run>>;

    /// Persist a step. Rejects a sequence already used in the session.
    async fn save_step(&self, step: &Step) -> Result<()>;

    async fn list_steps(&self, session_id: Uuid, range: StepRange) -> Result<Vec<Step>>;

    /// Allocate the next step sequence. Atomic within a session.
    async fn next_sequence(&self, session_id: Uuid) -> Result<u64>;

    async fn save_suspended_state(&self, state: &SuspendedState) -> Result<()>;

    async fn get_suspended_state(&self, run_id: Uuid) -> Result<Option<SuspendedState>>;

    /// Clear a consumed suspension record
    async fn remove_suspended_state(&self, run_id: Uuid) -> Result<()>;

    async fn save_interaction_response(&self, response: &InteractionResponse) -> Result<()>;
}

// ============================================================================
// TraceStore
// ============================================================================

/// Trace record for one model call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmCallTrace {
    pub id: Uuid,
    pub run_id: Uuid,
    pub session_id: Uuid,
    pub model: String,
    pub usage: Usage,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl LlmCallTrace {
    pub fn new(
        run_id: Uuid,
        session_id: Uuid,
        model: impl Into<String>,
        usage: Usage,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            run_id,
            session_id,
            model: model.into(),
            usage,
            duration_ms,
            created_at: Utc::now(),
        }
    }
}

/// Trace record for one finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTrace {
    pub run_id: Uuid,
    pub runnable_id: String,
    pub status: RunStatus,
    pub metrics: UsageMetrics,
    pub created_at: DateTime<Utc>,
}

impl RunTrace {
    pub fn from_run(run: &Run) -> Self {
        Self {
            run_id: run.id,
            runnable_id: run.runnable_id.clone(),
            status: run.status,
            metrics: run.metrics,
            created_at: Utc::now(),
        }
    }
}

/// Observability sink for model calls and run outcomes
#[async_trait]
pub trait TraceStore: Send + Sync {
    async fn record_llm_call(&self, trace: LlmCallTrace) -> Result<()>;

    async fn record_run(&self, trace: RunTrace) -> Result<()>;
}

// ============================================================================
// PermissionStore
// ============================================================================

/// Durable per-user allow/deny pattern lists. Writes are atomic per
/// `(user_id, pattern)`.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn get_rules(&self, user_id: &str) -> Result<PermissionRules>;

    async fn add_allow(&self, user_id: &str, pattern: &str) -> Result<()>;

    async fn add_deny(&self, user_id: &str, pattern: &str) -> Result<()>;
}
