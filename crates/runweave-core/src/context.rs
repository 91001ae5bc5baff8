// Execution context
//
// The ephemeral identity a run executes under: ids, nesting position, the
// wire events go out on, and the shared abort signal. Child contexts for
// nested runnables get a fresh run id, depth + 1, and their own wire.

use uuid::Uuid;

use runweave_contracts::SerializedContext;

use crate::abort::AbortSignal;
use crate::error::{CoreError, Result};
use crate::wire::Wire;

/// Identity and channels for one run
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub run_id: Uuid,

    /// Set once the runner has resolved or created the session
    pub session_id: Option<Uuid>,

    pub user_id: String,

    /// Nesting depth (root = 0)
    pub depth: u32,

    pub parent_run_id: Option<Uuid>,

    /// Identity of the embedding construct for nested runnables
    pub nested_runnable_id: Option<String>,

    pub wire: Wire,

    pub abort: AbortSignal,
}

impl ExecutionContext {
    /// Root context for a top-level run
    pub fn root(user_id: impl Into<String>, wire: Wire) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            session_id: None,
            user_id: user_id.into(),
            depth: 0,
            parent_run_id: None,
            nested_runnable_id: None,
            wire,
            abort: AbortSignal::new(),
        }
    }

    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_abort(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    /// Child context for a nested runnable: fresh run id, depth + 1, the
    /// parent's abort signal, a dedicated wire. The child gets its own
    /// session; interleaving a nested run's steps into the parent session
    /// would split the parent's assistant/tool-step groups.
    pub fn child(&self, nested_runnable_id: impl Into<String>, wire: Wire) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            session_id: None,
            user_id: self.user_id.clone(),
            depth: self.depth + 1,
            parent_run_id: Some(self.run_id),
            nested_runnable_id: Some(nested_runnable_id.into()),
            wire,
            abort: self.abort.clone(),
        }
    }

    /// Rebuild a context from a durable projection, e.g. when resuming a
    /// suspended run. The abort signal starts fresh.
    pub fn rehydrate(run_id: Uuid, serialized: &SerializedContext, wire: Wire) -> Self {
        Self {
            run_id,
            session_id: Some(serialized.session_id),
            user_id: serialized.user_id.clone(),
            depth: serialized.depth,
            parent_run_id: serialized.parent_run_id,
            nested_runnable_id: serialized.nested_runnable_id.clone(),
            wire,
            abort: AbortSignal::new(),
        }
    }

    /// Durable projection for suspended-state records. Requires the session
    /// to be resolved.
    pub fn serialized(&self) -> Result<SerializedContext> {
        let session_id = self
            .session_id
            .ok_or_else(|| CoreError::config("context has no session"))?;
        Ok(SerializedContext {
            session_id,
            user_id: self.user_id.clone(),
            depth: self.depth,
            parent_run_id: self.parent_run_id,
            nested_runnable_id: self.nested_runnable_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::wire;

    #[test]
    fn child_context_nests() {
        let (w, _r) = wire(4);
        let root = ExecutionContext::root("u1", w.clone()).with_session(Uuid::now_v7());
        let (cw, _cr) = wire(4);
        let child = root.child("nested-agent", cw);

        assert_eq!(child.depth, 1);
        assert_eq!(child.parent_run_id, Some(root.run_id));
        assert_eq!(child.session_id, None);
        assert_eq!(child.nested_runnable_id.as_deref(), Some("nested-agent"));
        assert_ne!(child.run_id, root.run_id);
    }

    #[test]
    fn serialized_requires_session() {
        let (w, _r) = wire(4);
        let ctx = ExecutionContext::root("u1", w);
        assert!(ctx.serialized().is_err());
        let ctx = ctx.with_session(Uuid::now_v7());
        assert!(ctx.serialized().is_ok());
    }
}
