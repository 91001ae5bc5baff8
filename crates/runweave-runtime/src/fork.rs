// Fork engine
//
// Clones a session prefix into a fresh session, optionally modifying the
// step at the cut point. Editing a user step does not persist that step:
// its content comes back as a pending message, leaving the new session
// waiting for it to be sent as the next run's input.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use runweave_contracts::{Session, StepRole, ToolCall};
use runweave_core::{CoreError, Result, SessionStore, StepRange};

/// Edits applied to the step at `up_to_sequence`
#[derive(Debug, Clone, Default)]
pub struct ForkModification {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ForkModification {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: None,
        }
    }
}

/// Result of a fork
#[derive(Debug, Clone)]
pub struct ForkResult {
    pub session: Session,

    /// Set when the modified cut-point step was a user step: the message to
    /// send into the new session
    pub pending_user_message: Option<String>,
}

/// Clones session prefixes
pub struct ForkEngine {
    store: Arc<dyn SessionStore>,
}

impl ForkEngine {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Create a new session containing a copy of `session_id`'s steps up to
    /// and including `up_to_sequence`, applying `modification` to the step
    /// at the cut point. The source session is never touched.
    pub async fn fork(
        &self,
        session_id: Uuid,
        up_to_sequence: u64,
        modification: Option<ForkModification>,
    ) -> Result<ForkResult> {
        let source = self
            .store
            .get_session(session_id)
            .await?
            .ok_or(CoreError::SessionNotFound(session_id))?;

        let steps = self
            .store
            .list_steps(session_id, StepRange::up_to(up_to_sequence))
            .await?;
        if steps.last().map(|s| s.sequence) != Some(up_to_sequence) {
            return Err(CoreError::config(format!(
                "session {session_id} has no step at sequence {up_to_sequence}"
            )));
        }

        let mut session = Session::new();
        session.agent_id = source.agent_id.clone();
        let session = self.store.create_session(session).await?;

        let mut pending_user_message = None;
        for step in &steps {
            let mut copy = step.clone();
            copy.id = Uuid::now_v7();
            copy.session_id = session.id;

            if copy.sequence == up_to_sequence {
                if let Some(modification) = &modification {
                    if let Some(content) = &modification.content {
                        copy.content = Some(content.clone());
                    }
                    if let Some(tool_calls) = &modification.tool_calls {
                        copy.tool_calls = if tool_calls.is_empty() {
                            None
                        } else {
                            Some(tool_calls.clone())
                        };
                    }
                    // An edited user step stays unsent: hand its content
                    // back instead of persisting it
                    if copy.role == StepRole::User {
                        pending_user_message = copy.content.clone();
                        continue;
                    }
                }
            }
            self.store.save_step(&copy).await?;
        }

        info!(
            source = %session_id,
            fork = %session.id,
            up_to_sequence,
            "session forked"
        );
        Ok(ForkResult {
            session,
            pending_user_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runweave_contracts::Step;

    async fn seeded_store() -> (Arc<dyn SessionStore>, Uuid) {
        let store: Arc<dyn SessionStore> =
            Arc::new(runweave_storage::InMemorySessionStore::new());
        let session = store.create_session(Session::new()).await.unwrap();
        let run_id = Uuid::now_v7();

        let steps = vec![
            Step::user(session.id, run_id, "hello").with_sequence(1),
            Step::assistant(session.id, run_id, "hi there", vec![]).with_sequence(2),
            Step::user(session.id, run_id, "draft v1").with_sequence(3),
            Step::assistant(session.id, run_id, "first draft", vec![]).with_sequence(4),
            Step::user(session.id, run_id, "more").with_sequence(5),
        ];
        for step in &steps {
            store.save_step(step).await.unwrap();
        }
        (store, session.id)
    }

    #[tokio::test]
    async fn plain_fork_copies_prefix() {
        let (store, session_id) = seeded_store().await;
        let engine = ForkEngine::new(Arc::clone(&store));

        let fork = engine.fork(session_id, 4, None).await.unwrap();
        assert!(fork.pending_user_message.is_none());

        let copied = store
            .list_steps(fork.session.id, StepRange::all())
            .await
            .unwrap();
        assert_eq!(copied.len(), 4);
        assert_eq!(copied[3].sequence, 4);
        assert_eq!(copied[3].content.as_deref(), Some("first draft"));

        // Source unchanged
        let source = store.list_steps(session_id, StepRange::all()).await.unwrap();
        assert_eq!(source.len(), 5);
    }

    #[tokio::test]
    async fn user_step_edit_returns_pending_message() {
        let (store, session_id) = seeded_store().await;
        let engine = ForkEngine::new(Arc::clone(&store));

        let fork = engine
            .fork(session_id, 3, Some(ForkModification::content("draft v2")))
            .await
            .unwrap();
        assert_eq!(fork.pending_user_message.as_deref(), Some("draft v2"));

        let copied = store
            .list_steps(fork.session.id, StepRange::all())
            .await
            .unwrap();
        // Steps 1..2 copied; the edited user step is not persisted
        assert_eq!(copied.len(), 2);
        assert_eq!(copied.last().unwrap().sequence, 2);

        // The allocator hands out sequence 3 next, so sending the pending
        // message lands exactly at the cut point
        assert_eq!(store.next_sequence(fork.session.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn assistant_step_edit_is_persisted() {
        let (store, session_id) = seeded_store().await;
        let engine = ForkEngine::new(Arc::clone(&store));

        let fork = engine
            .fork(session_id, 4, Some(ForkModification::content("better draft")))
            .await
            .unwrap();
        assert!(fork.pending_user_message.is_none());

        let copied = store
            .list_steps(fork.session.id, StepRange::all())
            .await
            .unwrap();
        assert_eq!(copied[3].content.as_deref(), Some("better draft"));
    }

    #[tokio::test]
    async fn fork_past_the_end_is_rejected() {
        let (store, session_id) = seeded_store().await;
        let engine = ForkEngine::new(store);
        assert!(engine.fork(session_id, 9, None).await.is_err());
    }
}
