// In-memory SessionStore
//
// Steps are kept per session sorted by sequence. The sequence counter is
// advanced both by allocation and by explicit persists (fork writes copied
// steps with their original sequences), so allocation never hands out a
// sequence that is already taken.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use runweave_contracts::{InteractionResponse, Run, Session, Step, SuspendedState};
use runweave_core::{CoreError, Result, SessionStore, StepRange};

/// In-memory implementation of the session store contract
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
    runs: RwLock<HashMap<Uuid, Run>>,
    steps: RwLock<HashMap<Uuid, Vec<Step>>>,
    sequences: Mutex<HashMap<Uuid, u64>>,
    suspended: RwLock<HashMap<Uuid, SuspendedState>>,
    responses: RwLock<HashMap<Uuid, InteractionResponse>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn step_count(&self, session_id: Uuid) -> usize {
        self.steps.read().get(&session_id).map_or(0, Vec::len)
    }

    /// Clear all data (for testing)
    pub fn clear(&self) {
        self.sessions.write().clear();
        self.runs.write().clear();
        self.steps.write().clear();
        self.sequences.lock().clear();
        self.suspended.write().clear();
        self.responses.write().clear();
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, session: Session) -> Result<Session> {
        self.sessions.write().insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        Ok(self.sessions.read().get(&session_id).cloned())
    }

    async fn save_run(&self, run: &Run) -> Result<()> {
        self.runs.write().insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Option<Run>> {
        Ok(self.runs.read().get(&run_id).cloned())
    }

    async fn save_step(&self, step: &Step) -> Result<()> {
        if step.sequence == 0 {
            return Err(CoreError::store("step persisted without a sequence"));
        }

        // Keep the allocator ahead of explicitly-written sequences
        {
            let mut sequences = self.sequences.lock();
            let counter = sequences.entry(step.session_id).or_insert(0);
            if *counter < step.sequence {
                *counter = step.sequence;
            }
        }

        let mut steps = self.steps.write();
        let session_steps = steps.entry(step.session_id).or_default();
        match session_steps.binary_search_by_key(&step.sequence, |s| s.sequence) {
            Ok(_) => Err(CoreError::DuplicateSequence {
                session_id: step.session_id,
                sequence: step.sequence,
            }),
            Err(position) => {
                session_steps.insert(position, step.clone());
                Ok(())
            }
        }
    }

    async fn list_steps(&self, session_id: Uuid, range: StepRange) -> Result<Vec<Step>> {
        Ok(self
            .steps
            .read()
            .get(&session_id)
            .map(|steps| {
                steps
                    .iter()
                    .filter(|s| range.contains(s.sequence))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn next_sequence(&self, session_id: Uuid) -> Result<u64> {
        let mut sequences = self.sequences.lock();
        let counter = sequences.entry(session_id).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn save_suspended_state(&self, state: &SuspendedState) -> Result<()> {
        self.suspended.write().insert(state.run_id, state.clone());
        Ok(())
    }

    async fn get_suspended_state(&self, run_id: Uuid) -> Result<Option<SuspendedState>> {
        Ok(self.suspended.read().get(&run_id).cloned())
    }

    async fn remove_suspended_state(&self, run_id: Uuid) -> Result<()> {
        self.suspended.write().remove(&run_id);
        Ok(())
    }

    async fn save_interaction_response(&self, response: &InteractionResponse) -> Result<()> {
        self.responses
            .write()
            .insert(response.request_id, response.clone());
        Ok(())
    }
}
