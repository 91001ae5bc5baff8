// In-memory TraceStore

use async_trait::async_trait;
use parking_lot::RwLock;

use runweave_core::{LlmCallTrace, Result, RunTrace, TraceStore};

/// Collects trace records in memory for inspection in tests and demos
#[derive(Default)]
pub struct InMemoryTraceStore {
    llm_calls: RwLock<Vec<LlmCallTrace>>,
    runs: RwLock<Vec<RunTrace>>,
}

impl InMemoryTraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn llm_calls(&self) -> Vec<LlmCallTrace> {
        self.llm_calls.read().clone()
    }

    pub fn runs(&self) -> Vec<RunTrace> {
        self.runs.read().clone()
    }

    pub fn llm_call_count(&self) -> usize {
        self.llm_calls.read().len()
    }
}

#[async_trait]
impl TraceStore for InMemoryTraceStore {
    async fn record_llm_call(&self, trace: LlmCallTrace) -> Result<()> {
        self.llm_calls.write().push(trace);
        Ok(())
    }

    async fn record_run(&self, trace: RunTrace) -> Result<()> {
        self.runs.write().push(trace);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runweave_contracts::Usage;
    use uuid::Uuid;

    #[tokio::test]
    async fn records_accumulate() {
        let store = InMemoryTraceStore::new();
        store
            .record_llm_call(LlmCallTrace::new(
                Uuid::now_v7(),
                Uuid::now_v7(),
                "scripted",
                Usage {
                    input_tokens: 10,
                    output_tokens: 4,
                },
                12,
            ))
            .await
            .unwrap();
        assert_eq!(store.llm_call_count(), 1);
        assert_eq!(store.llm_calls()[0].model, "scripted");
    }
}
