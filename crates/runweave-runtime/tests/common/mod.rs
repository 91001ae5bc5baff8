// Shared fixtures for the runner test suites
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use runweave_contracts::{StepEvent, ToolPolicy};
use runweave_core::{
    wire, ExecutionContext, PermissionManager, Result, RunOutput, Runnable, ScriptedDriver,
    SessionStore, Tool, ToolExecutor, ToolOutput,
};
use runweave_runtime::{Agent, AgentConfig};
use runweave_core::LlmCallConfig;
use runweave_storage::{InMemoryPermissionStore, InMemorySessionStore};

pub const WIRE_CAPACITY: usize = 1024;

/// A consent-gated command tool for suspension scenarios
pub struct RunCmdTool;

#[async_trait]
impl Tool for RunCmdTool {
    fn name(&self) -> &str {
        "run_cmd"
    }

    fn description(&self) -> &str {
        "Run a shell command."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "cmd": { "type": "string" }
            },
            "required": ["cmd"]
        })
    }

    fn default_policy(&self) -> ToolPolicy {
        ToolPolicy::RequiresConsent
    }

    async fn execute(&self, args: Value, _ctx: &ExecutionContext) -> Result<ToolOutput> {
        let cmd = args.get("cmd").and_then(Value::as_str).unwrap_or_default();
        Ok(ToolOutput::text(format!("ran: {cmd}")))
    }
}

pub struct Fixture {
    pub store: Arc<InMemorySessionStore>,
    pub permissions: Arc<InMemoryPermissionStore>,
    pub agent: Arc<Agent>,
}

/// Build an agent around a scripted driver and the given tools
pub fn agent_fixture(
    id: &str,
    driver: ScriptedDriver,
    tools: Vec<Arc<dyn Tool>>,
    configure: impl FnOnce(AgentConfig) -> AgentConfig,
) -> Fixture {
    let store = Arc::new(InMemorySessionStore::new());
    let permissions = Arc::new(InMemoryPermissionStore::new());
    let permission_store: Arc<dyn runweave_core::PermissionStore> = permissions.clone();
    let executor = Arc::new(ToolExecutor::new(
        tools,
        PermissionManager::new(permission_store),
    ));
    let config = configure(AgentConfig::new(id, LlmCallConfig::new("scripted")));
    let agent = Agent::new(
        config,
        Arc::new(driver),
        executor,
        store.clone() as Arc<dyn SessionStore>,
    );
    Fixture {
        store,
        permissions,
        agent: Arc::new(agent),
    }
}

/// Spawn a run and drain its wire concurrently
pub async fn run_and_collect(
    runnable: Arc<dyn Runnable>,
    input: &str,
    session_id: Option<Uuid>,
    user_id: &str,
) -> (Result<RunOutput>, Vec<StepEvent>) {
    let (w, reader) = wire(WIRE_CAPACITY);
    let mut ctx = ExecutionContext::root(user_id, w);
    if let Some(session_id) = session_id {
        ctx = ctx.with_session(session_id);
    }
    let input = input.to_string();
    let handle = tokio::spawn(async move { runnable.run(&input, ctx).await });
    let events = reader.collect().await;
    let output = handle.await.expect("run task panicked");
    (output, events)
}

/// Positions of each event kind, for ordering assertions
pub fn kinds(events: &[StepEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.kind()).collect()
}

pub fn position_of(events: &[StepEvent], kind: &str) -> usize {
    events
        .iter()
        .position(|e| e.kind() == kind)
        .unwrap_or_else(|| panic!("no '{kind}' event emitted"))
}
