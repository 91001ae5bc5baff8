//! Simple Agent Example
//!
//! Drives one agent run against the scripted driver and prints the event
//! stream as it arrives, including a tool round trip.
//!
//! Run with: cargo run --example simple_agent -p runweave-runtime

use std::sync::Arc;

use runweave_contracts::ToolCall;
use runweave_core::builtins::EchoTool;
use runweave_core::{
    wire, ExecutionContext, LlmCallConfig, PermissionManager, Runnable, ScriptedDriver,
    ScriptedResponse, SessionStore, ToolExecutor,
};
use runweave_runtime::{Agent, AgentConfig};
use runweave_storage::{InMemoryPermissionStore, InMemorySessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let store = Arc::new(InMemorySessionStore::new());
    let executor = Arc::new(ToolExecutor::new(
        vec![Arc::new(EchoTool)],
        PermissionManager::new(Arc::new(InMemoryPermissionStore::new())),
    ));

    let driver = ScriptedDriver::new(vec![
        ScriptedResponse::tool_calls(vec![ToolCall::new(
            "call_1",
            "echo",
            "{\"text\":\"hello from the tool\"}",
        )]),
        ScriptedResponse::text("The echo tool answered: hello from the tool"),
    ]);

    let agent = Arc::new(Agent::new(
        AgentConfig::new("demo-agent", LlmCallConfig::new("scripted"))
            .with_system_prompt("be terse"),
        Arc::new(driver),
        executor,
        store.clone() as Arc<dyn SessionStore>,
    ));

    let (w, mut reader) = wire(256);
    let ctx = ExecutionContext::root("demo-user", w);
    let handle = tokio::spawn(async move { agent.run("say hello", ctx).await });

    while let Some(event) = reader.recv().await {
        println!("{:>3} {}", event.local_sequence, event.kind());
    }

    let output = handle.await??;
    println!("\nstatus:   {}", output.status);
    println!("response: {}", output.response.unwrap_or_default());

    let steps = store
        .list_steps(output.session_id, runweave_core::StepRange::all())
        .await?;
    println!("steps persisted: {}", steps.len());
    for step in steps {
        println!(
            "  seq={} role={} content={:?}",
            step.sequence, step.role, step.content
        );
    }
    Ok(())
}
