//! Config-Driven Assembly Example
//!
//! Registers a model, a tool, an agent, and a pipeline workflow from YAML,
//! builds the graph, runs the workflow, then hot-reloads the model and
//! runs again.
//!
//! Run with: cargo run --example config_driven -p runweave-config

use runweave_config::{BuildEnv, ConfigSystem};
use runweave_core::{wire, ExecutionContext, Runnable};

fn yaml(text: &str) -> serde_yaml::Value {
    serde_yaml::from_str(text).expect("example yaml is valid")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let system = ConfigSystem::new(BuildEnv::in_memory());
    system.on_change(|name, change| println!("[reload] {name}: {change}"));

    system
        .register(yaml(
            "type: model\nname: writer-model\nprovider: scripted\nresponses: ['a first draft']",
        ))
        .await?;
    system.register(yaml("type: tool\nname: echo")).await?;
    system
        .register(yaml(
            "type: agent\nname: writer\nmodel: writer-model\ntools: [echo]",
        ))
        .await?;
    system
        .register(yaml(
            r#"
type: workflow
name: draft-pipeline
kind: pipeline
stages:
  - id: draft
    runnable: writer
    input: "{input}"
"#,
        ))
        .await?;

    system.build_all().await?;
    println!("built: {:?}", system.container().names());

    run_workflow(&system, "write about rivers").await?;

    // Hot reload: swap the model script; the agent and workflow rebuild
    system
        .save_config(yaml(
            "type: model\nname: writer-model\nprovider: scripted\nresponses: ['a better draft']",
        ))
        .await?;

    run_workflow(&system, "write about rivers, again").await?;
    Ok(())
}

async fn run_workflow(system: &ConfigSystem, input: &str) -> anyhow::Result<()> {
    let workflow = system.runnable("draft-pipeline")?;
    let (w, reader) = wire(256);
    let ctx = ExecutionContext::root("demo-user", w);
    let input_owned = input.to_string();
    let handle = tokio::spawn(async move { workflow.run(&input_owned, ctx).await });
    let events = reader.collect().await;
    let output = handle.await??;
    println!(
        "ran '{input}': {} events, response: {}",
        events.len(),
        output.response.unwrap_or_default()
    );
    Ok(())
}
