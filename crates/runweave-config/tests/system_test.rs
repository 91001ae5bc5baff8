// Config system scenarios: directory load, topological build, cycle
// rejection, cascading hot reload, delete semantics, and rollback on a
// failed rebuild.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use runweave_config::{
    BuildEnv, ChangeType, ComponentBuilder, ComponentInstance, ComponentSpec, ComponentType,
    ConfigError, ConfigSystem,
};
use runweave_contracts::RunStatus;
use runweave_core::{wire, ExecutionContext, Runnable};

fn yaml(text: &str) -> serde_yaml::Value {
    serde_yaml::from_str(text).unwrap()
}

async fn seeded_system() -> ConfigSystem {
    let system = ConfigSystem::new(BuildEnv::in_memory());
    system
        .register(yaml(
            "type: model\nname: m1\nprovider: scripted\nresponses: ['hello from m1']",
        ))
        .await
        .unwrap();
    system
        .register(yaml("type: tool\nname: echo"))
        .await
        .unwrap();
    system
        .register(yaml(
            "type: agent\nname: a1\nmodel: m1\ntools: [echo]\nsystem_prompt: be helpful",
        ))
        .await
        .unwrap();
    system
        .register(yaml(
            r#"
type: workflow
name: w1
kind: pipeline
stages:
  - id: s
    runnable: a1
"#,
        ))
        .await
        .unwrap();
    system
}

#[tokio::test]
async fn build_all_constructs_in_dependency_order_and_runs() {
    let system = seeded_system().await;
    system.build_all().await.unwrap();

    assert_eq!(system.container().len(), 4);
    assert!(system.container().contains("m1"));
    assert!(system.container().contains("a1"));

    // The built agent actually runs against the scripted model
    let agent = system.runnable("a1").unwrap();
    let (w, reader) = wire(256);
    let ctx = ExecutionContext::root("u1", w);
    let handle = tokio::spawn(async move { agent.run("hi", ctx).await });
    let _events = reader.collect().await;
    let output = handle.await.unwrap().unwrap();
    assert_eq!(output.status, RunStatus::Completed);
    assert_eq!(output.response.as_deref(), Some("hello from m1"));
}

#[tokio::test]
async fn mutually_nested_agents_are_rejected_as_a_cycle() {
    let system = ConfigSystem::new(BuildEnv::in_memory());
    system
        .register(yaml("type: model\nname: m1\nprovider: scripted"))
        .await
        .unwrap();
    system
        .register(yaml(
            "type: agent\nname: a1\nmodel: m1\ntools: [{type: agent_tool, agent: a2}]",
        ))
        .await
        .unwrap();
    system
        .register(yaml(
            "type: agent\nname: a2\nmodel: m1\ntools: [{type: agent_tool, agent: a1}]",
        ))
        .await
        .unwrap();

    let err = system.build_all().await.unwrap_err();
    match err {
        ConfigError::CycleDetected { nodes } => {
            assert_eq!(nodes, vec!["a1", "a2"]);
        }
        other => panic!("expected cycle error, got {other}"),
    }
    // Container untouched
    assert!(system.container().is_empty());
}

#[tokio::test]
async fn save_config_cascades_to_transitive_dependents_exactly_once() {
    let rebuilds: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    /// Wraps the stock agent builder to count rebuilds
    struct CountingAgentBuilder {
        inner: runweave_config::builders::AgentBuilder,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ComponentBuilder for CountingAgentBuilder {
        fn component_type(&self) -> ComponentType {
            ComponentType::Agent
        }
        async fn build(
            &self,
            spec: &ComponentSpec,
            deps: &HashMap<String, ComponentInstance>,
            env: &BuildEnv,
        ) -> Result<ComponentInstance, ConfigError> {
            self.log.lock().push(spec.name.clone());
            self.inner.build(spec, deps, env).await
        }
    }

    let system = ConfigSystem::new(BuildEnv::in_memory()).with_builder(Arc::new(
        CountingAgentBuilder {
            inner: runweave_config::builders::AgentBuilder,
            log: rebuilds.clone(),
        },
    ));
    system
        .register(yaml("type: model\nname: m1\nprovider: scripted"))
        .await
        .unwrap();
    system
        .register(yaml("type: tool\nname: echo"))
        .await
        .unwrap();
    system
        .register(yaml("type: agent\nname: a1\nmodel: m1\ntools: [echo]"))
        .await
        .unwrap();
    system
        .register(yaml(
            "type: workflow\nname: w1\nkind: pipeline\nstages: [{id: s, runnable: a1}]",
        ))
        .await
        .unwrap();
    system.build_all().await.unwrap();
    rebuilds.lock().clear();

    let changes: Arc<Mutex<Vec<(String, ChangeType)>>> = Arc::new(Mutex::new(Vec::new()));
    let changes_sink = changes.clone();
    system.on_change(move |name, change| {
        changes_sink.lock().push((name.to_string(), change));
    });

    let unrelated = system.container().get("echo").unwrap().created_at;

    // Updating the model rebuilds the agent (and its workflow), not the tool
    system
        .save_config(yaml(
            "type: model\nname: m1\nprovider: scripted\nresponses: ['updated']",
        ))
        .await
        .unwrap();

    assert_eq!(rebuilds.lock().as_slice(), ["a1"]);
    assert_eq!(system.container().get("echo").unwrap().created_at, unrelated);
    assert_eq!(
        changes.lock().as_slice(),
        [("m1".to_string(), ChangeType::Updated)]
    );

    // The rebuilt graph serves the new script
    let agent = system.runnable("a1").unwrap();
    let (w, reader) = wire(256);
    let ctx = ExecutionContext::root("u1", w);
    let handle = tokio::spawn(async move { agent.run("hi", ctx).await });
    let _events = reader.collect().await;
    let output = handle.await.unwrap().unwrap();
    assert_eq!(output.response.as_deref(), Some("updated"));
}

#[tokio::test]
async fn save_config_that_would_introduce_a_cycle_is_rejected() {
    let system = seeded_system().await;
    system.build_all().await.unwrap();
    let before = system.container().names();

    // a1 gaining w1 as a tool closes the loop a1 -> w1 -> a1
    let err = system
        .save_config(yaml(
            "type: agent\nname: a1\nmodel: m1\ntools: [echo, {type: workflow_tool, workflow: w1}]",
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigError::CycleDetected { .. }));
    assert_eq!(system.container().names(), before);

    // The prior instance still works
    assert!(system.runnable("a1").is_ok());
}

#[tokio::test]
async fn delete_config_destroys_dependents_without_rebuilding() {
    let system = seeded_system().await;
    system.build_all().await.unwrap();

    system
        .delete_config(ComponentType::Model, "m1")
        .await
        .unwrap();

    // The model and everything depending on it is gone; the tool stays
    assert!(!system.container().contains("m1"));
    assert!(!system.container().contains("a1"));
    assert!(!system.container().contains("w1"));
    assert!(system.container().contains("echo"));
}

#[tokio::test]
async fn failed_rebuild_restores_prior_instances() {
    let system = seeded_system().await;
    system.build_all().await.unwrap();
    let prior = system.container().get("a1").unwrap().created_at;

    // An unknown provider validates structurally but fails at build
    let err = system
        .save_config(yaml("type: model\nname: m1\nprovider: quantum"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidSpec { .. }));

    // Prior instances are back and functional
    assert_eq!(system.container().get("a1").unwrap().created_at, prior);
    assert!(system.runnable("a1").is_ok());
    let (w, reader) = wire(256);
    let ctx = ExecutionContext::root("u1", w);
    let agent = system.runnable("a1").unwrap();
    let handle = tokio::spawn(async move { agent.run("hi", ctx).await });
    let _events = reader.collect().await;
    assert_eq!(
        handle.await.unwrap().unwrap().status,
        RunStatus::Completed
    );
}

#[tokio::test]
async fn load_dir_and_build_from_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("model.yaml"),
        "type: model\nname: m1\nprovider: scripted\nresponses: ['from disk']\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("agent.yaml"),
        "type: agent\nname: a1\nmodel: m1\n",
    )
    .unwrap();

    let system = ConfigSystem::new(BuildEnv::in_memory());
    let loaded = system.load_dir(dir.path()).await.unwrap();
    assert_eq!(loaded, 2);
    system.build_all().await.unwrap();
    assert!(system.runnable("a1").is_ok());
}

#[tokio::test]
async fn workflow_with_inline_stage_builds_and_runs() {
    let system = ConfigSystem::new(BuildEnv::in_memory());
    system
        .register(yaml(
            "type: model\nname: m1\nprovider: scripted\nresponses: ['inline says hi']",
        ))
        .await
        .unwrap();
    system
        .register(yaml(
            r#"
type: workflow
name: w_inline
kind: pipeline
stages:
  - id: s
    runnable:
      type: agent
      name: inline_agent
      model: m1
"#,
        ))
        .await
        .unwrap();
    system.build_all().await.unwrap();

    let workflow = system.runnable("w_inline").unwrap();
    let (w, reader) = wire(256);
    let ctx = ExecutionContext::root("u1", w);
    let handle = tokio::spawn(async move { workflow.run("go", ctx).await });
    let _events = reader.collect().await;
    let output = handle.await.unwrap().unwrap();
    assert_eq!(output.response.as_deref(), Some("inline says hi"));
}
