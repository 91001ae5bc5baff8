// Workflow composition scenarios: pipeline piping, parallel fan-out with
// branch stamping, loop bounds, conditional stage skipping, and nesting
// through the runnable-as-tool adapter.

mod common;

use std::sync::Arc;

use common::run_and_collect;

use runweave_contracts::{EventPayload, RunStatus, ToolCall};
use runweave_core::{
    LlmCallConfig, PermissionManager, Runnable, ScriptedDriver, ScriptedResponse, SessionStore,
    ToolExecutor,
};
use runweave_runtime::{
    Agent, AgentConfig, LoopWorkflow, ParallelWorkflow, PipelineWorkflow, RunnableTool, Stage,
};
use runweave_storage::{InMemoryPermissionStore, InMemorySessionStore};

/// Echo agent sharing the workflow's session store
fn echo_agent(id: &str, store: Arc<InMemorySessionStore>) -> Arc<dyn Runnable> {
    let executor = Arc::new(ToolExecutor::new(
        vec![],
        PermissionManager::new(Arc::new(InMemoryPermissionStore::new())),
    ));
    Arc::new(Agent::new(
        AgentConfig::new(id, LlmCallConfig::new("scripted")),
        Arc::new(ScriptedDriver::echo()),
        executor,
        store as Arc<dyn SessionStore>,
    ))
}

#[tokio::test]
async fn pipeline_pipes_outputs_between_stages() {
    let store = Arc::new(InMemorySessionStore::new());
    let ra = echo_agent("ra", store.clone());
    let rb = echo_agent("rb", store.clone());

    let workflow = Arc::new(PipelineWorkflow::new(
        "w",
        store.clone() as Arc<dyn SessionStore>,
        vec![
            Stage::new("a", ra).with_input("{input}"),
            Stage::new("b", rb).with_input("previous said: {a.output}"),
        ],
    ));

    let (output, events) = run_and_collect(workflow, "topic X", None, "u1").await;
    let output = output.unwrap();

    assert_eq!(output.status, RunStatus::Completed);
    assert_eq!(
        output.response.as_deref(),
        Some("previous said: topic X")
    );

    // Child events were forwarded onto the parent wire with the workflow
    // run as parent and depth 1
    let forwarded: Vec<_> = events.iter().filter(|e| e.depth == 1).collect();
    assert!(!forwarded.is_empty());
    assert!(forwarded
        .iter()
        .all(|e| e.parent_run_id == Some(output.run_id)));

    // Two child runs exist, each in its own session, nested under the
    // workflow run
    let child_run_ids: std::collections::HashSet<_> =
        forwarded.iter().map(|e| e.run_id).collect();
    assert_eq!(child_run_ids.len(), 2);
    for child_id in child_run_ids {
        let child = store.get_run(child_id).await.unwrap().unwrap();
        assert_eq!(child.depth, 1);
        assert_eq!(child.parent_run_id, Some(output.run_id));
        assert_ne!(child.session_id, output.session_id);
    }
}

#[tokio::test]
async fn pipeline_skips_stages_with_false_conditions() {
    let store = Arc::new(InMemorySessionStore::new());
    let ra = echo_agent("ra", store.clone());
    let rb = echo_agent("rb", store.clone());

    let workflow = Arc::new(PipelineWorkflow::new(
        "w",
        store as Arc<dyn SessionStore>,
        vec![
            Stage::new("a", ra),
            Stage::new("b", rb)
                .with_input("never")
                .with_condition("{a.output} == 'something else'"),
        ],
    ));

    let (output, _events) = run_and_collect(workflow, "hello", None, "u1").await;
    let output = output.unwrap();

    // The skipped stage contributes nothing; the pipeline output is the
    // last non-skipped stage's response
    assert_eq!(output.response.as_deref(), Some("hello"));
}

#[tokio::test]
async fn parallel_branches_run_and_merge_in_declared_order() {
    let store = Arc::new(InMemorySessionStore::new());
    let left = echo_agent("left", store.clone());
    let right = echo_agent("right", store.clone());

    let workflow = Arc::new(
        ParallelWorkflow::new(
            "fanout",
            store as Arc<dyn SessionStore>,
            vec![
                Stage::new("a", left).with_input("A:{input}"),
                Stage::new("b", right).with_input("B:{input}"),
            ],
        )
        .with_merge_template("{a.output} | {b.output}"),
    );

    let (output, events) = run_and_collect(workflow, "x", None, "u1").await;
    let output = output.unwrap();

    assert_eq!(output.status, RunStatus::Completed);
    assert_eq!(output.response.as_deref(), Some("A:x | B:x"));

    // Forwarded branch events carry their branch id
    let branches: std::collections::HashSet<_> = events
        .iter()
        .filter_map(|e| e.branch_id.clone())
        .collect();
    assert!(branches.contains("a"));
    assert!(branches.contains("b"));

    // Per-branch streams keep their internal order
    for branch in ["a", "b"] {
        let locals: Vec<u64> = events
            .iter()
            .filter(|e| e.branch_id.as_deref() == Some(branch))
            .map(|e| e.local_sequence)
            .collect();
        let mut sorted = locals.clone();
        sorted.sort_unstable();
        assert_eq!(locals, sorted);
    }
}

#[tokio::test]
async fn loop_workflow_stops_on_condition_and_bound() {
    let store = Arc::new(InMemorySessionStore::new());
    let worker = echo_agent("worker", store.clone());

    let workflow = Arc::new(
        LoopWorkflow::new(
            "repeat",
            store.clone() as Arc<dyn SessionStore>,
            vec![Stage::new("s", worker).with_input("pass {iteration}")],
            "{iteration} != 2",
            5,
        )
        .with_output_template("last: {s.output}"),
    );

    let (output, _events) = run_and_collect(workflow, "start", None, "u1").await;
    let output = output.unwrap();

    // Iteration 1 runs, condition (1 != 2) holds, iteration 2 runs,
    // condition (2 != 2) fails, loop ends
    assert_eq!(output.response.as_deref(), Some("last: pass 2"));

    // One workflow session plus one child session per iteration
    assert_eq!(store.session_count(), 3);
}

#[tokio::test]
async fn loop_workflow_hits_max_iterations() {
    let store = Arc::new(InMemorySessionStore::new());
    let worker = echo_agent("worker", store.clone());

    let workflow = Arc::new(LoopWorkflow::new(
        "forever",
        store as Arc<dyn SessionStore>,
        vec![Stage::new("s", worker).with_input("tick {iteration}")],
        "true",
        3,
    ));

    let (output, _events) = run_and_collect(workflow, "go", None, "u1").await;
    let output = output.unwrap();
    // Env snapshot output includes the final iteration count
    assert!(output.response.unwrap().contains("\"iteration\":\"3\""));
}

#[tokio::test]
async fn agent_invokes_nested_agent_through_the_adapter() {
    let store = Arc::new(InMemorySessionStore::new());
    let helper = echo_agent("helper", store.clone());

    let fixture = {
        use runweave_core::Tool;

        let nested_tool: Arc<dyn Tool> = Arc::new(RunnableTool::wrap(helper));
        let executor = Arc::new(ToolExecutor::new(
            vec![nested_tool],
            PermissionManager::new(Arc::new(InMemoryPermissionStore::new())),
        ));
        Arc::new(Agent::new(
            AgentConfig::new("parent", LlmCallConfig::new("scripted")),
            Arc::new(ScriptedDriver::new(vec![
                ScriptedResponse::tool_calls(vec![ToolCall::new(
                    "t1",
                    "run_helper",
                    "{\"input\":\"delegate this\"}",
                )]),
                ScriptedResponse::text("helper answered"),
            ])),
            executor,
            store.clone() as Arc<dyn SessionStore>,
        ))
    };

    let (output, events) = run_and_collect(fixture, "outer", None, "u1").await;
    let output = output.unwrap();
    assert_eq!(output.status, RunStatus::Completed);

    // The nested run's events surfaced on the parent wire at depth 1 with
    // the parent's run id stamped
    let nested: Vec<_> = events.iter().filter(|e| e.depth == 1).collect();
    assert!(!nested.is_empty());
    assert!(nested.iter().all(|e| e.parent_run_id == Some(output.run_id)));

    // The tool step carries the helper's final response
    let tool_step = events
        .iter()
        .find_map(|e| match &e.payload {
            EventPayload::StepCompleted { snapshot }
                if snapshot.role == runweave_contracts::StepRole::Tool =>
            {
                Some(snapshot.clone())
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(tool_step.content.as_deref(), Some("delegate this"));
}

#[tokio::test]
async fn depth_ceiling_refuses_runaway_nesting() {
    let store = Arc::new(InMemorySessionStore::new());
    let agent = {
        let executor = Arc::new(ToolExecutor::new(
            vec![],
            PermissionManager::new(Arc::new(InMemoryPermissionStore::new())),
        ));
        let mut config = AgentConfig::new("shallow", LlmCallConfig::new("scripted"));
        config.max_depth = 1;
        Arc::new(Agent::new(
            config,
            Arc::new(ScriptedDriver::fixed("hi")),
            executor,
            store as Arc<dyn SessionStore>,
        ))
    };

    let (w, _reader) = runweave_core::wire(16);
    let root = runweave_core::ExecutionContext::root("u1", w);
    let (cw, _cr) = runweave_core::wire(16);
    let child = root.child("nested", cw);
    let (gw, _gr) = runweave_core::wire(16);
    let grandchild = child.child("deeper", gw);

    let err = agent.run("too deep", grandchild).await.unwrap_err();
    assert!(matches!(err, runweave_core::CoreError::DepthExceeded(1)));
}
