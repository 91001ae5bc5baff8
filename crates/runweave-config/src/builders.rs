// Component builders
//
// One builder per component type. Builders receive the parsed spec and the
// already-built instances of every dependency, construct the live
// instance, and may clean up when the reload coordinator tears one down.
//
// Tool dependency injection: a tool spec's `dependencies` map has already
// been resolved from component names to instances by the time a factory
// runs; the factory takes the parameters it wants and ignores the rest.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use runweave_core::builtins::builtin_tool;
use runweave_core::{
    LlmCallConfig, PermissionManager, ScriptedDriver, ScriptedResponse, SessionStore, Tool,
    ToolExecutor, TraceStore,
};
use runweave_runtime::{
    Agent, AgentConfig, LoopWorkflow, ParallelWorkflow, PipelineWorkflow, RunnableTool, Stage,
};
use runweave_storage::{InMemoryPermissionStore, InMemorySessionStore, InMemoryTraceStore};

use crate::container::ComponentInstance;
use crate::error::{ConfigError, ConfigResult};
use crate::spec::{
    AgentSpec, AgentToolRef, ComponentSpec, ComponentType, ModelSpec, RunnableRef,
    ToolComponentSpec, TypedToolRef, WorkflowKind, WorkflowSpec,
};

// ============================================================================
// Build environment
// ============================================================================

/// Shared infrastructure that is not itself a component: the permission
/// manager and the fallback stores used when a spec names none.
#[derive(Clone)]
pub struct BuildEnv {
    pub permissions: PermissionManager,
    pub default_session_store: Arc<dyn SessionStore>,
    pub trace_store: Option<Arc<dyn TraceStore>>,
}

impl BuildEnv {
    /// Environment backed entirely by in-memory stores
    pub fn in_memory() -> Self {
        Self {
            permissions: PermissionManager::new(Arc::new(InMemoryPermissionStore::new())),
            default_session_store: Arc::new(InMemorySessionStore::new()),
            trace_store: Some(Arc::new(InMemoryTraceStore::new())),
        }
    }
}

// ============================================================================
// Builder contract
// ============================================================================

/// Constructs instances for one component type
#[async_trait]
pub trait ComponentBuilder: Send + Sync {
    fn component_type(&self) -> ComponentType;

    async fn build(
        &self,
        spec: &ComponentSpec,
        deps: &HashMap<String, ComponentInstance>,
        env: &BuildEnv,
    ) -> ConfigResult<ComponentInstance>;

    /// Called when the reload coordinator destroys an instance
    fn cleanup(&self, name: &str, _instance: &ComponentInstance) {
        debug!(component = %name, "component destroyed");
    }
}

/// The builder set for every known component type
pub fn default_builders() -> Vec<Arc<dyn ComponentBuilder>> {
    vec![
        Arc::new(ModelBuilder),
        Arc::new(ToolBuilder::new()),
        Arc::new(AgentBuilder),
        Arc::new(WorkflowBuilder),
        Arc::new(SessionStoreBuilder),
        Arc::new(TraceStoreBuilder),
        Arc::new(OpaqueBuilder(ComponentType::CitationStore)),
        Arc::new(OpaqueBuilder(ComponentType::Memory)),
        Arc::new(OpaqueBuilder(ComponentType::Knowledge)),
    ]
}

// ============================================================================
// Model
// ============================================================================

/// Builds model drivers. Only the scripted provider is built into the
/// core; real transports register their own builder.
pub struct ModelBuilder;

#[async_trait]
impl ComponentBuilder for ModelBuilder {
    fn component_type(&self) -> ComponentType {
        ComponentType::Model
    }

    async fn build(
        &self,
        spec: &ComponentSpec,
        _deps: &HashMap<String, ComponentInstance>,
        _env: &BuildEnv,
    ) -> ConfigResult<ComponentInstance> {
        let model: ModelSpec = spec.typed()?;
        match model.provider.as_str() {
            "scripted" => {
                let driver = if model.responses.is_empty() {
                    ScriptedDriver::echo()
                } else {
                    ScriptedDriver::new(
                        model
                            .responses
                            .iter()
                            .map(|text| ScriptedResponse::text(text))
                            .collect(),
                    )
                };
                Ok(ComponentInstance::Driver(Arc::new(driver)))
            }
            other => Err(ConfigError::invalid(
                &spec.name,
                format!("unknown model provider '{other}' (no transport registered)"),
            )),
        }
    }
}

// ============================================================================
// Tool
// ============================================================================

/// Factory signature: resolved dependency instances in, tool out
pub type ToolFactory =
    Arc<dyn Fn(&HashMap<String, ComponentInstance>) -> ConfigResult<Arc<dyn Tool>> + Send + Sync>;

/// Builds tools from the builtin library plus registered custom factories
pub struct ToolBuilder {
    factories: HashMap<String, ToolFactory>,
}

impl ToolBuilder {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a custom tool factory under a spec `tool:` name
    pub fn with_factory(mut self, name: impl Into<String>, factory: ToolFactory) -> Self {
        self.factories.insert(name.into(), factory);
        self
    }
}

impl Default for ToolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComponentBuilder for ToolBuilder {
    fn component_type(&self) -> ComponentType {
        ComponentType::Tool
    }

    async fn build(
        &self,
        spec: &ComponentSpec,
        deps: &HashMap<String, ComponentInstance>,
        _env: &BuildEnv,
    ) -> ConfigResult<ComponentInstance> {
        let tool_spec: ToolComponentSpec = spec.typed()?;
        let factory_name = tool_spec.tool.as_deref().unwrap_or(&spec.name);

        // Resolve declared dependencies to instances for the factory
        let mut resolved: HashMap<String, ComponentInstance> = HashMap::new();
        for (param, component_name) in &tool_spec.dependencies {
            let instance = deps.get(component_name).ok_or_else(|| {
                ConfigError::UnresolvableDependency {
                    component: spec.name.clone(),
                    dependency: component_name.clone(),
                }
            })?;
            resolved.insert(param.clone(), instance.clone());
        }

        if let Some(factory) = self.factories.get(factory_name) {
            return Ok(ComponentInstance::Tool(factory(&resolved)?));
        }
        if let Some(tool) = builtin_tool(factory_name) {
            return Ok(ComponentInstance::Tool(tool));
        }
        Err(ConfigError::invalid(
            &spec.name,
            format!("no tool factory or builtin named '{factory_name}'"),
        ))
    }
}

// ============================================================================
// Agent
// ============================================================================

/// Assembles agents from their model, tools, and stores
pub struct AgentBuilder;

pub(crate) fn build_agent(
    spec: &ComponentSpec,
    deps: &HashMap<String, ComponentInstance>,
    env: &BuildEnv,
) -> ConfigResult<Arc<Agent>> {
    let agent_spec: AgentSpec = spec.typed()?;

    let driver = lookup(deps, &spec.name, &agent_spec.model)?.as_driver(&agent_spec.model)?;

    let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
    for tool_ref in &agent_spec.tools {
        match tool_ref {
            AgentToolRef::Named(name) => {
                tools.push(lookup(deps, &spec.name, name)?.as_tool(name)?);
            }
            AgentToolRef::Typed(TypedToolRef::AgentTool { agent }) => {
                let runnable = lookup(deps, &spec.name, agent)?.as_runnable(agent)?;
                tools.push(Arc::new(RunnableTool::wrap(runnable)));
            }
            AgentToolRef::Typed(TypedToolRef::WorkflowTool { workflow }) => {
                let runnable = lookup(deps, &spec.name, workflow)?.as_runnable(workflow)?;
                tools.push(Arc::new(RunnableTool::wrap(runnable)));
            }
        }
    }

    let store = match &agent_spec.session_store {
        Some(name) => lookup(deps, &spec.name, name)?.as_session_store(name)?,
        None => Arc::clone(&env.default_session_store),
    };

    let mut config = AgentConfig::new(&spec.name, LlmCallConfig::new(&agent_spec.model));
    config.system_prompt = agent_spec.system_prompt.clone();
    if let Some(max_steps) = agent_spec.max_steps {
        config.max_steps = max_steps;
    }
    if let Some(history_limit) = agent_spec.history_limit {
        config.history_limit = Some(history_limit);
    }
    if let Some(max_depth) = agent_spec.max_depth {
        config.max_depth = max_depth;
    }
    config.enable_termination_summary = agent_spec.enable_termination_summary;
    config.include_reasoning = agent_spec.include_reasoning;

    let executor = Arc::new(ToolExecutor::new(tools, env.permissions.clone()));
    let mut agent = Agent::new(config, driver, executor, store);
    if let Some(traces) = &env.trace_store {
        agent = agent.with_traces(Arc::clone(traces));
    }
    Ok(Arc::new(agent))
}

#[async_trait]
impl ComponentBuilder for AgentBuilder {
    fn component_type(&self) -> ComponentType {
        ComponentType::Agent
    }

    async fn build(
        &self,
        spec: &ComponentSpec,
        deps: &HashMap<String, ComponentInstance>,
        env: &BuildEnv,
    ) -> ConfigResult<ComponentInstance> {
        Ok(ComponentInstance::Runnable(build_agent(spec, deps, env)?))
    }
}

// ============================================================================
// Workflow
// ============================================================================

/// Assembles pipeline, parallel, and loop workflows; inline stage specs
/// are built with the workflow
pub struct WorkflowBuilder;

pub(crate) fn build_workflow(
    spec: &ComponentSpec,
    deps: &HashMap<String, ComponentInstance>,
    env: &BuildEnv,
) -> ConfigResult<Arc<dyn runweave_core::Runnable>> {
    let workflow_spec: WorkflowSpec = spec.typed()?;

    let store = match &workflow_spec.session_store {
        Some(name) => lookup(deps, &spec.name, name)?.as_session_store(name)?,
        None => Arc::clone(&env.default_session_store),
    };

    let mut stages = Vec::with_capacity(workflow_spec.stages.len());
    for stage_spec in &workflow_spec.stages {
        let runnable: Arc<dyn runweave_core::Runnable> = match &stage_spec.runnable {
            RunnableRef::Name(name) => lookup(deps, &spec.name, name)?.as_runnable(name)?,
            RunnableRef::Inline(value) => {
                let inline = ComponentSpec::from_value(value.clone(), &spec.name)?;
                match inline.component_type {
                    ComponentType::Agent => build_agent(&inline, deps, env)?,
                    ComponentType::Workflow => build_workflow(&inline, deps, env)?,
                    other => {
                        return Err(ConfigError::invalid(
                            &spec.name,
                            format!("inline stage spec must be agent or workflow, got {other}"),
                        ))
                    }
                }
            }
        };
        let mut stage = Stage::new(&stage_spec.id, runnable);
        if let Some(input) = &stage_spec.input {
            stage = stage.with_input(input);
        }
        if let Some(condition) = &stage_spec.condition {
            stage = stage.with_condition(condition);
        }
        stages.push(stage);
    }

    let runnable: Arc<dyn runweave_core::Runnable> = match workflow_spec.kind {
        WorkflowKind::Pipeline => {
            let mut pipeline = PipelineWorkflow::new(&spec.name, store, stages);
            if let Some(template) = &workflow_spec.output_template {
                pipeline = pipeline.with_output_template(template);
            }
            Arc::new(pipeline)
        }
        WorkflowKind::Parallel => {
            let mut parallel = ParallelWorkflow::new(&spec.name, store, stages);
            if let Some(template) = &workflow_spec.merge_template {
                parallel = parallel.with_merge_template(template);
            }
            if !workflow_spec.strict {
                parallel = parallel.lenient();
            }
            Arc::new(parallel)
        }
        WorkflowKind::Loop => {
            let condition = workflow_spec.condition.clone().ok_or_else(|| {
                ConfigError::invalid(&spec.name, "loop workflow requires a condition")
            })?;
            let max_iterations = workflow_spec.max_iterations.unwrap_or(5);
            let mut looping =
                LoopWorkflow::new(&spec.name, store, stages, condition, max_iterations);
            if let Some(template) = &workflow_spec.output_template {
                looping = looping.with_output_template(template);
            }
            Arc::new(looping)
        }
    };
    Ok(runnable)
}

#[async_trait]
impl ComponentBuilder for WorkflowBuilder {
    fn component_type(&self) -> ComponentType {
        ComponentType::Workflow
    }

    async fn build(
        &self,
        spec: &ComponentSpec,
        deps: &HashMap<String, ComponentInstance>,
        env: &BuildEnv,
    ) -> ConfigResult<ComponentInstance> {
        Ok(ComponentInstance::Runnable(build_workflow(spec, deps, env)?))
    }
}

// ============================================================================
// Stores and opaque components
// ============================================================================

/// Builds an in-memory session store per component
pub struct SessionStoreBuilder;

#[async_trait]
impl ComponentBuilder for SessionStoreBuilder {
    fn component_type(&self) -> ComponentType {
        ComponentType::SessionStore
    }

    async fn build(
        &self,
        _spec: &ComponentSpec,
        _deps: &HashMap<String, ComponentInstance>,
        _env: &BuildEnv,
    ) -> ConfigResult<ComponentInstance> {
        Ok(ComponentInstance::SessionStore(Arc::new(
            InMemorySessionStore::new(),
        )))
    }
}

/// Builds an in-memory trace store per component
pub struct TraceStoreBuilder;

#[async_trait]
impl ComponentBuilder for TraceStoreBuilder {
    fn component_type(&self) -> ComponentType {
        ComponentType::TraceStore
    }

    async fn build(
        &self,
        _spec: &ComponentSpec,
        _deps: &HashMap<String, ComponentInstance>,
        _env: &BuildEnv,
    ) -> ConfigResult<ComponentInstance> {
        Ok(ComponentInstance::TraceStore(Arc::new(
            InMemoryTraceStore::new(),
        )))
    }
}

/// Pass-through builder for components the core treats as opaque handles
pub struct OpaqueBuilder(pub ComponentType);

#[async_trait]
impl ComponentBuilder for OpaqueBuilder {
    fn component_type(&self) -> ComponentType {
        self.0
    }

    async fn build(
        &self,
        spec: &ComponentSpec,
        _deps: &HashMap<String, ComponentInstance>,
        _env: &BuildEnv,
    ) -> ConfigResult<ComponentInstance> {
        Ok(ComponentInstance::Opaque(Arc::new(spec.body.clone())))
    }
}

fn lookup<'a>(
    deps: &'a HashMap<String, ComponentInstance>,
    component: &str,
    name: &str,
) -> ConfigResult<&'a ComponentInstance> {
    deps.get(name).ok_or_else(|| ConfigError::UnresolvableDependency {
        component: component.to_string(),
        dependency: name.to_string(),
    })
}
