// Component spec schemas
//
// A spec file is one YAML document with at least `type` and `name`. The
// raw body is kept alongside the parsed header so each builder can
// deserialize its own typed view.

use std::collections::HashMap;

use serde::Deserialize;

/// The nine component types the assembly layer knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Model,
    Tool,
    Agent,
    Workflow,
    SessionStore,
    TraceStore,
    CitationStore,
    Memory,
    Knowledge,
}

impl ComponentType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "model" => Some(ComponentType::Model),
            "tool" => Some(ComponentType::Tool),
            "agent" => Some(ComponentType::Agent),
            "workflow" => Some(ComponentType::Workflow),
            "session_store" => Some(ComponentType::SessionStore),
            "trace_store" => Some(ComponentType::TraceStore),
            "citation_store" => Some(ComponentType::CitationStore),
            "memory" => Some(ComponentType::Memory),
            "knowledge" => Some(ComponentType::Knowledge),
            _ => None,
        }
    }
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ComponentType::Model => "model",
            ComponentType::Tool => "tool",
            ComponentType::Agent => "agent",
            ComponentType::Workflow => "workflow",
            ComponentType::SessionStore => "session_store",
            ComponentType::TraceStore => "trace_store",
            ComponentType::CitationStore => "citation_store",
            ComponentType::Memory => "memory",
            ComponentType::Knowledge => "knowledge",
        };
        write!(f, "{s}")
    }
}

/// A parsed component spec: typed header plus the raw body for the builder
#[derive(Debug, Clone)]
pub struct ComponentSpec {
    pub component_type: ComponentType,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub tags: Vec<String>,
    pub body: serde_yaml::Value,
}

impl ComponentSpec {
    /// Parse a YAML document. `location` names the source for error text.
    pub fn from_value(
        value: serde_yaml::Value,
        location: &str,
    ) -> Result<Self, crate::error::ConfigError> {
        use crate::error::ConfigError;

        let mapping = value
            .as_mapping()
            .ok_or_else(|| ConfigError::invalid(location, "spec must be a mapping"))?;

        let raw_type = mapping
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConfigError::MissingField {
                field: "type".to_string(),
                location: location.to_string(),
            })?;
        let component_type = ComponentType::parse(raw_type)
            .ok_or_else(|| ConfigError::UnknownType(raw_type.to_string()))?;

        let name = mapping
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConfigError::MissingField {
                field: "name".to_string(),
                location: location.to_string(),
            })?
            .to_string();

        let description = mapping
            .get("description")
            .and_then(|v| v.as_str())
            .map(String::from);
        let enabled = mapping
            .get("enabled")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        let tags = mapping
            .get("tags")
            .and_then(|v| v.as_sequence())
            .map(|seq| {
                seq.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            component_type,
            name,
            description,
            enabled,
            tags,
            body: value,
        })
    }

    /// Deserialize the body into a typed per-type view
    pub fn typed<T: for<'de> Deserialize<'de>>(&self) -> Result<T, crate::error::ConfigError> {
        serde_yaml::from_value(self.body.clone()).map_err(|e| {
            crate::error::ConfigError::invalid(&self.name, e.to_string())
        })
    }
}

// ============================================================================
// Per-type views
// ============================================================================

/// model component body
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSpec {
    pub provider: String,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Scripted-provider turns; empty means echo
    #[serde(default)]
    pub responses: Vec<String>,
}

/// tool component body
#[derive(Debug, Clone, Deserialize)]
pub struct ToolComponentSpec {
    /// Builtin factory name; defaults to the component name
    #[serde(default)]
    pub tool: Option<String>,

    /// Constructor-parameter name to component-name map, resolved to
    /// instances at build time
    #[serde(default)]
    pub dependencies: HashMap<String, String>,
}

/// A tool reference inside an agent spec: a plain name, or a typed wrapper
/// around another runnable
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AgentToolRef {
    Named(String),
    Typed(TypedToolRef),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedToolRef {
    AgentTool { agent: String },
    WorkflowTool { workflow: String },
}

impl AgentToolRef {
    /// Name of the component this reference depends on
    pub fn dependency(&self) -> &str {
        match self {
            AgentToolRef::Named(name) => name,
            AgentToolRef::Typed(TypedToolRef::AgentTool { agent }) => agent,
            AgentToolRef::Typed(TypedToolRef::WorkflowTool { workflow }) => workflow,
        }
    }
}

/// agent component body
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSpec {
    pub model: String,

    #[serde(default)]
    pub system_prompt: Option<String>,

    #[serde(default)]
    pub tools: Vec<AgentToolRef>,

    #[serde(default)]
    pub memory: Option<String>,

    #[serde(default)]
    pub knowledge: Option<String>,

    #[serde(default)]
    pub session_store: Option<String>,

    #[serde(default)]
    pub max_steps: Option<u32>,

    #[serde(default)]
    pub enable_termination_summary: bool,

    #[serde(default)]
    pub include_reasoning: bool,

    #[serde(default)]
    pub history_limit: Option<usize>,

    #[serde(default)]
    pub max_depth: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Pipeline,
    Parallel,
    Loop,
}

/// A stage's runnable: a name resolved from the container, or an inline
/// nested spec built with the stage
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RunnableRef {
    Name(String),
    Inline(serde_yaml::Value),
}

/// workflow stage body
#[derive(Debug, Clone, Deserialize)]
pub struct StageSpec {
    pub id: String,
    pub runnable: RunnableRef,

    #[serde(default)]
    pub input: Option<String>,

    #[serde(default)]
    pub condition: Option<String>,
}

fn default_strict() -> bool {
    true
}

/// workflow component body
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSpec {
    pub kind: WorkflowKind,

    #[serde(default)]
    pub stages: Vec<StageSpec>,

    #[serde(default)]
    pub session_store: Option<String>,

    /// Loop continuation condition
    #[serde(default)]
    pub condition: Option<String>,

    #[serde(default)]
    pub max_iterations: Option<u32>,

    #[serde(default)]
    pub merge_template: Option<String>,

    #[serde(default)]
    pub output_template: Option<String>,

    #[serde(default = "default_strict")]
    pub strict: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_fields() {
        let value: serde_yaml::Value = serde_yaml::from_str(
            r#"
type: agent
name: helper
description: a helper agent
tags: [demo, test]
model: main-model
"#,
        )
        .unwrap();
        let spec = ComponentSpec::from_value(value, "test").unwrap();
        assert_eq!(spec.component_type, ComponentType::Agent);
        assert_eq!(spec.name, "helper");
        assert!(spec.enabled);
        assert_eq!(spec.tags, vec!["demo", "test"]);

        let agent: AgentSpec = spec.typed().unwrap();
        assert_eq!(agent.model, "main-model");
    }

    #[test]
    fn missing_name_is_an_error() {
        let value: serde_yaml::Value = serde_yaml::from_str("type: model\nprovider: scripted").unwrap();
        let err = ComponentSpec::from_value(value, "x.yaml").unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn unknown_type_is_an_error() {
        let value: serde_yaml::Value =
            serde_yaml::from_str("type: gizmo\nname: g1").unwrap();
        assert!(ComponentSpec::from_value(value, "x.yaml").is_err());
    }

    #[test]
    fn agent_tool_refs_deserialize_both_shapes() {
        let value: serde_yaml::Value = serde_yaml::from_str(
            r#"
type: agent
name: a1
model: m
tools:
  - echo
  - type: agent_tool
    agent: helper
  - type: workflow_tool
    workflow: research
"#,
        )
        .unwrap();
        let spec = ComponentSpec::from_value(value, "test").unwrap();
        let agent: AgentSpec = spec.typed().unwrap();
        let deps: Vec<&str> = agent.tools.iter().map(|t| t.dependency()).collect();
        assert_eq!(deps, vec!["echo", "helper", "research"]);
    }
}
