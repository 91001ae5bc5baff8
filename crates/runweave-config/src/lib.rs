// Configuration-driven assembly
//
// Declarative YAML specs become a dependency DAG of typed components,
// built in topological order into a container of live instances. Saving or
// deleting a spec cascades: everything transitively depending on the
// changed component is destroyed in reverse topological order and rebuilt
// forward. Storage (registry), topology (graph), instantiation (builders),
// and lifecycle (reload) are separate pieces; `ConfigSystem` only
// orchestrates them.

pub mod builders;
pub mod container;
pub mod error;
pub mod graph;
pub mod loader;
pub mod registry;
pub mod spec;
pub mod system;

pub use builders::{BuildEnv, ComponentBuilder};
pub use container::{BuiltComponent, ComponentInstance, Container};
pub use error::{ConfigError, ConfigResult};
pub use graph::DependencyGraph;
pub use loader::{load_dir, substitute_env};
pub use registry::ConfigRegistry;
pub use spec::{
    AgentSpec, AgentToolRef, ComponentSpec, ComponentType, ModelSpec, RunnableRef, StageSpec,
    ToolComponentSpec, WorkflowKind, WorkflowSpec,
};
pub use system::{ChangeType, ConfigSystem};
