// Config system
//
// Orchestrates the narrow pieces: the registry stores specs, the graph
// derives topology, builders instantiate, the container holds instances,
// and this coordinator sequences initial build and cascading hot reload.
// Writes are serialized; readers see either the old instances or the new
// ones, never a half-built set.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{error, info};

use crate::builders::{default_builders, BuildEnv, ComponentBuilder};
use crate::container::{BuiltComponent, Container};
use crate::error::{ConfigError, ConfigResult};
use crate::graph::DependencyGraph;
use crate::loader;
use crate::registry::ConfigRegistry;
use crate::spec::{
    AgentSpec, ComponentSpec, ComponentType, ModelSpec, ToolComponentSpec, WorkflowSpec,
};

/// What changed in a reload notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Created,
    Updated,
    Deleted,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeType::Created => "created",
            ChangeType::Updated => "updated",
            ChangeType::Deleted => "deleted",
        };
        write!(f, "{s}")
    }
}

type ChangeCallback = Box<dyn Fn(&str, ChangeType) + Send + Sync>;

/// Configuration-driven assembly coordinator
pub struct ConfigSystem {
    registry: RwLock<ConfigRegistry>,
    container: Container,
    builders: HashMap<ComponentType, Arc<dyn ComponentBuilder>>,
    env: BuildEnv,
    callbacks: RwLock<Vec<ChangeCallback>>,
    /// Serializes save/delete/build against each other
    write_lock: tokio::sync::Mutex<()>,
}

impl ConfigSystem {
    pub fn new(env: BuildEnv) -> Self {
        let builders = default_builders()
            .into_iter()
            .map(|b| (b.component_type(), b))
            .collect();
        Self {
            registry: RwLock::new(ConfigRegistry::new()),
            container: Container::new(),
            builders,
            env,
            callbacks: RwLock::new(Vec::new()),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Replace the builder for a component type (custom tool factories,
    /// real provider transports)
    pub fn with_builder(mut self, builder: Arc<dyn ComponentBuilder>) -> Self {
        self.builders.insert(builder.component_type(), builder);
        self
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn env(&self) -> &BuildEnv {
        &self.env
    }

    /// Look up a built agent or workflow
    pub fn runnable(&self, name: &str) -> ConfigResult<Arc<dyn runweave_core::Runnable>> {
        self.container.runnable(name)
    }

    /// Register a change callback for hot-reload notifications
    pub fn on_change(&self, callback: impl Fn(&str, ChangeType) + Send + Sync + 'static) {
        self.callbacks.write().push(Box::new(callback));
    }

    fn notify(&self, name: &str, change: ChangeType) {
        for callback in self.callbacks.read().iter() {
            callback(name, change);
        }
    }

    /// Validate a spec against its type's schema
    fn validate(&self, spec: &ComponentSpec) -> ConfigResult<()> {
        match spec.component_type {
            ComponentType::Model => spec.typed::<ModelSpec>().map(|_| ()),
            ComponentType::Tool => spec.typed::<ToolComponentSpec>().map(|_| ()),
            ComponentType::Agent => spec.typed::<AgentSpec>().map(|_| ()),
            ComponentType::Workflow => spec.typed::<WorkflowSpec>().map(|_| ()),
            _ => Ok(()),
        }
    }

    /// Load every spec file under `root` into the registry. Invalid specs
    /// are skipped with a logged error.
    pub async fn load_dir(&self, root: impl AsRef<Path>) -> ConfigResult<usize> {
        let _guard = self.write_lock.lock().await;
        let specs = loader::load_dir(root)?;
        let mut loaded = 0usize;
        let mut registry = self.registry.write();
        for spec in specs {
            if let Err(err) = self.validate(&spec) {
                error!(name = %spec.name, error = %err, "skipping invalid component spec");
                continue;
            }
            registry.insert(spec);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Build every registered component in topological order
    pub async fn build_all(&self) -> ConfigResult<()> {
        let _guard = self.write_lock.lock().await;
        let registry = self.registry.read().clone();
        let specs = registry.specs();
        let graph = DependencyGraph::from_specs(&specs)?;
        let order = graph.topo_sort()?;

        for name in &order {
            self.build_one(&registry, &graph, name).await?;
        }
        info!(components = order.len(), "initial build complete");
        Ok(())
    }

    async fn build_one(
        &self,
        registry: &ConfigRegistry,
        graph: &DependencyGraph,
        name: &str,
    ) -> ConfigResult<()> {
        let spec = registry
            .get_by_name(name)
            .ok_or_else(|| ConfigError::NotFound(name.to_string()))?;
        let builder = self
            .builders
            .get(&spec.component_type)
            .ok_or(ConfigError::NoBuilder(spec.component_type))?;

        let dependencies = graph.dependencies_of(name);
        let mut resolved = HashMap::new();
        for dep in &dependencies {
            let instance = self
                .container
                .instance(dep)
                .ok_or_else(|| ConfigError::UnresolvableDependency {
                    component: name.to_string(),
                    dependency: dep.clone(),
                })?;
            resolved.insert(dep.clone(), instance);
        }

        let instance = builder.build(spec, &resolved, &self.env).await?;
        self.container.insert(
            name,
            BuiltComponent {
                instance,
                component_type: spec.component_type,
                config: spec.clone(),
                dependencies,
                created_at: Utc::now(),
            },
        );
        info!(component = %name, component_type = %spec.component_type, "component built");
        Ok(())
    }

    fn destroy(&self, name: &str) {
        if let Some(built) = self.container.remove(name) {
            if let Some(builder) = self.builders.get(&built.component_type) {
                builder.cleanup(name, &built.instance);
            }
        }
    }

    /// Create or update a component spec and cascade the rebuild: every
    /// transitive dependent is destroyed (dependents first) and rebuilt in
    /// forward topological order. On any failure the prior instances and
    /// registry are restored.
    pub async fn save_config(&self, value: serde_yaml::Value) -> ConfigResult<()> {
        let _guard = self.write_lock.lock().await;

        let spec = ComponentSpec::from_value(value, "save_config")?;
        self.validate(&spec)?;
        let name = spec.name.clone();

        let previous_registry = self.registry.read().clone();
        let change = if previous_registry
            .get(spec.component_type, &name)
            .is_some()
        {
            ChangeType::Updated
        } else {
            ChangeType::Created
        };

        let mut next_registry = previous_registry.clone();
        next_registry.insert(spec);

        // Cycle and reference checks run before anything is torn down
        let specs = next_registry.specs();
        let graph = DependencyGraph::from_specs(&specs)?;
        let order = graph.topo_sort()?;

        let affected = graph.affected_by(&name);
        let affected_order: Vec<String> = order
            .iter()
            .filter(|n| affected.contains(*n))
            .cloned()
            .collect();

        // Snapshot for rollback, then destroy dependents-first
        let snapshot: Vec<(String, Option<BuiltComponent>)> = affected_order
            .iter()
            .map(|n| (n.clone(), self.container.get(n)))
            .collect();
        for component in affected_order.iter().rev() {
            self.destroy(component);
        }

        *self.registry.write() = next_registry;

        let registry = self.registry.read().clone();
        for component in &affected_order {
            if let Err(err) = self.build_one(&registry, &graph, component).await {
                error!(
                    component = %component,
                    error = %err,
                    "cascade rebuild failed, restoring prior instances"
                );
                for (rollback_name, prior) in &snapshot {
                    self.container.remove(rollback_name);
                    if let Some(prior) = prior {
                        self.container.insert(rollback_name, prior.clone());
                    }
                }
                *self.registry.write() = previous_registry;
                return Err(err);
            }
        }

        info!(component = %name, change = %change, rebuilt = affected_order.len(), "config saved");
        self.notify(&name, change);
        Ok(())
    }

    /// Delete a component spec. Dependents are destroyed and left
    /// uninstantiated; nothing is rebuilt.
    pub async fn delete_config(
        &self,
        component_type: ComponentType,
        name: &str,
    ) -> ConfigResult<()> {
        let _guard = self.write_lock.lock().await;

        let registry = self.registry.read().clone();
        if registry.get(component_type, name).is_none() {
            return Err(ConfigError::NotFound(name.to_string()));
        }

        let specs = registry.specs();
        let graph = DependencyGraph::from_specs(&specs)?;
        let order = graph.topo_sort()?;
        let affected = graph.affected_by(name);
        let affected_order: Vec<String> = order
            .iter()
            .filter(|n| affected.contains(*n))
            .cloned()
            .collect();

        for component in affected_order.iter().rev() {
            self.destroy(component);
        }
        self.registry.write().remove(component_type, name);

        info!(component = %name, destroyed = affected_order.len(), "config deleted");
        self.notify(name, ChangeType::Deleted);
        Ok(())
    }

    /// Register a single spec directly (tests, embedding)
    pub async fn register(&self, value: serde_yaml::Value) -> ConfigResult<()> {
        let _guard = self.write_lock.lock().await;
        let spec = ComponentSpec::from_value(value, "register")?;
        self.validate(&spec)?;
        self.registry.write().insert(spec);
        Ok(())
    }
}
