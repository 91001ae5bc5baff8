// Instance container
//
// Owns the built component instances, keyed by name, with the metadata the
// reload coordinator needs: the spec that produced each instance, its
// dependency list, and its creation time. Read-mostly; writes go through
// the reload coordinator.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use runweave_core::{LlmDriver, Runnable, SessionStore, Tool, TraceStore};

use crate::error::{ConfigError, ConfigResult};
use crate::spec::{ComponentSpec, ComponentType};

/// A built component instance
#[derive(Clone)]
pub enum ComponentInstance {
    Driver(Arc<dyn LlmDriver>),
    Tool(Arc<dyn Tool>),
    Runnable(Arc<dyn Runnable>),
    SessionStore(Arc<dyn SessionStore>),
    TraceStore(Arc<dyn TraceStore>),
    /// Handle for components the core treats as opaque (memory, knowledge,
    /// citation store): the validated spec body travels with the name
    Opaque(Arc<serde_yaml::Value>),
}

impl ComponentInstance {
    pub fn kind(&self) -> &'static str {
        match self {
            ComponentInstance::Driver(_) => "model driver",
            ComponentInstance::Tool(_) => "tool",
            ComponentInstance::Runnable(_) => "runnable",
            ComponentInstance::SessionStore(_) => "session store",
            ComponentInstance::TraceStore(_) => "trace store",
            ComponentInstance::Opaque(_) => "opaque",
        }
    }

    pub fn as_driver(&self, name: &str) -> ConfigResult<Arc<dyn LlmDriver>> {
        match self {
            ComponentInstance::Driver(driver) => Ok(Arc::clone(driver)),
            _ => Err(ConfigError::WrongInstanceKind {
                name: name.to_string(),
                expected: "model driver",
            }),
        }
    }

    pub fn as_tool(&self, name: &str) -> ConfigResult<Arc<dyn Tool>> {
        match self {
            ComponentInstance::Tool(tool) => Ok(Arc::clone(tool)),
            _ => Err(ConfigError::WrongInstanceKind {
                name: name.to_string(),
                expected: "tool",
            }),
        }
    }

    pub fn as_runnable(&self, name: &str) -> ConfigResult<Arc<dyn Runnable>> {
        match self {
            ComponentInstance::Runnable(runnable) => Ok(Arc::clone(runnable)),
            _ => Err(ConfigError::WrongInstanceKind {
                name: name.to_string(),
                expected: "runnable",
            }),
        }
    }

    pub fn as_session_store(&self, name: &str) -> ConfigResult<Arc<dyn SessionStore>> {
        match self {
            ComponentInstance::SessionStore(store) => Ok(Arc::clone(store)),
            _ => Err(ConfigError::WrongInstanceKind {
                name: name.to_string(),
                expected: "session store",
            }),
        }
    }
}

/// Instance plus build metadata
#[derive(Clone)]
pub struct BuiltComponent {
    pub instance: ComponentInstance,
    pub component_type: ComponentType,
    pub config: ComponentSpec,
    pub dependencies: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Registry of built instances, keyed by component name
#[derive(Default)]
pub struct Container {
    components: RwLock<HashMap<String, BuiltComponent>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, component: BuiltComponent) {
        self.components.write().insert(name.into(), component);
    }

    pub fn remove(&self, name: &str) -> Option<BuiltComponent> {
        self.components.write().remove(name)
    }

    pub fn get(&self, name: &str) -> Option<BuiltComponent> {
        self.components.read().get(name).cloned()
    }

    pub fn instance(&self, name: &str) -> Option<ComponentInstance> {
        self.components.read().get(name).map(|c| c.instance.clone())
    }

    /// Convenience lookup for the common "get me the agent/workflow" path
    pub fn runnable(&self, name: &str) -> ConfigResult<Arc<dyn Runnable>> {
        self.instance(name)
            .ok_or_else(|| ConfigError::NotFound(name.to_string()))?
            .as_runnable(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.components.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.components.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.read().is_empty()
    }
}
