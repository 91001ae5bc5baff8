// Spec registry
//
// Stores what exists: parsed component specs keyed by (type, name).
// Duplicate keys are last-wins with a warning, per the loader contract.
// Dependency references are plain names, so name lookup spans types.

use std::collections::HashMap;

use tracing::warn;

use crate::spec::{ComponentSpec, ComponentType};

/// Registry of parsed specs keyed by `(type, name)`
#[derive(Debug, Clone, Default)]
pub struct ConfigRegistry {
    specs: HashMap<(ComponentType, String), ComponentSpec>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a spec; an existing `(type, name)` entry is replaced with a
    /// warning.
    pub fn insert(&mut self, spec: ComponentSpec) {
        let key = (spec.component_type, spec.name.clone());
        if self.specs.contains_key(&key) {
            warn!(
                component_type = %spec.component_type,
                name = %spec.name,
                "duplicate component spec, last definition wins"
            );
        }
        self.specs.insert(key, spec);
    }

    pub fn remove(&mut self, component_type: ComponentType, name: &str) -> Option<ComponentSpec> {
        self.specs.remove(&(component_type, name.to_string()))
    }

    pub fn get(&self, component_type: ComponentType, name: &str) -> Option<&ComponentSpec> {
        self.specs.get(&(component_type, name.to_string()))
    }

    /// Look a spec up by bare name (dependency references carry no type)
    pub fn get_by_name(&self, name: &str) -> Option<&ComponentSpec> {
        self.specs.values().find(|s| s.name == name)
    }

    pub fn specs(&self) -> Vec<&ComponentSpec> {
        self.specs.values().collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
