// Dependency graph
//
// Nodes are component names; edges point from dependent to dependency.
// Extraction per type follows the assembly rules: agents depend on their
// model, tools, memory, knowledge, and session store; workflows on their
// session store and every referenced stage runnable (recursively through
// inline specs); models and stores depend on nothing.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{ConfigError, ConfigResult};
use crate::spec::{
    AgentSpec, ComponentSpec, ComponentType, RunnableRef, ToolComponentSpec, WorkflowSpec,
};

/// Outgoing dependency names for one component spec
pub fn extract_dependencies(spec: &ComponentSpec) -> ConfigResult<Vec<String>> {
    let mut deps = Vec::new();
    match spec.component_type {
        ComponentType::Model
        | ComponentType::SessionStore
        | ComponentType::TraceStore
        | ComponentType::CitationStore
        | ComponentType::Memory
        | ComponentType::Knowledge => {}
        ComponentType::Tool => {
            let tool: ToolComponentSpec = spec.typed()?;
            deps.extend(tool.dependencies.values().cloned());
        }
        ComponentType::Agent => {
            let agent: AgentSpec = spec.typed()?;
            deps.push(agent.model.clone());
            for tool in &agent.tools {
                deps.push(tool.dependency().to_string());
            }
            if let Some(memory) = &agent.memory {
                deps.push(memory.clone());
            }
            if let Some(knowledge) = &agent.knowledge {
                deps.push(knowledge.clone());
            }
            if let Some(session_store) = &agent.session_store {
                deps.push(session_store.clone());
            }
        }
        ComponentType::Workflow => {
            let workflow: WorkflowSpec = spec.typed()?;
            if let Some(session_store) = &workflow.session_store {
                deps.push(session_store.clone());
            }
            collect_stage_dependencies(&workflow, &spec.name, &mut deps)?;
        }
    }
    deps.sort();
    deps.dedup();
    // A self-edge would be a trivial cycle; report it through the sorter
    Ok(deps)
}

fn collect_stage_dependencies(
    workflow: &WorkflowSpec,
    owner: &str,
    deps: &mut Vec<String>,
) -> ConfigResult<()> {
    for stage in &workflow.stages {
        match &stage.runnable {
            RunnableRef::Name(name) => deps.push(name.clone()),
            RunnableRef::Inline(value) => {
                let inline = ComponentSpec::from_value(value.clone(), owner)?;
                deps.extend(extract_dependencies(&inline)?);
            }
        }
    }
    Ok(())
}

/// Directed dependency graph over component names
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// dependent -> set of dependencies
    edges: HashMap<String, HashSet<String>>,
}

impl DependencyGraph {
    /// Build the graph for a set of specs, verifying every referenced
    /// dependency exists.
    pub fn from_specs(specs: &[&ComponentSpec]) -> ConfigResult<Self> {
        let names: HashSet<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        let mut edges: HashMap<String, HashSet<String>> = HashMap::new();

        for spec in specs {
            let deps = extract_dependencies(spec)?;
            for dep in &deps {
                if !names.contains(dep.as_str()) {
                    return Err(ConfigError::UnresolvableDependency {
                        component: spec.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
            edges.insert(spec.name.clone(), deps.into_iter().collect());
        }
        Ok(Self { edges })
    }

    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.edges
            .get(name)
            .map(|deps| {
                let mut sorted: Vec<String> = deps.iter().cloned().collect();
                sorted.sort();
                sorted
            })
            .unwrap_or_default()
    }

    /// Kahn's algorithm: dependencies before dependents. Fails fast when a
    /// cycle keeps the sorted length short of the node count, naming the
    /// unresolved set.
    pub fn topo_sort(&self) -> ConfigResult<Vec<String>> {
        let mut in_degree: HashMap<&str, usize> = self
            .edges
            .keys()
            .map(|name| (name.as_str(), 0))
            .collect();
        // in-degree counts dependents still waiting on the node
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for (dependent, deps) in &self.edges {
            for dep in deps {
                dependents
                    .entry(dep.as_str())
                    .or_default()
                    .push(dependent.as_str());
            }
            *in_degree.entry(dependent.as_str()).or_insert(0) += deps.len();
        }

        let mut ready: VecDeque<&str> = {
            let mut roots: Vec<&str> = in_degree
                .iter()
                .filter(|(_, degree)| **degree == 0)
                .map(|(name, _)| *name)
                .collect();
            roots.sort_unstable();
            roots.into_iter().collect()
        };

        let mut sorted = Vec::with_capacity(self.edges.len());
        while let Some(name) = ready.pop_front() {
            sorted.push(name.to_string());
            if let Some(waiting) = dependents.get(name) {
                for dependent in waiting {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.push_back(dependent);
                        }
                    }
                }
            }
        }

        if sorted.len() < self.edges.len() {
            let mut nodes: Vec<String> = self
                .edges
                .keys()
                .filter(|name| !sorted.contains(name))
                .cloned()
                .collect();
            nodes.sort();
            return Err(ConfigError::CycleDetected { nodes });
        }
        Ok(sorted)
    }

    /// Everything that transitively depends on `name`, found by BFS over
    /// reverse edges. Includes `name` itself.
    pub fn affected_by(&self, name: &str) -> HashSet<String> {
        let mut affected = HashSet::new();
        let mut queue = VecDeque::new();
        affected.insert(name.to_string());
        queue.push_back(name.to_string());

        while let Some(current) = queue.pop_front() {
            for (dependent, deps) in &self.edges {
                if deps.contains(&current) && affected.insert(dependent.clone()) {
                    queue.push_back(dependent.clone());
                }
            }
        }
        affected
    }

    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
