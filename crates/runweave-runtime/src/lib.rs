// Runners
//
// This crate holds everything that drives runnables:
// - The agent runner (run lifecycle, suspension, termination summary)
// - The three workflow operators (pipeline, parallel, loop)
// - The runnable-as-tool adapter that makes agents and workflows nest
// - The resume and fork engines over the session store contract

pub mod adapter;
pub mod agent;
pub mod fork;
pub mod forwarder;
pub mod resume;
pub mod template;
pub mod workflow;

pub use adapter::RunnableTool;
pub use agent::{Agent, AgentConfig};
pub use fork::{ForkEngine, ForkModification, ForkResult};
pub use forwarder::forward_events;
pub use template::{eval_condition, render};
pub use workflow::{LoopWorkflow, ParallelWorkflow, PipelineWorkflow, Stage};
