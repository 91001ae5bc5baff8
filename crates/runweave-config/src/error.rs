// Configuration error types

use thiserror::Error;

use crate::spec::ComponentType;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Errors raised by loading, validating, sorting, or building components
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The dependency graph has at least one cycle
    #[error("dependency cycle among components: {nodes:?}")]
    CycleDetected { nodes: Vec<String> },

    #[error("unknown component type: {0}")]
    UnknownType(String),

    #[error("missing required field '{field}' in {location}")]
    MissingField { field: String, location: String },

    #[error("component '{component}' depends on unknown component '{dependency}'")]
    UnresolvableDependency {
        component: String,
        dependency: String,
    },

    #[error("no builder registered for component type '{0}'")]
    NoBuilder(ComponentType),

    #[error("invalid spec for '{name}': {message}")]
    InvalidSpec { name: String, message: String },

    #[error("component not found: {0}")]
    NotFound(String),

    #[error("dependency '{name}' has the wrong instance kind: expected {expected}")]
    WrongInstanceKind { name: String, expected: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Core(#[from] runweave_core::CoreError),
}

impl ConfigError {
    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidSpec {
            name: name.into(),
            message: message.into(),
        }
    }
}
