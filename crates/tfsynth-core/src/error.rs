//! Error types for tfsynth core
//!
//! Provides error handling for:
//! - Per-stack synthesis failures (graph and emission)
//! - Assembly output
//! - Configuration loading
//! - App description loading

use std::path::PathBuf;
use tfsynth_construct::{ConstructError, SchemaViolation};
use tfsynth_graph::GraphError;
use tfsynth_value::ValueError;

/// Failure synthesizing one stack
///
/// Aborts that stack only; sibling stacks are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthError {
    /// Dependency graph could not be built
    #[error("stack '{stack}': {source}")]
    Graph {
        /// Failing stack
        stack: String,
        /// Underlying graph error
        #[source]
        source: GraphError,
    },

    /// Final validation pass rejected a node
    #[error("stack '{stack}': {source}")]
    SchemaViolation {
        /// Failing stack
        stack: String,
        /// Offending node and attribute
        #[source]
        source: SchemaViolation,
    },
}

impl SynthError {
    pub(crate) fn graph(stack: &str, source: GraphError) -> Self {
        Self::Graph {
            stack: stack.to_string(),
            source,
        }
    }

    pub(crate) fn schema(stack: &str, source: SchemaViolation) -> Self {
        Self::SchemaViolation {
            stack: stack.to_string(),
            source,
        }
    }

    /// Id of the stack that failed
    #[must_use]
    pub fn stack(&self) -> &str {
        match self {
            Self::Graph { stack, .. } | Self::SchemaViolation { stack, .. } => stack,
        }
    }

    /// Check if this is a dependency cycle
    #[inline]
    #[must_use]
    pub fn is_cycle(&self) -> bool {
        matches!(
            self,
            Self::Graph {
                source: GraphError::CyclicDependency { .. },
                ..
            }
        )
    }

    /// Check if a token or dependency names a missing node
    #[inline]
    #[must_use]
    pub fn is_unresolved_reference(&self) -> bool {
        matches!(
            self,
            Self::Graph {
                source: GraphError::UnresolvedReference { .. },
                ..
            }
        )
    }

    /// Check if this is a schema violation
    #[inline]
    #[must_use]
    pub fn is_schema_violation(&self) -> bool {
        matches!(self, Self::SchemaViolation { .. })
    }

    /// Cycle path, when this is a cycle
    #[must_use]
    pub fn cycle(&self) -> Option<&[String]> {
        match self {
            Self::Graph {
                source: GraphError::CyclicDependency { cycle },
                ..
            } => Some(cycle),
            _ => None,
        }
    }
}

/// Errors writing an assembly to disk
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// Filesystem operation failed
    #[error("failed to write {path}: {source}")]
    Io {
        /// Path being written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Document or manifest could not be serialized
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors loading [`SynthConfig`](crate::SynthConfig)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config is not valid TOML or has unknown keys
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors loading an app description
#[derive(Debug, thiserror::Error)]
pub enum AppFileError {
    /// File could not be read
    #[error("failed to read app {path}: {source}")]
    Io {
        /// App file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error
    #[error("invalid YAML app: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parse error
    #[error("invalid JSON app: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("invalid TOML app: {0}")]
    Toml(#[from] toml::de::Error),

    /// Extension is not yaml, yml, json or toml
    #[error("unsupported app format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Attribute holds a malformed `$ref` or `$template`
    #[error("stack '{stack}', node '{node}', attribute '{attribute}': {source}")]
    Value {
        /// Stack id
        stack: String,
        /// Node id
        node: String,
        /// Attribute name
        attribute: String,
        /// Underlying error
        #[source]
        source: ValueError,
    },

    /// Tree construction rejected a stack or node
    #[error("stack '{stack}': {source}")]
    Construct {
        /// Stack id
        stack: String,
        /// Underlying error
        #[source]
        source: ConstructError,
    },

    /// `depends_on` names a node not declared in the stack
    #[error("stack '{stack}': '{node}' depends on unknown node '{dependency}'")]
    UnknownDependency {
        /// Stack id
        stack: String,
        /// Dependent node
        node: String,
        /// Missing id
        dependency: String,
    },
}
