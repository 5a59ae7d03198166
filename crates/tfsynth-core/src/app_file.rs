//! Declarative app descriptions
//!
//! Builds an [`App`] from YAML, JSON or TOML:
//!
//! ```yaml
//! stacks:
//!   - id: cdktf-python-aws-kms
//!     nodes:
//!       - kind: provider
//!         type: aws
//!         attributes: { region: us-east-1 }
//!       - kind: data_source
//!         type: aws_caller_identity
//!         id: aws_id
//!       - kind: resource
//!         type: aws_kms_alias
//!         id: kms_alias
//!         attributes:
//!           target_key_id: { $ref: aws_kms.id }
//! ```

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::path::Path;
use std::sync::Arc;
use tfsynth_construct::{App, Attributes, ConstructKind, SchemaRegistry, Stack};
use tfsynth_value::Value;

use crate::error::AppFileError;

/// Whole app description
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppSpec {
    /// Stacks in creation order
    #[serde(default)]
    pub stacks: Vec<StackSpec>,
}

/// One stack
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackSpec {
    /// Stack id
    pub id: String,
    /// Declarations in creation order
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

/// One declaration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    /// Node kind
    pub kind: ConstructKind,
    /// Schema type; omitted for outputs
    #[serde(rename = "type", default)]
    pub type_name: String,
    /// Node id; providers default to their type
    #[serde(default)]
    pub id: Option<String>,
    /// Attributes, with `$ref` / `$template` markers
    #[serde(default)]
    pub attributes: IndexMap<String, JsonValue>,
    /// Ids of nodes this one depends on
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl NodeSpec {
    /// Effective node id
    #[must_use]
    pub fn node_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.type_name)
    }
}

impl AppSpec {
    /// Parse from YAML
    ///
    /// # Errors
    /// Returns error if YAML is invalid or has unknown keys
    pub fn from_yaml_str(yaml: &str) -> Result<Self, AppFileError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse from JSON
    ///
    /// # Errors
    /// Returns error if JSON is invalid or has unknown keys
    pub fn from_json_str(json: &str) -> Result<Self, AppFileError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse from TOML
    ///
    /// # Errors
    /// Returns error if TOML is invalid or has unknown keys
    pub fn from_toml_str(text: &str) -> Result<Self, AppFileError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a file, choosing the format by extension
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppFileError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| AppFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&text),
            Some("json") => Self::from_json_str(&text),
            Some("toml") => Self::from_toml_str(&text),
            _ => Err(AppFileError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Build the construct tree
    ///
    /// Nodes are created in file order; explicit dependencies are added once
    /// every node of the stack exists, so `depends_on` may name later nodes.
    ///
    /// # Errors
    /// Returns the first construction error, naming the stack it occurred in
    pub fn build(&self, schemas: impl Into<Arc<SchemaRegistry>>) -> Result<App, AppFileError> {
        let mut app = App::new(schemas);
        for spec in &self.stacks {
            let stack = app
                .add_stack(&spec.id)
                .map_err(|source| AppFileError::Construct {
                    stack: spec.id.clone(),
                    source,
                })?;
            populate(stack, spec)?;
        }
        Ok(app)
    }
}

fn populate(stack: &mut Stack, spec: &StackSpec) -> Result<(), AppFileError> {
    let construct_err = |source| AppFileError::Construct {
        stack: spec.id.clone(),
        source,
    };

    for node in &spec.nodes {
        let id = node.node_id();
        let mut attributes = Attributes::with_capacity(node.attributes.len());
        for (name, json) in &node.attributes {
            let value =
                Value::from_json(json.clone()).map_err(|source| AppFileError::Value {
                    stack: spec.id.clone(),
                    node: id.to_string(),
                    attribute: name.clone(),
                    source,
                })?;
            attributes.insert(name.clone(), value);
        }
        let type_name = if node.kind == ConstructKind::Output {
            ""
        } else {
            node.type_name.as_str()
        };
        stack
            .add(node.kind, type_name, id, attributes)
            .map_err(construct_err)?;
    }

    for node in &spec.nodes {
        if node.depends_on.is_empty() {
            continue;
        }
        let id = node.node_id();
        let from = stack.handle(id).ok_or_else(|| AppFileError::UnknownDependency {
            stack: spec.id.clone(),
            node: id.to_string(),
            dependency: id.to_string(),
        })?;
        for dep in &node.depends_on {
            let on = stack
                .handle(dep)
                .ok_or_else(|| AppFileError::UnknownDependency {
                    stack: spec.id.clone(),
                    node: id.to_string(),
                    dependency: dep.clone(),
                })?;
            stack.add_dependency(&from, &on).map_err(construct_err)?;
        }
    }

    tracing::debug!("Loaded stack '{}' with {} node(s)", spec.id, stack.len());
    Ok(())
}

/// Load an app description and build it against `schemas`
///
/// # Errors
/// Returns error if the file cannot be loaded or the tree cannot be built
pub fn load_app(
    path: impl AsRef<Path>,
    schemas: impl Into<Arc<SchemaRegistry>>,
) -> Result<App, AppFileError> {
    AppSpec::load(path)?.build(schemas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_defaults_to_type() {
        let spec = AppSpec::from_yaml_str(
            "stacks:\n  - id: s\n    nodes:\n      - kind: provider\n        type: aws\n",
        )
        .unwrap();
        assert_eq!(spec.stacks[0].nodes[0].node_id(), "aws");
    }

    #[test]
    fn test_data_alias_accepted() {
        let spec = AppSpec::from_json_str(
            r#"{"stacks":[{"id":"s","nodes":[{"kind":"data","type":"aws_caller_identity","id":"me"}]}]}"#,
        )
        .unwrap();
        assert_eq!(spec.stacks[0].nodes[0].kind, ConstructKind::DataSource);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(AppSpec::from_yaml_str("stacks: []\nextra: 1\n").is_err());
    }
}
