//! Provider schemas
//!
//! Declared attribute sets per provider, resource type and data source
//! type. A [`SchemaRegistry`] is loaded once (from YAML, JSON or TOML) and
//! shared by every stack of an app.
//!
//! # Format
//!
//! ```yaml
//! aws:
//!   source: hashicorp/aws
//!   version: "~> 5.0"
//!   provider:
//!     region: { type: string, required: true }
//!   resources:
//!     aws_kms_alias:
//!       name: { type: string }
//!       target_key_id: { type: string, required: true }
//!       arn: { type: string, computed: true }
//!   data_sources:
//!     aws_caller_identity:
//!       account_id: { type: string, computed: true }
//! ```
//!
//! Types are `string`, `number`, `bool`, `any`, `object` (with nested
//! `attributes`), and `list(T)`, `set(T)`, `map(T)` over those.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::kind::ConstructKind;

/// Attribute type
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    /// UTF-8 string
    String,
    /// JSON number
    Number,
    /// Boolean
    Bool,
    /// Anything, including nested structures
    Any,
    /// Ordered list of `T`
    List(Box<AttributeType>),
    /// Set of `T` (emitted as a list)
    Set(Box<AttributeType>),
    /// String-keyed map of `T`
    Map(Box<AttributeType>),
    /// Nested object with its own attribute set
    Object(BlockSchema),
}

impl AttributeType {
    /// Parse a type expression such as `map(string)`
    ///
    /// `object` (possibly nested, e.g. `list(object)`) takes its fields from
    /// `object`.
    ///
    /// # Errors
    /// Returns a description of the problem if the expression is malformed
    pub fn parse(expr: &str, object: Option<&BlockSchema>) -> Result<Self, String> {
        let expr = expr.trim();
        match expr {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "bool" => Ok(Self::Bool),
            "any" => Ok(Self::Any),
            "object" => object
                .cloned()
                .map(Self::Object)
                .ok_or_else(|| "object type requires nested attributes".to_string()),
            _ => {
                let (outer, inner) = expr
                    .strip_suffix(')')
                    .and_then(|e| e.split_once('('))
                    .ok_or_else(|| format!("unknown type '{expr}'"))?;
                let inner = Box::new(Self::parse(inner, object)?);
                match outer.trim() {
                    "list" => Ok(Self::List(inner)),
                    "set" => Ok(Self::Set(inner)),
                    "map" => Ok(Self::Map(inner)),
                    other => Err(format!("unknown collection type '{other}'")),
                }
            }
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Number => f.write_str("number"),
            Self::Bool => f.write_str("bool"),
            Self::Any => f.write_str("any"),
            Self::List(inner) => write!(f, "list({inner})"),
            Self::Set(inner) => write!(f, "set({inner})"),
            Self::Map(inner) => write!(f, "map({inner})"),
            Self::Object(_) => f.write_str("object"),
        }
    }
}

/// Declared attribute
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawAttributeSchema")]
pub struct AttributeSchema {
    /// Value type
    pub ty: AttributeType,
    /// Must be set (non-null)
    pub required: bool,
    /// May be set even though computed
    pub optional: bool,
    /// Known only after provisioning
    pub computed: bool,
}

impl AttributeSchema {
    /// Required, user-set attribute
    #[must_use]
    pub fn required(ty: AttributeType) -> Self {
        Self {
            ty,
            required: true,
            optional: false,
            computed: false,
        }
    }

    /// Optional, user-set attribute
    #[must_use]
    pub fn optional(ty: AttributeType) -> Self {
        Self {
            ty,
            required: false,
            optional: true,
            computed: false,
        }
    }

    /// Provider-computed, read-only attribute
    #[must_use]
    pub fn computed(ty: AttributeType) -> Self {
        Self {
            ty,
            required: false,
            optional: false,
            computed: true,
        }
    }

    /// Computed attribute that users may also set
    #[must_use]
    pub fn optional_computed(ty: AttributeType) -> Self {
        Self {
            ty,
            required: false,
            optional: true,
            computed: true,
        }
    }

    /// Whether user code may assign this attribute
    #[inline]
    #[must_use]
    pub fn is_settable(&self) -> bool {
        !self.computed || self.optional || self.required
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAttributeSchema {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    computed: bool,
    #[serde(default)]
    attributes: Option<BlockSchema>,
}

impl TryFrom<RawAttributeSchema> for AttributeSchema {
    type Error = String;

    fn try_from(raw: RawAttributeSchema) -> Result<Self, Self::Error> {
        Ok(Self {
            ty: AttributeType::parse(&raw.ty, raw.attributes.as_ref())?,
            required: raw.required,
            // neither required nor computed means user-set and optional
            optional: raw.optional || !(raw.required || raw.computed),
            computed: raw.computed,
        })
    }
}

/// Ordered attribute set of a provider, resource, data source or object
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct BlockSchema {
    attributes: IndexMap<String, AttributeSchema>,
}

impl BlockSchema {
    /// Empty block
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute, returning the block
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, schema: AttributeSchema) -> Self {
        self.attributes.insert(name.into(), schema);
        self
    }

    /// Look up an attribute
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.get(name)
    }

    /// Attributes in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeSchema)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of declared attributes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether no attributes are declared
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Schema of one provider and the types it serves
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSchema {
    /// Registry address, e.g. `hashicorp/aws`
    pub source: String,
    /// Version constraint written to `required_providers`
    #[serde(default)]
    pub version: Option<String>,
    /// Provider configuration block
    #[serde(default)]
    pub provider: BlockSchema,
    /// Resource types by name
    #[serde(default)]
    pub resources: IndexMap<String, BlockSchema>,
    /// Data source types by name
    #[serde(default)]
    pub data_sources: IndexMap<String, BlockSchema>,
}

impl ProviderSchema {
    /// Provider with no types yet
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            version: None,
            provider: BlockSchema::new(),
            resources: IndexMap::new(),
            data_sources: IndexMap::new(),
        }
    }

    /// Set the version constraint
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the provider configuration block
    #[must_use]
    pub fn with_provider_block(mut self, block: BlockSchema) -> Self {
        self.provider = block;
        self
    }

    /// Register a resource type
    #[must_use]
    pub fn with_resource(mut self, type_name: impl Into<String>, block: BlockSchema) -> Self {
        self.resources.insert(type_name.into(), block);
        self
    }

    /// Register a data source type
    #[must_use]
    pub fn with_data_source(mut self, type_name: impl Into<String>, block: BlockSchema) -> Self {
        self.data_sources.insert(type_name.into(), block);
        self
    }
}

static OUTPUT_SCHEMA: Lazy<BlockSchema> = Lazy::new(|| {
    BlockSchema::new()
        .with("value", AttributeSchema::required(AttributeType::Any))
        .with("description", AttributeSchema::optional(AttributeType::String))
        .with("sensitive", AttributeSchema::optional(AttributeType::Bool))
});

/// Errors loading a schema registry
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// File could not be read
    #[error("failed to read schema file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// YAML syntax or shape error
    #[error("invalid YAML schema: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON syntax or shape error
    #[error("invalid JSON schema: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML syntax or shape error
    #[error("invalid TOML schema: {0}")]
    Toml(#[from] toml::de::Error),

    /// Extension is not yaml, yml, json or toml
    #[error("unsupported schema format: {0}")]
    UnsupportedFormat(PathBuf),
}

/// All known provider schemas, keyed by provider name (`aws`, `random`, ...)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct SchemaRegistry {
    providers: IndexMap<String, ProviderSchema>,
}

impl SchemaRegistry {
    /// Empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider, returning the registry
    #[must_use]
    pub fn with_provider(mut self, name: impl Into<String>, schema: ProviderSchema) -> Self {
        self.register(name, schema);
        self
    }

    /// Add or replace a provider
    pub fn register(&mut self, name: impl Into<String>, schema: ProviderSchema) {
        self.providers.insert(name.into(), schema);
    }

    /// Provider schema by name
    #[inline]
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&ProviderSchema> {
        self.providers.get(name)
    }

    /// Provider serving a resource or data source type
    ///
    /// Follows the Terraform convention that `aws_kms_key` belongs to `aws`;
    /// the longest matching provider name wins.
    #[must_use]
    pub fn provider_for(&self, type_name: &str) -> Option<(&str, &ProviderSchema)> {
        self.providers
            .iter()
            .filter(|(name, _)| {
                type_name == name.as_str()
                    || type_name
                        .strip_prefix(name.as_str())
                        .is_some_and(|rest| rest.starts_with('_'))
            })
            .max_by_key(|(name, _)| name.len())
            .map(|(name, schema)| (name.as_str(), schema))
    }

    /// Attribute set for a node of `kind` and `type_name`
    ///
    /// Outputs share one built-in schema and ignore `type_name`.
    #[must_use]
    pub fn block(&self, kind: ConstructKind, type_name: &str) -> Option<&BlockSchema> {
        match kind {
            ConstructKind::Provider => self.providers.get(type_name).map(|p| &p.provider),
            ConstructKind::Resource => self
                .provider_for(type_name)
                .and_then(|(_, p)| p.resources.get(type_name)),
            ConstructKind::DataSource => self
                .provider_for(type_name)
                .and_then(|(_, p)| p.data_sources.get(type_name)),
            ConstructKind::Output => Some(&*OUTPUT_SCHEMA),
            ConstructKind::App | ConstructKind::Stack => None,
        }
    }

    /// Number of providers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no providers are registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Parse from YAML
    ///
    /// # Errors
    /// Returns error if YAML is invalid or does not match the schema format
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SchemaError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse from JSON
    ///
    /// # Errors
    /// Returns error if JSON is invalid or does not match the schema format
    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse from TOML
    ///
    /// # Errors
    /// Returns error if TOML is invalid or does not match the schema format
    pub fn from_toml_str(text: &str) -> Result<Self, SchemaError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a file, choosing the format by extension
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&text),
            Some("json") => Self::from_json_str(&text),
            Some("toml") => Self::from_toml_str(&text),
            _ => Err(SchemaError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_type_expressions() {
        assert_eq!(AttributeType::parse("string", None), Ok(AttributeType::String));
        assert_eq!(
            AttributeType::parse("map(list(number))", None),
            Ok(AttributeType::Map(Box::new(AttributeType::List(Box::new(
                AttributeType::Number
            )))))
        );
        assert!(AttributeType::parse("object", None).is_err());
        assert!(AttributeType::parse("tuple(string)", None).is_err());
        assert!(AttributeType::parse("list(string", None).is_err());
    }

    #[test]
    fn type_display_round_trips_collections() {
        let ty = AttributeType::parse("set(map(bool))", None).unwrap();
        assert_eq!(ty.to_string(), "set(map(bool))");
    }

    #[test]
    fn loads_yaml_registry() {
        let yaml = r#"
aws:
  source: hashicorp/aws
  version: "~> 5.0"
  provider:
    region: { type: string, required: true }
  resources:
    aws_security_group:
      ingress:
        type: list(object)
        attributes:
          from_port: { type: number, required: true }
      id: { type: string, computed: true }
"#;
        let registry = SchemaRegistry::from_yaml_str(yaml).unwrap();
        let aws = registry.provider("aws").unwrap();
        assert_eq!(aws.version.as_deref(), Some("~> 5.0"));

        let sg = registry
            .block(ConstructKind::Resource, "aws_security_group")
            .unwrap();
        let AttributeType::List(inner) = &sg.get("ingress").unwrap().ty else {
            panic!("expected list");
        };
        let AttributeType::Object(fields) = inner.as_ref() else {
            panic!("expected object");
        };
        assert!(fields.get("from_port").unwrap().required);
        assert!(!sg.get("id").unwrap().is_settable());
    }

    #[test]
    fn loads_json_and_toml_registries() {
        let json = r#"{"random": {"source": "hashicorp/random", "resources": {"random_id": {"byte_length": {"type": "number", "required": true}}}}}"#;
        let registry = SchemaRegistry::from_json_str(json).unwrap();
        assert!(registry.block(ConstructKind::Resource, "random_id").is_some());

        let text = r#"
[null]
source = "hashicorp/null"

[null.resources.null_resource.triggers]
type = "map(string)"
"#;
        let registry = SchemaRegistry::from_toml_str(text).unwrap();
        assert!(registry.block(ConstructKind::Resource, "null_resource").is_some());
    }

    #[test]
    fn rejects_unknown_type_in_file() {
        let yaml = "aws:\n  source: hashicorp/aws\n  provider:\n    region: { type: text }\n";
        assert!(SchemaRegistry::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn provider_for_prefers_longest_prefix() {
        let registry = SchemaRegistry::new()
            .with_provider("aws", ProviderSchema::new("hashicorp/aws"))
            .with_provider("aws_cc", ProviderSchema::new("hashicorp/awscc"));

        assert_eq!(registry.provider_for("aws_kms_key").map(|(n, _)| n), Some("aws"));
        assert_eq!(registry.provider_for("aws_cc_thing").map(|(n, _)| n), Some("aws_cc"));
        assert_eq!(registry.provider_for("awsfoo_x"), None);
    }

    #[test]
    fn outputs_use_builtin_schema() {
        let registry = SchemaRegistry::new();
        let block = registry.block(ConstructKind::Output, "").unwrap();
        assert!(block.get("value").unwrap().required);
        assert!(registry.block(ConstructKind::Stack, "").is_none());
    }
}
