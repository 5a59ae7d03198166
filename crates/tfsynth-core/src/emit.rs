//! Document emission
//!
//! Serializes an ordered, validated node set into Terraform JSON:
//!
//! ```json
//! {
//!   "//": { "metadata": { "version": "0.1.0", "stackName": "kms", "backend": "local" } },
//!   "terraform": { "backend": { ... }, "required_providers": { ... } },
//!   "provider": { "aws": [ { "region": "us-east-1" } ] },
//!   "data": { "aws_caller_identity": { "aws_id": {} } },
//!   "resource": { "aws_kms_key": { "aws_kms": { ... } } },
//!   "output": { "key_arn": { "value": "${aws_kms_key.aws_kms.arn}" } }
//! }
//! ```

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use tfsynth_construct::{Construct, ConstructKind, SchemaViolation, Stack, ViolationReason};
use tfsynth_graph::GraphError;
use tfsynth_value::ReferenceToken;

use crate::config::{Backend, SynthConfig};
use crate::error::SynthError;
use crate::resolve::{address, Resolver};

/// Terraform JSON document for one stack
///
/// Sections are keyed by type, then by node id, in emission order. Empty
/// sections are omitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    #[serde(rename = "//", skip_serializing_if = "Option::is_none")]
    metadata: Option<JsonValue>,
    #[serde(skip_serializing_if = "JsonMap::is_empty")]
    terraform: JsonMap<String, JsonValue>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    provider: IndexMap<String, Vec<JsonValue>>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    data: IndexMap<String, IndexMap<String, JsonValue>>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    resource: IndexMap<String, IndexMap<String, JsonValue>>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    output: IndexMap<String, JsonValue>,
}

impl Document {
    /// Resolved body of a resource
    #[must_use]
    pub fn resource(&self, type_name: &str, id: &str) -> Option<&JsonValue> {
        self.resource.get(type_name).and_then(|r| r.get(id))
    }

    /// Resolved body of a data source
    #[must_use]
    pub fn data_source(&self, type_name: &str, id: &str) -> Option<&JsonValue> {
        self.data.get(type_name).and_then(|d| d.get(id))
    }

    /// Provider configuration blocks of one provider type
    #[must_use]
    pub fn providers(&self, name: &str) -> &[JsonValue] {
        self.provider.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Resolved body of an output
    #[must_use]
    pub fn output(&self, id: &str) -> Option<&JsonValue> {
        self.output.get(id)
    }

    /// `terraform` block
    #[must_use]
    pub fn terraform(&self) -> &JsonMap<String, JsonValue> {
        &self.terraform
    }

    /// Resource ids in document order, as `type.id`
    pub fn resource_addresses(&self) -> impl Iterator<Item = String> + '_ {
        self.resource
            .iter()
            .flat_map(|(ty, entries)| entries.keys().map(move |id| format!("{ty}.{id}")))
    }

    /// Whole document as a JSON value
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_value(&self) -> Result<JsonValue, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Render as JSON text, pretty-printed or compact
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

/// Emit the document for `stack`, visiting nodes in `order`
///
/// Every node is validated against its schema again before it is written,
/// catching attributes mutated through raw access after construction.
pub(crate) fn emit(
    stack: &Stack,
    order: &[usize],
    config: &SynthConfig,
) -> Result<Document, SynthError> {
    let mut document = Document {
        metadata: None,
        terraform: JsonMap::new(),
        provider: IndexMap::new(),
        data: IndexMap::new(),
        resource: IndexMap::new(),
        output: IndexMap::new(),
    };
    let mut required: IndexMap<&str, JsonValue> = IndexMap::new();

    for &index in order {
        let node = &stack.nodes()[index];
        validate(stack, node)?;
        let mut body = resolve_attributes(stack, node)?;
        if !node.depends_on().is_empty() {
            body.insert(
                "depends_on".to_string(),
                JsonValue::Array(dependency_addresses(stack, node)?),
            );
        }
        let body = JsonValue::Object(body);

        match node.kind() {
            ConstructKind::Provider => {
                require_provider(stack, node.type_name(), &mut required);
                document
                    .provider
                    .entry(node.type_name().to_string())
                    .or_default()
                    .push(body);
            }
            ConstructKind::DataSource => {
                require_provider(stack, node.type_name(), &mut required);
                document
                    .data
                    .entry(node.type_name().to_string())
                    .or_default()
                    .insert(node.id().to_string(), body);
            }
            ConstructKind::Resource => {
                require_provider(stack, node.type_name(), &mut required);
                document
                    .resource
                    .entry(node.type_name().to_string())
                    .or_default()
                    .insert(node.id().to_string(), body);
            }
            ConstructKind::Output => {
                document.output.insert(node.id().to_string(), body);
            }
            ConstructKind::App | ConstructKind::Stack => {}
        }
    }

    if config.backend == Backend::Local {
        document.terraform.insert(
            "backend".to_string(),
            serde_json::json!({ "local": { "path": format!("terraform.{}.tfstate", stack.id()) } }),
        );
    }
    if !required.is_empty() {
        let required: JsonMap<String, JsonValue> = required
            .into_iter()
            .map(|(name, entry)| (name.to_string(), entry))
            .collect();
        document
            .terraform
            .insert("required_providers".to_string(), JsonValue::Object(required));
    }
    if config.emit_metadata {
        document.metadata = Some(serde_json::json!({
            "metadata": {
                "version": crate::VERSION,
                "stackName": stack.id(),
                "backend": config.backend.label(),
            }
        }));
    }

    Ok(document)
}

fn validate(stack: &Stack, node: &Construct) -> Result<(), SynthError> {
    let block = stack.schema_for(node).ok_or_else(|| {
        SynthError::schema(
            stack.id(),
            SchemaViolation::node(
                node.id(),
                ViolationReason::UnknownType {
                    kind: node.kind(),
                    type_name: node.type_name().to_string(),
                },
            ),
        )
    })?;
    block
        .validate(node.id(), node.attributes())
        .map_err(|v| SynthError::schema(stack.id(), v))
}

fn resolve_attributes(
    stack: &Stack,
    node: &Construct,
) -> Result<JsonMap<String, JsonValue>, SynthError> {
    let mut body = JsonMap::with_capacity(node.attributes().len());
    for (name, value) in node.attributes() {
        let resolver = Resolver::new(stack, node.id(), name);
        let resolved = value.resolve(&mut |token: &ReferenceToken| resolver.expression(token))?;
        body.insert(name.clone(), resolved);
    }
    Ok(body)
}

fn dependency_addresses(stack: &Stack, node: &Construct) -> Result<Vec<JsonValue>, SynthError> {
    if !node.kind().accepts_depends_on() {
        return Err(SynthError::schema(
            stack.id(),
            SchemaViolation::node(
                node.id(),
                ViolationReason::DependsOnNotSupported { kind: node.kind() },
            ),
        ));
    }

    node.depends_on()
        .iter()
        .map(|dep| {
            let target = stack.node(dep).ok_or_else(|| {
                SynthError::graph(
                    stack.id(),
                    GraphError::UnresolvedReference {
                        node: dep.clone(),
                        attribute_path: "depends_on".to_string(),
                        referenced_by: node.id().to_string(),
                    },
                )
            })?;
            address(target).map(JsonValue::String).ok_or_else(|| {
                SynthError::schema(
                    stack.id(),
                    SchemaViolation::attribute(
                        node.id(),
                        "depends_on",
                        ViolationReason::NotReferenceable {
                            kind: target.kind(),
                            target: dep.clone(),
                        },
                    ),
                )
            })
        })
        .collect()
}

/// Record the provider serving `type_name` in `required_providers`
fn require_provider<'a>(
    stack: &'a Stack,
    type_name: &str,
    required: &mut IndexMap<&'a str, JsonValue>,
) {
    let Some((name, schema)) = stack.schemas().provider_for(type_name) else {
        return;
    };
    required.entry(name).or_insert_with(|| {
        let mut entry = JsonMap::new();
        entry.insert("source".to_string(), JsonValue::String(schema.source.clone()));
        if let Some(version) = &schema.version {
            entry.insert("version".to_string(), JsonValue::String(version.clone()));
        }
        JsonValue::Object(entry)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tfsynth_construct::{attributes, App, Attributes};
    use tfsynth_test_utils::{build_kms_stack, test_registry};
    use tfsynth_value::Value;

    fn identity_order(stack: &Stack) -> Vec<usize> {
        (0..stack.len()).collect()
    }

    #[test]
    fn test_sections_nest_by_type() {
        let mut app = App::new(test_registry());
        let stack = app.add_stack("kms").unwrap();
        build_kms_stack(stack);

        let config = SynthConfig::default().with_metadata(false);
        let doc = emit(stack, &identity_order(stack), &config).unwrap();

        assert_eq!(doc.providers("aws"), &[json!({"region": "us-east-1"})]);
        assert_eq!(doc.data_source("aws_caller_identity", "aws_id"), Some(&json!({})));
        assert_eq!(
            doc.resource("aws_kms_alias", "kms_alias"),
            Some(&json!({"target_key_id": "${aws_kms_key.aws_kms.id}"}))
        );
        assert_eq!(
            doc.terraform().get("required_providers"),
            Some(&json!({"aws": {"source": "hashicorp/aws", "version": "~> 5.0"}}))
        );
        assert!(doc.to_value().unwrap().get("//").is_none());
    }

    #[test]
    fn test_template_renders_inline() {
        let mut app = App::new(test_registry());
        let stack = app.add_stack("kms").unwrap();
        build_kms_stack(stack);

        let doc = emit(stack, &identity_order(stack), &SynthConfig::default()).unwrap();
        let policy = doc.resource("aws_kms_key", "aws_kms").unwrap()["policy"]
            .as_str()
            .unwrap();
        assert!(policy.contains(
            "arn:aws:iam::${data.aws_caller_identity.aws_id.account_id}:root"
        ));
    }

    #[test]
    fn test_depends_on_and_outputs() {
        let mut app = App::new(test_registry());
        let stack = app.add_stack("deps").unwrap();
        let kms = build_kms_stack(stack);
        let extra = stack.resource("null_resource", "extra", Attributes::new()).unwrap();
        stack.add_dependency(&extra, &kms.key).unwrap();
        stack.add_dependency(&extra, &kms.identity).unwrap();
        let out = stack.output("key_arn", kms.key.attr("arn")).unwrap();
        stack.add_dependency(&out, &kms.alias).unwrap();

        let config = SynthConfig::default().with_backend(Backend::Disabled);
        let doc = emit(stack, &identity_order(stack), &config).unwrap();

        assert_eq!(
            doc.resource("null_resource", "extra"),
            Some(&json!({
                "depends_on": ["aws_kms_key.aws_kms", "data.aws_caller_identity.aws_id"]
            }))
        );
        assert_eq!(
            doc.output("key_arn"),
            Some(&json!({
                "value": "${aws_kms_key.aws_kms.arn}",
                "depends_on": ["aws_kms_alias.kms_alias"]
            }))
        );
        assert!(doc.terraform().get("backend").is_none());
        assert_eq!(
            doc.to_value().unwrap()["//"]["metadata"]["backend"],
            json!("none")
        );
    }

    #[test]
    fn test_local_backend_path() {
        let mut app = App::new(test_registry());
        let stack = app.add_stack("kms").unwrap();
        build_kms_stack(stack);

        let doc = emit(stack, &identity_order(stack), &SynthConfig::default()).unwrap();
        assert_eq!(
            doc.terraform()["backend"],
            json!({"local": {"path": "terraform.kms.tfstate"}})
        );
    }

    #[test]
    fn test_raw_mutation_caught_at_emission() {
        let mut app = App::new(test_registry());
        let stack = app.add_stack("kms").unwrap();
        build_kms_stack(stack);
        stack
            .node_mut("aws_kms")
            .unwrap()
            .attributes_mut()
            .insert("enable_key_rotation".into(), Value::from("yes"));

        let err = emit(stack, &identity_order(stack), &SynthConfig::default()).unwrap_err();
        let SynthError::SchemaViolation { stack: id, source } = err else {
            panic!("expected schema violation");
        };
        assert_eq!(id, "kms");
        assert_eq!(source.node, "aws_kms");
        assert_eq!(source.attribute.as_deref(), Some("enable_key_rotation"));
    }

    #[test]
    fn test_literal_interpolation_syntax_passes_through() {
        let mut app = App::new(test_registry());
        let stack = app.add_stack("lit").unwrap();
        stack
            .resource(
                "null_resource",
                "n",
                attributes([("triggers", Value::map([("raw", "${not.a.token}")]))]),
            )
            .unwrap();

        let doc = emit(stack, &identity_order(stack), &SynthConfig::default()).unwrap();
        assert_eq!(
            doc.resource("null_resource", "n"),
            Some(&json!({"triggers": {"raw": "${not.a.token}"}}))
        );
    }
}
