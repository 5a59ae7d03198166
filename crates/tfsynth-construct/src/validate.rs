//! Attribute validation against block schemas
//!
//! Runs at construction time and again as the final pass before a document
//! is emitted, so attributes mutated through raw access are still caught.

use indexmap::IndexMap;
use std::fmt;
use tfsynth_value::Value;

use crate::kind::ConstructKind;
use crate::schema::{AttributeType, BlockSchema};

/// Why a node failed schema validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViolationReason {
    /// No schema registered for the node's type
    #[error("no schema for {kind} type '{type_name}'")]
    UnknownType {
        /// Node kind
        kind: ConstructKind,
        /// Requested type name
        type_name: String,
    },

    /// Attribute not declared for this type
    #[error("unknown attribute")]
    UnknownAttribute,

    /// Literal has the wrong shape for the declared type
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// Declared type
        expected: String,
        /// Variant actually supplied
        found: &'static str,
    },

    /// Required attribute missing or null
    #[error("required attribute is missing")]
    MissingRequired,

    /// Attribute is computed by the provider and read-only
    #[error("attribute is computed and cannot be set")]
    ComputedOnly,

    /// Kind cannot be placed under this parent
    #[error("{kind} cannot be placed under a {parent}")]
    KindNotAllowed {
        /// Kind being added
        kind: ConstructKind,
        /// Kind of the parent
        parent: ConstructKind,
    },

    /// Token points at a kind whose attributes cannot be read
    #[error("cannot reference attributes of {kind} '{target}'")]
    NotReferenceable {
        /// Kind of the referenced node
        kind: ConstructKind,
        /// Referenced node id
        target: String,
    },

    /// Token reads an attribute the referenced node does not declare
    #[error("'{target}' has no attribute '{attribute}'")]
    UnknownReferencedAttribute {
        /// Referenced node id
        target: String,
        /// Attribute name
        attribute: String,
    },

    /// Node kind does not accept explicit dependencies
    #[error("{kind} does not accept depends_on")]
    DependsOnNotSupported {
        /// Node kind
        kind: ConstructKind,
    },
}

/// Schema validation failure on a node
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("schema violation on '{node}'{at}: {reason}", at = fmt_attribute(.attribute.as_deref()))]
pub struct SchemaViolation {
    /// Offending node id
    pub node: String,
    /// Offending attribute path, if the problem is attribute-specific
    pub attribute: Option<String>,
    /// What went wrong
    pub reason: ViolationReason,
}

fn fmt_attribute(attribute: Option<&str>) -> String {
    attribute.map(|a| format!(" at '{a}'")).unwrap_or_default()
}

impl SchemaViolation {
    /// Violation not tied to a single attribute
    #[must_use]
    pub fn node(node: impl Into<String>, reason: ViolationReason) -> Self {
        Self {
            node: node.into(),
            attribute: None,
            reason,
        }
    }

    /// Violation on a specific attribute path
    #[must_use]
    pub fn attribute(
        node: impl Into<String>,
        attribute: impl Into<String>,
        reason: ViolationReason,
    ) -> Self {
        Self {
            node: node.into(),
            attribute: Some(attribute.into()),
            reason,
        }
    }
}

impl BlockSchema {
    /// Validate a node's top-level attributes
    ///
    /// Checks, in order: every attribute is declared, settable, and of the
    /// declared type; then every required attribute is present and non-null.
    ///
    /// # Errors
    /// Returns the first violation found, in attribute order
    pub fn validate(
        &self,
        node: &str,
        attributes: &IndexMap<String, Value>,
    ) -> Result<(), SchemaViolation> {
        for (name, value) in attributes {
            let schema = self.get(name).ok_or_else(|| {
                SchemaViolation::attribute(node, name, ViolationReason::UnknownAttribute)
            })?;
            if !schema.is_settable() {
                return Err(SchemaViolation::attribute(
                    node,
                    name,
                    ViolationReason::ComputedOnly,
                ));
            }
            check_value(node, name, &schema.ty, value)?;
        }
        check_required(node, None, self, attributes)
    }
}

fn check_required(
    node: &str,
    prefix: Option<&str>,
    block: &BlockSchema,
    attributes: &IndexMap<String, Value>,
) -> Result<(), SchemaViolation> {
    for (name, schema) in block.iter() {
        if schema.required && matches!(attributes.get(name), None | Some(Value::Null)) {
            let at = prefix.map_or_else(|| name.to_string(), |p| format!("{p}.{name}"));
            return Err(SchemaViolation::attribute(
                node,
                at,
                ViolationReason::MissingRequired,
            ));
        }
    }
    Ok(())
}

/// Check one value against a declared type
///
/// Null and reference tokens satisfy every type: null means unset and a
/// token's type is only known after provisioning. Templates produce strings.
fn check_value(
    node: &str,
    at: &str,
    ty: &AttributeType,
    value: &Value,
) -> Result<(), SchemaViolation> {
    let mismatch = || {
        SchemaViolation::attribute(
            node,
            at,
            ViolationReason::TypeMismatch {
                expected: ty.to_string(),
                found: value.type_name(),
            },
        )
    };

    match (ty, value) {
        (_, Value::Null | Value::Reference(_)) | (AttributeType::Any, _) => Ok(()),
        (AttributeType::String, Value::String(_) | Value::Template(_))
        | (AttributeType::Number, Value::Number(_))
        | (AttributeType::Bool, Value::Bool(_)) => Ok(()),
        (AttributeType::List(inner) | AttributeType::Set(inner), Value::List(items)) => {
            for (i, item) in items.iter().enumerate() {
                check_value(node, &format!("{at}[{i}]"), inner, item)?;
            }
            Ok(())
        }
        (AttributeType::Map(inner), Value::Map(entries)) => {
            for (key, item) in entries {
                check_value(node, &format!("{at}.{key}"), inner, item)?;
            }
            Ok(())
        }
        (AttributeType::Object(block), Value::Map(entries)) => {
            for (key, item) in entries {
                let field_at = format!("{at}.{key}");
                let field = block.get(key).ok_or_else(|| {
                    SchemaViolation::attribute(node, &field_at, ViolationReason::UnknownAttribute)
                })?;
                if !field.is_settable() {
                    return Err(SchemaViolation::attribute(
                        node,
                        field_at,
                        ViolationReason::ComputedOnly,
                    ));
                }
                check_value(node, &field_at, &field.ty, item)?;
            }
            check_required(node, Some(at), block, entries)
        }
        _ => Err(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeSchema;
    use tfsynth_value::{ReferenceToken, Template};

    fn key_schema() -> BlockSchema {
        BlockSchema::new()
            .with("description", AttributeSchema::optional(AttributeType::String))
            .with("enable_key_rotation", AttributeSchema::optional(AttributeType::Bool))
            .with("policy", AttributeSchema::required(AttributeType::String))
            .with(
                "tags",
                AttributeSchema::optional(AttributeType::Map(Box::new(AttributeType::String))),
            )
            .with(
                "rules",
                AttributeSchema::optional(AttributeType::List(Box::new(AttributeType::Object(
                    BlockSchema::new()
                        .with("port", AttributeSchema::required(AttributeType::Number))
                        .with("rule_id", AttributeSchema::computed(AttributeType::String)),
                )))),
            )
            .with("arn", AttributeSchema::computed(AttributeType::String))
    }

    fn attrs(entries: Vec<(&str, Value)>) -> IndexMap<String, Value> {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn accepts_well_typed_attributes() {
        let a = attrs(vec![
            ("policy", Value::from("{}")),
            ("enable_key_rotation", Value::from(true)),
            ("tags", Value::map([("Name", "demo")])),
            ("rules", Value::list([Value::map([("port", 443)])])),
        ]);
        assert!(key_schema().validate("k", &a).is_ok());
    }

    #[test]
    fn tokens_and_templates_satisfy_string_slots() {
        let token = ReferenceToken::parse("other.arn").unwrap();
        let a = attrs(vec![
            ("policy", Value::from(Template::new().text("x").reference(token.clone()))),
            ("enable_key_rotation", Value::from(token)),
        ]);
        assert!(key_schema().validate("k", &a).is_ok());
    }

    #[test]
    fn rejects_unknown_attribute() {
        let a = attrs(vec![("policy", Value::from("{}")), ("colour", Value::from("red"))]);
        let err = key_schema().validate("k", &a).unwrap_err();
        assert_eq!(err.attribute.as_deref(), Some("colour"));
        assert_eq!(err.reason, ViolationReason::UnknownAttribute);
    }

    #[test]
    fn rejects_wrong_type_with_nested_path() {
        let a = attrs(vec![
            ("policy", Value::from("{}")),
            ("tags", Value::map([("Name", Value::from(3))])),
        ]);
        let err = key_schema().validate("k", &a).unwrap_err();
        assert_eq!(err.attribute.as_deref(), Some("tags.Name"));
        assert!(matches!(
            err.reason,
            ViolationReason::TypeMismatch { found: "number", .. }
        ));
    }

    #[test]
    fn rejects_missing_required_in_nested_object() {
        let a = attrs(vec![
            ("policy", Value::from("{}")),
            ("rules", Value::list([Value::map([("other", 1)])])),
        ]);
        let err = key_schema().validate("k", &a).unwrap_err();
        assert_eq!(err.attribute.as_deref(), Some("rules[0].other"));

        let a = attrs(vec![
            ("policy", Value::from("{}")),
            ("rules", Value::list([Value::Map(IndexMap::new())])),
        ]);
        let err = key_schema().validate("k", &a).unwrap_err();
        assert_eq!(err.attribute.as_deref(), Some("rules[0].port"));
        assert_eq!(err.reason, ViolationReason::MissingRequired);
    }

    #[test]
    fn rejects_missing_or_null_required() {
        let err = key_schema().validate("k", &IndexMap::new()).unwrap_err();
        assert_eq!(err.reason, ViolationReason::MissingRequired);

        let a = attrs(vec![("policy", Value::Null)]);
        assert!(key_schema().validate("k", &a).is_err());
    }

    #[test]
    fn rejects_setting_computed_attribute() {
        let a = attrs(vec![("policy", Value::from("{}")), ("arn", Value::from("x"))]);
        let err = key_schema().validate("k", &a).unwrap_err();
        assert_eq!(err.reason, ViolationReason::ComputedOnly);
    }

    #[test]
    fn rejects_setting_computed_field_inside_object() {
        let a = attrs(vec![
            ("policy", Value::from("{}")),
            (
                "rules",
                Value::list([Value::map([
                    ("port", Value::from(22)),
                    ("rule_id", Value::from("r-1")),
                ])]),
            ),
        ]);
        let err = key_schema().validate("k", &a).unwrap_err();
        assert_eq!(err.attribute.as_deref(), Some("rules[0].rule_id"));
        assert_eq!(err.reason, ViolationReason::ComputedOnly);
    }

    #[test]
    fn display_names_node_and_attribute() {
        let err = SchemaViolation::attribute("k", "tags", ViolationReason::UnknownAttribute);
        assert_eq!(err.to_string(), "schema violation on 'k' at 'tags': unknown attribute");
    }
}
