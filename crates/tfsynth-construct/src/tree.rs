//! Construct tree
//!
//! An [`App`] owns ordered [`Stack`]s; a stack owns ordered declarations
//! ([`Construct`]s). Insertion order is creation order and drives every
//! tie-break during synthesis.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tfsynth_value::{AttributePath, PathError, ReferenceToken, Value};

use crate::error::ConstructError;
use crate::kind::ConstructKind;
use crate::schema::{BlockSchema, SchemaRegistry};
use crate::validate::{SchemaViolation, ViolationReason};

/// Attribute mapping of a construct, insertion ordered
pub type Attributes = IndexMap<String, Value>;

/// Parent name used for stack-level duplicate id errors
pub const APP_ID: &str = "app";

static ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("identifier pattern is valid")
});

fn check_id(id: &str) -> Result<(), ConstructError> {
    if ID_PATTERN.is_match(id) {
        Ok(())
    } else {
        Err(ConstructError::InvalidId(id.to_string()))
    }
}

/// Build an [`Attributes`] map from key/value pairs
///
/// ```
/// use tfsynth_construct::attributes;
///
/// let attrs = attributes([("region", "us-east-1")]);
/// assert_eq!(attrs.len(), 1);
/// ```
pub fn attributes<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Attributes
where
    K: Into<String>,
    V: Into<Value>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// A declaration inside a stack
#[derive(Debug, Clone, PartialEq)]
pub struct Construct {
    id: String,
    kind: ConstructKind,
    type_name: String,
    attributes: Attributes,
    depends_on: Vec<String>,
}

impl Construct {
    /// Id, unique within the stack
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Kind tag
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ConstructKind {
        self.kind
    }

    /// Schema type name (`aws_kms_key`); empty for outputs
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// All attributes in insertion order
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// One attribute
    #[inline]
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Explicit dependencies in declaration order
    #[inline]
    #[must_use]
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// Raw attribute access, bypassing schema validation
    ///
    /// Changes made here are only checked when the stack is synthesized.
    #[inline]
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Raw dependency access, bypassing existence and kind checks
    #[inline]
    pub fn depends_on_mut(&mut self) -> &mut Vec<String> {
        &mut self.depends_on
    }

    /// Every token in the attributes, paired with the attribute holding it
    #[must_use]
    pub fn references(&self) -> Vec<(&str, &ReferenceToken)> {
        self.attributes
            .iter()
            .flat_map(|(name, value)| {
                value
                    .references()
                    .into_iter()
                    .map(move |token| (name.as_str(), token))
            })
            .collect()
    }
}

/// Lightweight handle to a node, used to build references and dependencies
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    stack: String,
    id: String,
    kind: ConstructKind,
}

impl NodeHandle {
    /// Node id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Node kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ConstructKind {
        self.kind
    }

    /// Owning stack id
    #[inline]
    #[must_use]
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Token for a top-level attribute
    #[must_use]
    pub fn attr(&self, name: &str) -> ReferenceToken {
        self.path(AttributePath::attribute(name))
    }

    /// Token for a nested path, pinned to this node's stack
    #[must_use]
    pub fn path(&self, path: AttributePath) -> ReferenceToken {
        ReferenceToken::new(&self.id, path).with_stack(&self.stack)
    }

    /// Token for a dotted path such as `tags.Name` or `ingress[0].from_port`
    ///
    /// # Errors
    /// Returns error if `path` is not a valid attribute path
    pub fn get(&self, path: &str) -> Result<ReferenceToken, PathError> {
        Ok(self.path(path.parse()?))
    }

    /// Token for the implicit `id` attribute
    #[must_use]
    pub fn id_ref(&self) -> ReferenceToken {
        self.attr("id")
    }
}

/// Synthesis unit: produces exactly one document
#[derive(Debug, Clone)]
pub struct Stack {
    id: String,
    schemas: Arc<SchemaRegistry>,
    nodes: Vec<Construct>,
    index: HashMap<String, usize>,
}

impl Stack {
    fn new(id: String, schemas: Arc<SchemaRegistry>) -> Self {
        Self {
            id,
            schemas,
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Stack id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Schemas shared with the owning app
    #[inline]
    #[must_use]
    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// Attribute set for a node in this stack
    #[must_use]
    pub fn schema_for(&self, node: &Construct) -> Option<&BlockSchema> {
        self.schemas.block(node.kind, &node.type_name)
    }

    /// Declarations in creation order
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &[Construct] {
        &self.nodes
    }

    /// Number of declarations
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the stack is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Creation index of a node
    #[inline]
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Node by id
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Construct> {
        self.position(id).map(|i| &self.nodes[i])
    }

    /// Node by id, for raw unvalidated edits
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Construct> {
        let i = self.position(id)?;
        Some(&mut self.nodes[i])
    }

    /// Handle for an existing node
    #[must_use]
    pub fn handle(&self, id: &str) -> Option<NodeHandle> {
        self.node(id).map(|node| NodeHandle {
            stack: self.id.clone(),
            id: node.id.clone(),
            kind: node.kind,
        })
    }

    /// Create a declaration
    ///
    /// # Errors
    /// - `InvalidId` if `id` is not an identifier
    /// - `DuplicateId` if a sibling already uses `id`
    /// - `SchemaViolation` if `kind` cannot live in a stack, `type_name` is
    ///   unknown, or an attribute is illegal for the type
    ///
    /// On error the stack is unchanged.
    pub fn add(
        &mut self,
        kind: ConstructKind,
        type_name: &str,
        id: &str,
        attributes: Attributes,
    ) -> Result<NodeHandle, ConstructError> {
        check_id(id)?;
        if self.index.contains_key(id) {
            return Err(ConstructError::DuplicateId {
                parent: self.id.clone(),
                id: id.to_string(),
            });
        }
        if !kind.is_declaration() {
            return Err(SchemaViolation::node(
                id,
                ViolationReason::KindNotAllowed {
                    kind,
                    parent: ConstructKind::Stack,
                },
            )
            .into());
        }

        let block = self.schemas.block(kind, type_name).ok_or_else(|| {
            SchemaViolation::node(
                id,
                ViolationReason::UnknownType {
                    kind,
                    type_name: type_name.to_string(),
                },
            )
        })?;
        block.validate(id, &attributes)?;

        let type_name = if kind == ConstructKind::Output {
            String::new()
        } else {
            type_name.to_string()
        };

        tracing::trace!("Adding {} '{}' to stack '{}'", kind, id, self.id);
        self.index.insert(id.to_string(), self.nodes.len());
        self.nodes.push(Construct {
            id: id.to_string(),
            kind,
            type_name,
            attributes,
            depends_on: Vec::new(),
        });

        Ok(NodeHandle {
            stack: self.id.clone(),
            id: id.to_string(),
            kind,
        })
    }

    /// Create a provider configuration; its id is the provider name
    ///
    /// # Errors
    /// See [`Stack::add`]
    pub fn provider(
        &mut self,
        name: &str,
        attributes: Attributes,
    ) -> Result<NodeHandle, ConstructError> {
        self.add(ConstructKind::Provider, name, name, attributes)
    }

    /// Create a managed resource
    ///
    /// # Errors
    /// See [`Stack::add`]
    pub fn resource(
        &mut self,
        type_name: &str,
        id: &str,
        attributes: Attributes,
    ) -> Result<NodeHandle, ConstructError> {
        self.add(ConstructKind::Resource, type_name, id, attributes)
    }

    /// Create a data source lookup
    ///
    /// # Errors
    /// See [`Stack::add`]
    pub fn data_source(
        &mut self,
        type_name: &str,
        id: &str,
        attributes: Attributes,
    ) -> Result<NodeHandle, ConstructError> {
        self.add(ConstructKind::DataSource, type_name, id, attributes)
    }

    /// Create an output exporting `value`
    ///
    /// # Errors
    /// See [`Stack::add`]
    pub fn output(
        &mut self,
        id: &str,
        value: impl Into<Value>,
    ) -> Result<NodeHandle, ConstructError> {
        self.add(
            ConstructKind::Output,
            "",
            id,
            attributes([("value", value.into())]),
        )
    }

    /// Read an attribute through a handle
    #[must_use]
    pub fn attribute(&self, node: &NodeHandle, name: &str) -> Option<&Value> {
        if node.stack != self.id {
            return None;
        }
        self.node(&node.id).and_then(|n| n.attribute(name))
    }

    fn position_of(&self, node: &NodeHandle) -> Result<usize, ConstructError> {
        if node.stack != self.id {
            return Err(ConstructError::UnknownNode {
                stack: self.id.clone(),
                id: node.id.clone(),
            });
        }
        self.position(&node.id)
            .ok_or_else(|| ConstructError::UnknownNode {
                stack: self.id.clone(),
                id: node.id.clone(),
            })
    }

    /// Set an attribute, validating it against the node's schema
    ///
    /// # Errors
    /// `UnknownNode` for a foreign handle, `SchemaViolation` if the new
    /// attribute set would be illegal. On error the node is unchanged.
    pub fn set_attribute(
        &mut self,
        node: &NodeHandle,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), ConstructError> {
        let pos = self.position_of(node)?;
        let construct = &self.nodes[pos];
        let block = self
            .schemas
            .block(construct.kind, &construct.type_name)
            .ok_or_else(|| {
                SchemaViolation::node(
                    &construct.id,
                    ViolationReason::UnknownType {
                        kind: construct.kind,
                        type_name: construct.type_name.clone(),
                    },
                )
            })?;

        let mut candidate = construct.attributes.clone();
        candidate.insert(name.to_string(), value.into());
        block.validate(&construct.id, &candidate)?;

        self.nodes[pos].attributes = candidate;
        Ok(())
    }

    /// Declare that `from` must be created after `on`
    ///
    /// Recorded once; repeated calls are no-ops.
    ///
    /// # Errors
    /// `UnknownNode` for handles outside this stack; `SchemaViolation` if
    /// `from` cannot carry `depends_on` or `on` is not a resource or data source
    pub fn add_dependency(
        &mut self,
        from: &NodeHandle,
        on: &NodeHandle,
    ) -> Result<(), ConstructError> {
        let from_pos = self.position_of(from)?;
        let on_pos = self.position_of(on)?;

        let source_kind = self.nodes[from_pos].kind;
        if !source_kind.accepts_depends_on() {
            return Err(SchemaViolation::node(
                &from.id,
                ViolationReason::DependsOnNotSupported { kind: source_kind },
            )
            .into());
        }
        let target_kind = self.nodes[on_pos].kind;
        if !target_kind.is_referenceable() {
            return Err(SchemaViolation::attribute(
                &from.id,
                "depends_on",
                ViolationReason::NotReferenceable {
                    kind: target_kind,
                    target: on.id.clone(),
                },
            )
            .into());
        }

        let deps = &mut self.nodes[from_pos].depends_on;
        if !deps.contains(&on.id) {
            deps.push(on.id.clone());
        }
        Ok(())
    }
}

/// Root of a construct tree
#[derive(Debug, Clone)]
pub struct App {
    schemas: Arc<SchemaRegistry>,
    stacks: Vec<Stack>,
}

impl App {
    /// Empty app validating against `schemas`
    #[must_use]
    pub fn new(schemas: impl Into<Arc<SchemaRegistry>>) -> Self {
        Self {
            schemas: schemas.into(),
            stacks: Vec::new(),
        }
    }

    /// Create a stack
    ///
    /// # Errors
    /// `InvalidId` or `DuplicateId`; the app is unchanged on error
    pub fn add_stack(&mut self, id: &str) -> Result<&mut Stack, ConstructError> {
        check_id(id)?;
        if self.stacks.iter().any(|s| s.id == id) {
            return Err(ConstructError::DuplicateId {
                parent: APP_ID.to_string(),
                id: id.to_string(),
            });
        }

        tracing::debug!("Adding stack '{}'", id);
        let index = self.stacks.len();
        self.stacks
            .push(Stack::new(id.to_string(), Arc::clone(&self.schemas)));
        Ok(&mut self.stacks[index])
    }

    /// Stacks in creation order
    #[inline]
    #[must_use]
    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    /// Stack by id
    #[must_use]
    pub fn stack(&self, id: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.id == id)
    }

    /// Stack by id, mutable
    pub fn stack_mut(&mut self, id: &str) -> Option<&mut Stack> {
        self.stacks.iter_mut().find(|s| s.id == id)
    }

    /// Shared schemas
    #[inline]
    #[must_use]
    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSchema, AttributeType, ProviderSchema};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new().with_provider(
            "null",
            ProviderSchema::new("hashicorp/null").with_resource(
                "null_resource",
                BlockSchema::new().with(
                    "triggers",
                    AttributeSchema::optional(AttributeType::Map(Box::new(AttributeType::String))),
                ),
            ),
        )
    }

    #[test]
    fn rejects_invalid_ids() {
        let mut app = App::new(registry());
        assert!(matches!(
            app.add_stack("1abc"),
            Err(ConstructError::InvalidId(_))
        ));
        let stack = app.add_stack("main").unwrap();
        assert!(matches!(
            stack.resource("null_resource", "has space", Attributes::new()),
            Err(ConstructError::InvalidId(_))
        ));
    }

    #[test]
    fn rejects_nested_stacks() {
        let mut app = App::new(registry());
        let stack = app.add_stack("main").unwrap();
        let err = stack
            .add(ConstructKind::Stack, "", "inner", Attributes::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ConstructError::SchemaViolation(SchemaViolation {
                reason: ViolationReason::KindNotAllowed { .. },
                ..
            })
        ));
        assert!(stack.is_empty());
    }

    #[test]
    fn references_pair_tokens_with_attributes() {
        let mut app = App::new(registry());
        let stack = app.add_stack("main").unwrap();
        let a = stack.resource("null_resource", "a", Attributes::new()).unwrap();
        let b = stack
            .resource(
                "null_resource",
                "b",
                attributes([("triggers", Value::map([("a", a.id_ref())]))]),
            )
            .unwrap();

        let node = stack.node(b.id()).unwrap();
        let refs = node.references();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].0, "triggers");
        assert_eq!(refs[0].1.node(), "a");
    }

    #[test]
    fn handles_from_other_stacks_are_rejected() {
        let mut app = App::new(registry());
        let foreign = app
            .add_stack("one")
            .unwrap()
            .resource("null_resource", "a", Attributes::new())
            .unwrap();
        let stack = app.add_stack("two").unwrap();
        stack.resource("null_resource", "a", Attributes::new()).unwrap();

        assert!(matches!(
            stack.set_attribute(&foreign, "triggers", Value::map([("x", "y")])),
            Err(ConstructError::UnknownNode { .. })
        ));
        assert!(stack.attribute(&foreign, "triggers").is_none());
    }
}
