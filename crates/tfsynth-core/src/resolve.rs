//! Token resolution
//!
//! Turns a [`ReferenceToken`] into the Terraform expression addressing the
//! referenced attribute: `aws_kms_key.aws_kms.id` for resources,
//! `data.aws_caller_identity.aws_id.account_id` for data sources.

use tfsynth_construct::{Construct, ConstructKind, SchemaViolation, Stack, ViolationReason};
use tfsynth_graph::GraphError;
use tfsynth_value::ReferenceToken;

use crate::error::SynthError;

/// Attribute every resource and data source exposes without declaring it
pub(crate) const IMPLICIT_ID: &str = "id";

/// Terraform address of a resource or data source (`type.id`, `data.type.id`)
pub(crate) fn address(node: &Construct) -> Option<String> {
    match node.kind() {
        ConstructKind::Resource => Some(format!("{}.{}", node.type_name(), node.id())),
        ConstructKind::DataSource => Some(format!("data.{}.{}", node.type_name(), node.id())),
        _ => None,
    }
}

/// Resolves tokens held by one attribute of one node
pub(crate) struct Resolver<'a> {
    stack: &'a Stack,
    node: &'a str,
    attribute: &'a str,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(stack: &'a Stack, node: &'a str, attribute: &'a str) -> Self {
        Self {
            stack,
            node,
            attribute,
        }
    }

    /// Bare interpolation expression for `token`
    pub(crate) fn expression(&self, token: &ReferenceToken) -> Result<String, SynthError> {
        let target = self.stack.node(token.node()).ok_or_else(|| {
            SynthError::graph(
                self.stack.id(),
                GraphError::UnresolvedReference {
                    node: token.node().to_string(),
                    attribute_path: token.path().to_string(),
                    referenced_by: self.node.to_string(),
                },
            )
        })?;

        let Some(address) = address(target) else {
            return Err(self.violation(ViolationReason::NotReferenceable {
                kind: target.kind(),
                target: target.id().to_string(),
            }));
        };

        let attribute = token.attribute();
        let declared = attribute == IMPLICIT_ID
            || self
                .stack
                .schema_for(target)
                .is_some_and(|block| block.get(attribute).is_some());
        if !declared {
            return Err(self.violation(ViolationReason::UnknownReferencedAttribute {
                target: target.id().to_string(),
                attribute: attribute.to_string(),
            }));
        }

        Ok(format!("{address}.{}", token.path()))
    }

    fn violation(&self, reason: ViolationReason) -> SynthError {
        SynthError::schema(
            self.stack.id(),
            SchemaViolation::attribute(self.node, self.attribute, reason),
        )
    }
}
