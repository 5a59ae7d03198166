//! Reference tokens
//!
//! A [`ReferenceToken`] stands in for an attribute value that only exists
//! once the provisioning engine has created the referenced node.

use std::fmt::{self, Display, Formatter};

use crate::error::PathError;
use crate::path::AttributePath;

/// Placeholder for `attribute_path` of node `node`
///
/// Carries structure only. The interpolation expression is produced at
/// synthesis time, once the referenced node's kind and type are known.
///
/// Tokens built from a node handle remember the stack they came from and
/// only resolve inside that stack. Parsed tokens carry no stack and bind
/// to the stack holding them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReferenceToken {
    node: String,
    path: AttributePath,
    stack: Option<String>,
}

impl ReferenceToken {
    /// Create a token for `path` on node `node`
    #[inline]
    #[must_use]
    pub fn new(node: impl Into<String>, path: AttributePath) -> Self {
        Self {
            node: node.into(),
            path,
            stack: None,
        }
    }

    /// Pin the token to the stack owning the referenced node
    #[inline]
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Parse `node.attribute[.more]`
    ///
    /// # Errors
    /// Returns error if there is no attribute part or the path is malformed
    pub fn parse(expr: &str) -> Result<Self, PathError> {
        let (node, path) = expr
            .split_once('.')
            .ok_or_else(|| PathError::MissingAttribute(expr.to_string()))?;
        if node.is_empty() {
            return Err(PathError::EmptySegment {
                path: expr.to_string(),
            });
        }
        Ok(Self::new(node, path.parse()?))
    }

    /// Id of the referenced node
    #[inline]
    #[must_use]
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Path within the referenced node
    #[inline]
    #[must_use]
    pub fn path(&self) -> &AttributePath {
        &self.path
    }

    /// Stack the token is pinned to, if any
    #[inline]
    #[must_use]
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    /// Top-level attribute being read
    #[inline]
    #[must_use]
    pub fn attribute(&self) -> &str {
        self.path.root()
    }
}

impl Display for ReferenceToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_node_from_path() {
        let token = ReferenceToken::parse("aws_kms.tags.Name").unwrap();
        assert_eq!(token.node(), "aws_kms");
        assert_eq!(token.attribute(), "tags");
        assert_eq!(token.path().to_string(), "tags.Name");
        assert_eq!(token.to_string(), "aws_kms.tags.Name");
    }

    #[test]
    fn parse_requires_attribute() {
        assert!(matches!(
            ReferenceToken::parse("aws_kms"),
            Err(PathError::MissingAttribute(_))
        ));
        assert!(ReferenceToken::parse(".id").is_err());
        assert!(ReferenceToken::parse("aws_kms.").is_err());
    }

    #[test]
    fn stack_pin_is_kept_out_of_display() {
        let token = ReferenceToken::parse("key.id").unwrap();
        assert_eq!(token.stack(), None);

        let pinned = token.clone().with_stack("one");
        assert_eq!(pinned.stack(), Some("one"));
        assert_eq!(pinned.to_string(), "key.id");
        assert_ne!(pinned, token);
    }
}
