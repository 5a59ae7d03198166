//! Construction-time errors

use crate::validate::SchemaViolation;

/// Errors raised while building a construct tree
///
/// Every variant leaves the tree exactly as it was before the failing call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstructError {
    /// Sibling with the same id already exists
    #[error("duplicate id '{id}' under '{parent}'")]
    DuplicateId {
        /// Parent id (app name or stack id)
        parent: String,
        /// Rejected id
        id: String,
    },

    /// Attribute or placement not allowed by the schema
    #[error(transparent)]
    SchemaViolation(#[from] SchemaViolation),

    /// Id is not a valid identifier
    #[error("invalid construct id '{0}': expected [A-Za-z_][A-Za-z0-9_-]*")]
    InvalidId(String),

    /// Handle does not belong to this stack
    #[error("no node '{id}' in stack '{stack}'")]
    UnknownNode {
        /// Stack searched
        stack: String,
        /// Missing id
        id: String,
    },
}

impl ConstructError {
    /// Id of the node the error is about
    #[must_use]
    pub fn node_id(&self) -> &str {
        match self {
            Self::DuplicateId { id, .. } | Self::UnknownNode { id, .. } => id,
            Self::SchemaViolation(v) => &v.node,
            Self::InvalidId(id) => id,
        }
    }

    /// Check if this is a duplicate id error
    #[inline]
    #[must_use]
    pub fn is_duplicate_id(&self) -> bool {
        matches!(self, Self::DuplicateId { .. })
    }

    /// Check if this is a schema violation
    #[inline]
    #[must_use]
    pub fn is_schema_violation(&self) -> bool {
        matches!(self, Self::SchemaViolation(_))
    }
}
