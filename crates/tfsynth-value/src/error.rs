//! Error types for values and paths

/// Attribute path parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Path string was empty
    #[error("empty attribute path")]
    Empty,

    /// Two separators with nothing between them
    #[error("empty segment in path '{path}'")]
    EmptySegment {
        /// Full path being parsed
        path: String,
    },

    /// Segment contains characters outside `[A-Za-z0-9_-]`
    #[error("invalid path segment: {0}")]
    InvalidSegment(String),

    /// Malformed `[n]` suffix
    #[error("invalid list index in segment: {0}")]
    InvalidIndex(String),

    /// Reference expression names a node but no attribute
    #[error("reference '{0}' has no attribute path")]
    MissingAttribute(String),
}

/// Errors converting loosely-typed JSON into [`Value`](crate::Value)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// `$ref` expression failed to parse
    #[error("invalid reference: {0}")]
    InvalidReference(#[from] PathError),

    /// `$ref` or `$template` had the wrong shape
    #[error("invalid {marker} value: {reason}")]
    Malformed {
        /// `$ref` or `$template`
        marker: &'static str,
        /// What was wrong
        reason: String,
    },
}
