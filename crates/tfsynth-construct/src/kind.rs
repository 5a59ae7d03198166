//! Construct kinds

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of node kinds in a construct tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructKind {
    /// Root of the tree, owns stacks
    App,
    /// Synthesis unit, owns declarations
    Stack,
    /// Provider configuration
    Provider,
    /// Read-only lookup
    #[serde(alias = "data")]
    DataSource,
    /// Managed resource
    Resource,
    /// Exported value
    Output,
}

impl ConstructKind {
    /// Whether nodes of this kind take part in the dependency graph
    #[inline]
    #[must_use]
    pub fn is_declaration(self) -> bool {
        matches!(
            self,
            Self::Provider | Self::DataSource | Self::Resource | Self::Output
        )
    }

    /// Whether other nodes may read this kind's attributes through tokens
    #[inline]
    #[must_use]
    pub fn is_referenceable(self) -> bool {
        matches!(self, Self::DataSource | Self::Resource)
    }

    /// Whether nodes of this kind accept explicit `depends_on`
    #[inline]
    #[must_use]
    pub fn accepts_depends_on(self) -> bool {
        matches!(self, Self::DataSource | Self::Resource | Self::Output)
    }

    /// Human-readable name
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Stack => "stack",
            Self::Provider => "provider",
            Self::DataSource => "data source",
            Self::Resource => "resource",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
