//! Graph construction errors

/// Errors deriving a stack's dependency graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Dependencies form a cycle; path is closed (`a -> b -> a`)
    #[error("cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency {
        /// Node ids along the first cycle found, in creation order
        cycle: Vec<String>,
    },

    /// Token or `depends_on` names a node that is not in the stack
    #[error("unresolved reference to '{node}' ({attribute_path}) from '{referenced_by}'")]
    UnresolvedReference {
        /// Missing node id
        node: String,
        /// Path read on the missing node, or `depends_on`
        attribute_path: String,
        /// Node holding the reference
        referenced_by: String,
    },
}
