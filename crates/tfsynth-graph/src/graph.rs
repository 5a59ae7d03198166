//! Dependency Graph
//!
//! [`DependencyGraph`] can ONLY be obtained through [`DependencyGraph::build`],
//! which rejects dangling references and cycles. Holding a value of this
//! type is proof that the stack it was built from is orderable.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tfsynth_construct::Stack;

use crate::error::GraphError;

/// Why an edge exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeKind {
    /// A token inside `attribute` points at the target
    Reference {
        /// Attribute of the dependent node holding the token
        attribute: String,
    },
    /// Declared with `depends_on`
    Explicit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Acyclic dependency graph of one stack
///
/// Node indices equal creation indices in the stack. An edge `x -> y`
/// means `x` depends on `y`, so `y` is emitted first.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<String, EdgeKind>,
}

impl DependencyGraph {
    /// Derive the graph of `stack`
    ///
    /// Walks every attribute (through maps, lists and templates) for tokens
    /// and every explicit dependency. Duplicate edges collapse into the
    /// first one found.
    ///
    /// # Errors
    /// - `UnresolvedReference` for the first token or dependency naming a
    ///   node that is not in the stack, including tokens taken from another
    ///   stack's handles
    /// - `CyclicDependency` with the first cycle found by depth-first search
    ///   from nodes in creation order
    pub fn build(stack: &Stack) -> Result<Self, GraphError> {
        let mut graph = DiGraph::with_capacity(stack.len(), stack.len());
        for node in stack.nodes() {
            graph.add_node(node.id().to_string());
        }

        for (from, node) in stack.nodes().iter().enumerate() {
            let from = NodeIndex::new(from);

            for (attribute, token) in node.references() {
                let unresolved = || GraphError::UnresolvedReference {
                    node: token.node().to_string(),
                    attribute_path: token.path().to_string(),
                    referenced_by: node.id().to_string(),
                };
                // tokens pinned to another stack never bind to a local namesake
                if token.stack().is_some_and(|owner| owner != stack.id()) {
                    return Err(unresolved());
                }
                let to = stack.position(token.node()).ok_or_else(unresolved)?;
                let to = NodeIndex::new(to);
                if graph.find_edge(from, to).is_none() {
                    graph.add_edge(
                        from,
                        to,
                        EdgeKind::Reference {
                            attribute: attribute.to_string(),
                        },
                    );
                }
            }

            for dep in node.depends_on() {
                let to = stack.position(dep).ok_or_else(|| GraphError::UnresolvedReference {
                    node: dep.clone(),
                    attribute_path: "depends_on".to_string(),
                    referenced_by: node.id().to_string(),
                })?;
                let to = NodeIndex::new(to);
                if graph.find_edge(from, to).is_none() {
                    graph.add_edge(from, to, EdgeKind::Explicit);
                }
            }
        }

        let built = Self { graph };
        if let Some(cycle) = built.find_cycle() {
            return Err(GraphError::CyclicDependency { cycle });
        }

        tracing::debug!(
            "Built dependency graph for stack '{}': {} nodes, {} edges",
            stack.id(),
            built.node_count(),
            built.edge_count()
        );
        Ok(built)
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct edges
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node id at a creation index
    #[must_use]
    pub fn id(&self, index: usize) -> Option<&str> {
        self.graph
            .node_weight(NodeIndex::new(index))
            .map(String::as_str)
    }

    /// Edges as `(dependent, dependency, kind)` creation indices
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, &EdgeKind)> {
        self.graph
            .raw_edges()
            .iter()
            .map(|e| (e.source().index(), e.target().index(), &e.weight))
    }

    /// Creation indices of the nodes `index` depends on, ascending
    #[must_use]
    pub fn dependencies(&self, index: usize) -> Vec<usize> {
        self.neighbors(index, Direction::Outgoing)
    }

    /// Creation indices of the nodes depending on `index`, ascending
    #[must_use]
    pub fn dependents(&self, index: usize) -> Vec<usize> {
        self.neighbors(index, Direction::Incoming)
    }

    fn neighbors(&self, index: usize, direction: Direction) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .graph
            .neighbors_directed(NodeIndex::new(index), direction)
            .map(NodeIndex::index)
            .collect();
        out.sort_unstable();
        out
    }

    /// Depth-first search with a "currently visiting" mark
    ///
    /// Roots and successors are visited in creation order, so the reported
    /// cycle is stable for a given stack.
    fn find_cycle(&self) -> Option<Vec<String>> {
        let n = self.node_count();
        let successors: Vec<Vec<usize>> = (0..n).map(|i| self.dependencies(i)).collect();
        let mut state = vec![Mark::Unvisited; n];

        for root in 0..n {
            if state[root] != Mark::Unvisited {
                continue;
            }
            state[root] = Mark::Visiting;
            let mut path: Vec<(usize, usize)> = vec![(root, 0)];

            while let Some(frame) = path.last_mut() {
                let node = frame.0;
                let Some(&next) = successors[node].get(frame.1) else {
                    state[node] = Mark::Done;
                    path.pop();
                    continue;
                };
                frame.1 += 1;

                match state[next] {
                    Mark::Visiting => {
                        let start = path.iter().position(|(n, _)| *n == next).unwrap_or(0);
                        let mut cycle: Vec<String> = path[start..]
                            .iter()
                            .map(|(n, _)| self.graph[NodeIndex::new(*n)].clone())
                            .collect();
                        cycle.push(self.graph[NodeIndex::new(next)].clone());
                        return Some(cycle);
                    }
                    Mark::Unvisited => {
                        state[next] = Mark::Visiting;
                        path.push((next, 0));
                    }
                    Mark::Done => {}
                }
            }
        }

        None
    }

    /// Emission order as creation indices
    ///
    /// Repeatedly emits the lowest-indexed node whose dependencies have all
    /// been emitted. Every dependency precedes its dependents, and nodes
    /// with no path between them keep creation order.
    #[must_use]
    pub fn topological_order(&self) -> Vec<usize> {
        let n = self.node_count();
        let mut pending: Vec<usize> = (0..n)
            .map(|i| {
                self.graph
                    .neighbors_directed(NodeIndex::new(i), Direction::Outgoing)
                    .count()
            })
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = pending
            .iter()
            .enumerate()
            .filter(|&(_, deps)| *deps == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for dependent in self
                .graph
                .neighbors_directed(NodeIndex::new(node), Direction::Incoming)
            {
                let d = dependent.index();
                pending[d] -= 1;
                if pending[d] == 0 {
                    ready.push(Reverse(d));
                }
            }
        }

        order
    }

    /// Emission order as node ids
    #[must_use]
    pub fn order_ids(&self) -> Vec<&str> {
        self.topological_order()
            .into_iter()
            .map(|i| self.graph[NodeIndex::new(i)].as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfsynth_construct::{attributes, App, Attributes};
    use tfsynth_test_utils::{build_kms_stack, null_resource, test_registry};
    use tfsynth_value::Value;

    fn app() -> App {
        App::new(test_registry())
    }

    #[test]
    fn kms_stack_orders_key_before_alias() {
        let mut app = app();
        let stack = app.add_stack("kms").unwrap();
        build_kms_stack(stack);

        let graph = DependencyGraph::build(stack).unwrap();
        assert_eq!(graph.order_ids(), vec!["aws", "aws_id", "aws_kms", "kms_alias"]);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.dependencies(3), vec![2]);
        assert_eq!(graph.dependents(1), vec![2]);
    }

    #[test]
    fn dependency_created_later_is_emitted_first() {
        let mut app = app();
        let stack = app.add_stack("s").unwrap();
        let a = null_resource(stack, "a", &[]);
        let b = null_resource(stack, "b", &[]);
        stack
            .set_attribute(&a, "triggers", Value::map([("b", b.id_ref())]))
            .unwrap();

        let graph = DependencyGraph::build(stack).unwrap();
        assert_eq!(graph.order_ids(), vec!["b", "a"]);
    }

    #[test]
    fn independent_nodes_keep_creation_order() {
        let mut app = app();
        let stack = app.add_stack("s").unwrap();
        for id in ["z", "y", "x", "w"] {
            null_resource(stack, id, &[]);
        }
        let graph = DependencyGraph::build(stack).unwrap();
        assert_eq!(graph.order_ids(), vec!["z", "y", "x", "w"]);
    }

    #[test]
    fn ties_break_by_creation_index() {
        // a depends on c, d depends on b
        let mut app = app();
        let stack = app.add_stack("s").unwrap();
        let a = null_resource(stack, "a", &[]);
        let b = null_resource(stack, "b", &[]);
        let c = null_resource(stack, "c", &[]);
        stack
            .set_attribute(&a, "triggers", Value::map([("c", c.id_ref())]))
            .unwrap();
        null_resource(stack, "d", &[&b]);

        let graph = DependencyGraph::build(stack).unwrap();
        assert_eq!(graph.order_ids(), vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn explicit_dependencies_add_edges() {
        let mut app = app();
        let stack = app.add_stack("s").unwrap();
        let a = null_resource(stack, "a", &[]);
        let b = null_resource(stack, "b", &[]);
        stack.add_dependency(&a, &b).unwrap();

        let graph = DependencyGraph::build(stack).unwrap();
        assert_eq!(graph.order_ids(), vec!["b", "a"]);
        assert_eq!(graph.edges().next().map(|(_, _, k)| k), Some(&EdgeKind::Explicit));
    }

    #[test]
    fn repeated_references_collapse() {
        let mut app = app();
        let stack = app.add_stack("s").unwrap();
        let a = null_resource(stack, "a", &[]);
        stack
            .resource(
                "null_resource",
                "b",
                attributes([(
                    "triggers",
                    Value::map([("x", a.id_ref()), ("y", a.attr("triggers"))]),
                )]),
            )
            .unwrap();
        let b = stack.handle("b").unwrap();
        stack.add_dependency(&b, &a).unwrap();

        let graph = DependencyGraph::build(stack).unwrap();
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn two_node_cycle_is_reported_closed() {
        let mut app = app();
        let stack = app.add_stack("s").unwrap();
        let a = null_resource(stack, "a", &[]);
        let b = null_resource(stack, "b", &[&a]);
        stack
            .set_attribute(&a, "triggers", Value::map([("b", b.id_ref())]))
            .unwrap();

        let err = DependencyGraph::build(stack).unwrap_err();
        assert_eq!(
            err,
            GraphError::CyclicDependency {
                cycle: vec!["a".into(), "b".into(), "a".into()]
            }
        );
        assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut app = app();
        let stack = app.add_stack("s").unwrap();
        let a = null_resource(stack, "a", &[]);
        stack
            .set_attribute(&a, "triggers", Value::map([("me", a.id_ref())]))
            .unwrap();

        assert_eq!(
            DependencyGraph::build(stack).unwrap_err(),
            GraphError::CyclicDependency {
                cycle: vec!["a".into(), "a".into()]
            }
        );
    }

    #[test]
    fn first_cycle_in_creation_order_is_reported() {
        let mut app = app();
        let stack = app.add_stack("s").unwrap();
        let p = null_resource(stack, "p", &[]);
        let q = null_resource(stack, "q", &[&p]);
        let a = null_resource(stack, "a", &[]);
        let b = null_resource(stack, "b", &[&a]);
        stack
            .set_attribute(&a, "triggers", Value::map([("b", b.id_ref())]))
            .unwrap();
        stack
            .set_attribute(&p, "triggers", Value::map([("q", q.id_ref())]))
            .unwrap();

        let GraphError::CyclicDependency { cycle } = DependencyGraph::build(stack).unwrap_err()
        else {
            panic!("expected cycle");
        };
        assert_eq!(cycle, vec!["p", "q", "p"]);
    }

    #[test]
    fn missing_target_is_unresolved() {
        let mut app = app();
        let stack = app.add_stack("s").unwrap();
        let a = null_resource(stack, "a", &[]);
        let ghost = tfsynth_value::ReferenceToken::parse("ghost.tags.Name").unwrap();
        stack
            .set_attribute(&a, "triggers", Value::map([("g", ghost)]))
            .unwrap();

        assert_eq!(
            DependencyGraph::build(stack).unwrap_err(),
            GraphError::UnresolvedReference {
                node: "ghost".into(),
                attribute_path: "tags.Name".into(),
                referenced_by: "a".into(),
            }
        );
    }

    #[test]
    fn token_from_other_stack_does_not_bind_to_namesake() {
        let mut app = app();
        let foreign = null_resource(app.add_stack("one").unwrap(), "key", &[]);
        let stack = app.add_stack("two").unwrap();
        null_resource(stack, "key", &[]);
        let user = null_resource(stack, "user", &[]);
        stack
            .set_attribute(&user, "triggers", Value::map([("k", foreign.id_ref())]))
            .unwrap();

        assert_eq!(
            DependencyGraph::build(stack).unwrap_err(),
            GraphError::UnresolvedReference {
                node: "key".into(),
                attribute_path: "id".into(),
                referenced_by: "user".into(),
            }
        );
    }

    #[test]
    fn token_from_own_stack_handle_binds() {
        let mut app = app();
        let stack = app.add_stack("one").unwrap();
        let key = null_resource(stack, "key", &[]);
        null_resource(stack, "user", &[&key]);

        let graph = DependencyGraph::build(stack).unwrap();
        assert_eq!(graph.dependencies(1), vec![0]);
    }

    #[test]
    fn dangling_explicit_dependency_is_unresolved() {
        let mut app = app();
        let stack = app.add_stack("s").unwrap();
        stack.resource("null_resource", "a", Attributes::new()).unwrap();
        stack
            .node_mut("a")
            .unwrap()
            .depends_on_mut()
            .push("ghost".to_string());

        assert!(matches!(
            DependencyGraph::build(stack),
            Err(GraphError::UnresolvedReference { ref attribute_path, .. }) if attribute_path == "depends_on"
        ));
    }
}
