//! tfsynth dependency graph
//!
//! Derives the dependency graph of a stack from token usage and explicit
//! `depends_on`, rejects cycles, and produces the deterministic emission
//! order used by the synthesizer.
//!
//! # Example
//!
//! ```rust,ignore
//! let graph = DependencyGraph::build(stack)?;
//! for id in graph.order_ids() {
//!     println!("{id}");
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod graph;

// Re-exports
pub use error::GraphError;
pub use graph::{DependencyGraph, EdgeKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
