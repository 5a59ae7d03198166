//! tfsynth constructs
//!
//! Typed construct tree with schema-validated attributes.
//!
//! # Core Concepts
//!
//! - [`App`]: root of the tree, owns stacks
//! - [`Stack`]: ordered declarations synthesized into one document
//! - [`Construct`]: provider, data source, resource or output
//! - [`SchemaRegistry`]: declared attribute sets per provider type
//!
//! # Example
//!
//! ```rust
//! use tfsynth_construct::{attributes, App, AttributeSchema, AttributeType, BlockSchema,
//!     ProviderSchema, SchemaRegistry};
//!
//! let schemas = SchemaRegistry::new().with_provider(
//!     "aws",
//!     ProviderSchema::new("hashicorp/aws")
//!         .with_provider_block(
//!             BlockSchema::new().with("region", AttributeSchema::required(AttributeType::String)),
//!         )
//!         .with_resource(
//!             "aws_kms_key",
//!             BlockSchema::new().with("description", AttributeSchema::optional(AttributeType::String)),
//!         ),
//! );
//!
//! let mut app = App::new(schemas);
//! let stack = app.add_stack("kms").unwrap();
//! stack.provider("aws", attributes([("region", "us-east-1")])).unwrap();
//! let key = stack.resource("aws_kms_key", "key", attributes([("description", "demo")])).unwrap();
//! assert_eq!(key.id_ref().to_string(), "key.id");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod kind;
pub mod schema;
mod tree;
mod validate;

// Re-exports
pub use error::ConstructError;
pub use kind::ConstructKind;
pub use schema::{
    AttributeSchema, AttributeType, BlockSchema, ProviderSchema, SchemaError, SchemaRegistry,
};
pub use tree::{attributes, App, Attributes, Construct, NodeHandle, Stack, APP_ID};
pub use validate::{SchemaViolation, ViolationReason};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
