//! tfsynth values
//!
//! Attribute values for construct trees.
//!
//! # Overview
//!
//! - **Value**: literal, reference, or template stored in an attribute
//! - **ReferenceToken**: `(node id, attribute path)` placeholder resolved at synthesis
//! - **AttributePath**: `tags.Name`, `ingress[0].from_port`
//!
//! # Example
//!
//! ```rust
//! use tfsynth_value::{ReferenceToken, Value};
//!
//! let key_id = ReferenceToken::parse("aws_kms.id").unwrap();
//! let attrs = Value::map([("target_key_id", Value::from(key_id))]);
//! assert_eq!(attrs.references().len(), 1);
//! ```

#![warn(missing_docs)]

mod error;
mod path;
mod token;
mod value;

// Re-exports
pub use error::{PathError, ValueError};
pub use path::{AttributePath, PathSegment};
pub use token::ReferenceToken;
pub use value::{Fragment, Template, Value, REF_MARKER, TEMPLATE_MARKER};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
