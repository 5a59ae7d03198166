//! tfsynth core - construct tree synthesizer
//!
//! Turns an in-memory construct tree into one Terraform JSON document per
//! stack:
//! - Builds each stack's dependency graph and rejects cycles
//! - Orders nodes so dependencies are emitted first, ties in creation order
//! - Resolves reference tokens into interpolation expressions
//! - Re-validates every node before it is written
//! - Writes the documents and a manifest to an assembly directory
//!
//! # Example
//!
//! ```rust,ignore
//! use tfsynth_core::prelude::*;
//!
//! let schemas = SchemaRegistry::load("schema.yaml")?;
//! let app = load_app("app.yaml", schemas)?;
//! let synthesis = Synthesizer::new(SynthConfig::new()).synthesize(&app);
//! AssemblyWriter::new("cdktf.out").write(&synthesis)?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod app_file;
pub mod config;
pub mod emit;
pub mod error;
pub mod output;
mod resolve;
pub mod synth;

// Re-exports for convenience
pub use app_file::{load_app, AppSpec, NodeSpec, StackSpec};
pub use config::{Backend, SynthConfig, DEFAULT_OUTPUT_DIR, OUTDIR_ENV};
pub use emit::Document;
pub use error::{AppFileError, ConfigError, OutputError, SynthError};
pub use output::{digest, AssemblyWriter, Manifest, ManifestEntry, MANIFEST_FILE, STACK_FILE};
pub use synth::{synthesize, StackArtifact, Synthesis, Synthesizer};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building and synthesizing apps
    pub use crate::{
        load_app, AssemblyWriter, Backend, Document, StackArtifact, SynthConfig, SynthError,
        Synthesis, Synthesizer,
    };
    pub use tfsynth_construct::{
        attributes, App, Attributes, ConstructKind, NodeHandle, SchemaRegistry, Stack,
    };
    pub use tfsynth_value::{ReferenceToken, Template, Value};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
