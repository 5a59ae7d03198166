//! Assembly output
//!
//! Writes successful stacks to `<outdir>/stacks/<stack>/cdk.tf.json` and a
//! `manifest.json` describing them. Every file is written to a temporary
//! file in the target directory and renamed into place.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::OutputError;
use crate::synth::{StackArtifact, Synthesis};

/// Manifest file name
pub const MANIFEST_FILE: &str = "manifest.json";

/// Stack document file name
pub const STACK_FILE: &str = "cdk.tf.json";

/// Directory holding stack subdirectories
pub const STACKS_DIR: &str = "stacks";

/// Manifest entry for one stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Stack id
    pub name: String,
    /// Document path relative to the assembly root
    pub synthesized_stack_path: String,
    /// Directory the provisioning engine runs in, relative to the root
    pub working_directory: String,
    /// Hex SHA-256 of the document bytes
    pub sha256: String,
}

/// Assembly manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Synthesizer version
    pub version: String,
    /// Entries for successful stacks, in app order
    pub stacks: IndexMap<String, ManifestEntry>,
}

/// Writes synthesized stacks to disk
#[derive(Debug, Clone)]
pub struct AssemblyWriter {
    root: PathBuf,
    pretty: bool,
}

impl AssemblyWriter {
    /// Writer rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pretty: true,
        }
    }

    /// With pretty or compact JSON
    #[inline]
    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Assembly root
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write every successful stack and the manifest
    ///
    /// Failed stacks write nothing and are left out of the manifest; a
    /// document left over from an earlier run of a failed stack is removed.
    ///
    /// # Errors
    /// Returns error if a directory or file cannot be written or removed
    pub fn write(&self, synthesis: &Synthesis) -> Result<Manifest, OutputError> {
        let mut stacks = IndexMap::new();
        for (id, result) in synthesis.iter() {
            match result {
                Ok(artifact) => {
                    let entry = self.write_stack(artifact)?;
                    stacks.insert(id.to_string(), entry);
                }
                Err(_) => self.remove_stack(id)?,
            }
        }

        let manifest = Manifest {
            version: crate::VERSION.to_string(),
            stacks,
        };
        let text = serde_json::to_string_pretty(&manifest)?;
        write_atomic(&self.root, &self.root.join(MANIFEST_FILE), text.as_bytes())?;

        tracing::info!(
            "Wrote {} stack(s) to {}",
            manifest.stacks.len(),
            self.root.display()
        );
        Ok(manifest)
    }

    fn write_stack(&self, artifact: &StackArtifact) -> Result<ManifestEntry, OutputError> {
        let working_directory = format!("{STACKS_DIR}/{}", artifact.name());
        let synthesized_stack_path = format!("{working_directory}/{STACK_FILE}");
        let dir = self.root.join(STACKS_DIR).join(artifact.name());

        let text = artifact.document().to_json(self.pretty)?;
        write_atomic(&dir, &dir.join(STACK_FILE), text.as_bytes())?;
        tracing::debug!("Wrote {}", synthesized_stack_path);

        Ok(ManifestEntry {
            name: artifact.name().to_string(),
            synthesized_stack_path,
            working_directory,
            sha256: digest(text.as_bytes()),
        })
    }

    fn remove_stack(&self, id: &str) -> Result<(), OutputError> {
        let dir = self.root.join(STACKS_DIR).join(id);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::debug!("Removed stale output for failed stack '{}'", id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(OutputError::Io { path: dir, source }),
        }
    }
}

/// Hex SHA-256 of `bytes`
#[must_use]
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), OutputError> {
    let io = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(io)?;
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(io)?;
    file.write_all(bytes).map_err(io)?;
    file.as_file().sync_all().map_err(io)?;
    file.persist(path).map_err(|e| io(e.error))?;
    Ok(())
}
