//! Synthesis configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Environment variable overriding [`SynthConfig::output_dir`]
pub const OUTDIR_ENV: &str = "TFSYNTH_OUTDIR";

/// Default assembly directory
pub const DEFAULT_OUTPUT_DIR: &str = "cdktf.out";

/// State backend written into each document's `terraform` block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// `local` backend storing `terraform.<stack>.tfstate`
    #[default]
    Local,
    /// No backend block
    #[serde(rename = "none")]
    Disabled,
}

impl Backend {
    /// Name used in document metadata
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Disabled => "none",
        }
    }
}

/// Synthesis configuration
///
/// Loaded from TOML; every key is optional.
///
/// ```toml
/// output_dir = "cdktf.out"
/// parallel = true
/// pretty = true
/// emit_metadata = true
/// backend = "local"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynthConfig {
    /// Assembly directory
    pub output_dir: PathBuf,
    /// Synthesize stacks on the rayon pool
    pub parallel: bool,
    /// Pretty-print documents
    pub pretty: bool,
    /// Emit the `//` metadata block
    pub emit_metadata: bool,
    /// State backend
    pub backend: Backend,
}

impl SynthConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With output directory
    #[inline]
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// With parallel stack synthesis
    #[inline]
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// With pretty or compact JSON
    #[inline]
    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// With or without the metadata block
    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, emit: bool) -> Self {
        self.emit_metadata = emit;
        self
    }

    /// With state backend
    #[inline]
    #[must_use]
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Apply `TFSYNTH_OUTDIR` if set and non-empty
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        match std::env::var(OUTDIR_ENV) {
            Ok(dir) if !dir.is_empty() => self.with_output_dir(dir),
            _ => self,
        }
    }

    /// Parse from TOML
    ///
    /// # Errors
    /// Returns error on invalid TOML or unknown keys
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            parallel: false,
            pretty: true,
            emit_metadata: true,
            backend: Backend::Local,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SynthConfig::default();
        assert_eq!(config.output_dir, PathBuf::from("cdktf.out"));
        assert!(!config.parallel);
        assert!(config.pretty);
        assert!(config.emit_metadata);
        assert_eq!(config.backend, Backend::Local);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SynthConfig::from_toml_str("parallel = true\nbackend = \"none\"\n").unwrap();
        assert!(config.parallel);
        assert_eq!(config.backend, Backend::Disabled);
        assert!(config.pretty);
        assert_eq!(config.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            SynthConfig::from_toml_str("paralel = true"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_builder() {
        let config = SynthConfig::new()
            .with_output_dir("out")
            .with_pretty(false)
            .with_metadata(false)
            .with_backend(Backend::Disabled);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert!(!config.pretty);
        assert!(!config.emit_metadata);
        assert_eq!(config.backend.label(), "none");
    }
}
