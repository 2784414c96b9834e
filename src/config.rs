//! Generator configuration
//!
//! Round-level settings: where host-managed output goes, the emitted file
//! extension, and the resolver pass caps. Loadable from a TOML file so build
//! integrations can tune the generator without recompiling.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading or parsing configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Settings for one generator round
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Root directory for host-managed output (used when a prototype has no
    /// explicit path configured)
    pub output_root: PathBuf,
    /// Extension for emitted source files
    pub extension: String,
    /// Name of the round-completion marker file under the output root
    pub marker_file: String,
    /// Number of stalled passes the resolver tolerates before it starts
    /// force-resolving blocked templates
    pub provisional_passes: u32,
    /// Number of consecutive no-progress passes after which resolution gives
    /// up and reports the remainder as warnings
    pub stall_passes: u32,
}

/// TOML structure for deserializing configuration
#[derive(Deserialize)]
struct TomlConfig {
    output: Option<TomlOutput>,
    resolver: Option<TomlResolver>,
}

#[derive(Deserialize)]
struct TomlOutput {
    root: Option<PathBuf>,
    extension: Option<String>,
    marker_file: Option<String>,
}

#[derive(Deserialize)]
struct TomlResolver {
    provisional_passes: Option<u32>,
    stall_passes: Option<u32>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("generated"),
            extension: "pf".to_string(),
            marker_file: "codegen.info".to_string(),
            provisional_passes: 2,
            stall_passes: 3,
        }
    }
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string; missing keys keep defaults
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let parsed: TomlConfig = toml::from_str(content)?;
        let mut config = Self::default();

        if let Some(output) = parsed.output {
            if let Some(root) = output.root {
                config.output_root = root;
            }
            if let Some(extension) = output.extension {
                config.extension = extension;
            }
            if let Some(marker) = output.marker_file {
                config.marker_file = marker;
            }
        }
        if let Some(resolver) = parsed.resolver {
            if let Some(passes) = resolver.provisional_passes {
                config.provisional_passes = passes;
            }
            if let Some(passes) = resolver.stall_passes {
                config.stall_passes = passes;
            }
        }

        Ok(config)
    }

    /// Set the host-managed output root
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    /// Set the emitted file extension
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Set the resolver pass caps
    pub fn with_resolver_caps(mut self, provisional: u32, stall: u32) -> Self {
        self.provisional_passes = provisional;
        self.stall_passes = stall;
        self
    }

    /// Path of the round-completion marker
    pub fn marker_path(&self) -> PathBuf {
        self.output_root.join(&self.marker_file)
    }
}
