//! Pipeline configuration (TOML)
//!
//! ```toml
//! vertex_merge_precision = 5
//! intermediate_path = "temp.obj"
//! naming = "per-object"
//! mode = "simplify"
//! parallel = false
//! ```
//!
//! Every field is optional; command line flags override file values.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Largest supported rounding precision (decimal digits).
///
/// Merge keys are `i64`, so at 12 digits coordinates must stay below about
/// 9.2e6 in magnitude to keep distinct keys (9.2e13 at the default 5).
pub const MAX_PRECISION: u32 = 12;

/// How a `usemtl` directive is renamed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum NamingStrategy {
    /// Use the owning object's name (one material per object)
    #[default]
    PerObject,
    /// Number each usage of an original material: `<material>_<n>`
    PerMaterial,
}

/// What the geometry pass is run for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Merge vertices and export
    #[default]
    Simplify,
    /// Same as simplify, also logs connected components per mesh
    Inspect,
}

impl Mode {
    pub fn default_precision(self) -> u32 {
        match self {
            Mode::Simplify => 5,
            Mode::Inspect => 4,
        }
    }
}

/// Pipeline settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Decimal digits used when rounding coordinates for vertex merging.
    /// Default: 5 (4 in inspect mode)
    pub vertex_merge_precision: Option<u32>,

    /// Where the rewritten scene (and its MTL) is written before geometry loading.
    /// Default: a private temporary directory, removed after the run
    pub intermediate_path: Option<PathBuf>,

    pub naming: NamingStrategy,

    pub mode: Mode,

    /// Process meshes on the rayon thread pool
    pub parallel: bool,
}

impl PipelineConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Parse configuration from string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse pipeline config")?;
        config.validate()?;
        Ok(config)
    }

    /// Effective merge precision
    pub fn precision(&self) -> u32 {
        self.vertex_merge_precision
            .unwrap_or_else(|| self.mode.default_precision())
    }

    pub fn validate(&self) -> Result<()> {
        let precision = self.precision();
        if precision > MAX_PRECISION {
            bail!(
                "vertex_merge_precision {} exceeds maximum {}",
                precision,
                MAX_PRECISION
            );
        }
        Ok(())
    }
}
