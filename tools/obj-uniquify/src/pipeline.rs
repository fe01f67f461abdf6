//! Full pipeline: rewrite, then consolidate

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::consolidate::{ConsolidateReport, consolidate};
use crate::rewrite::{RewriteOutput, parent_dir, rewrite_scene};

/// File name of the rewritten scene inside the temporary work directory
pub const INTERMEDIATE_FILE_NAME: &str = "temp.obj";

/// Results of both stages
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub rewrite: RewriteOutput,
    pub consolidate: ConsolidateReport,
}

/// Run the pipeline from `input` to `output`.
///
/// The rewritten scene goes to `config.intermediate_path` when set; otherwise
/// to a temporary directory that is removed when the run ends.
pub fn run(input: &Path, output: &Path, config: &PipelineConfig) -> Result<PipelineReport> {
    config.validate()?;

    let (intermediate, _work_dir) = match &config.intermediate_path {
        Some(path) => (path.clone(), None),
        None => {
            let dir = tempfile::tempdir().context("Failed to create temporary work directory")?;
            let path: PathBuf = dir.path().join(INTERMEDIATE_FILE_NAME);
            (path, Some(dir))
        }
    };

    tracing::info!("Rewriting {:?} -> {:?}", input, intermediate);
    let rewrite = rewrite_scene(input, &intermediate, config.naming)?;
    if !rewrite.missing_materials.is_empty() {
        tracing::warn!(
            "{} referenced materials missing from the library: {}",
            rewrite.missing_materials.len(),
            rewrite.missing_materials.join(", ")
        );
    }

    tracing::info!("Consolidating -> {:?}", output);
    let consolidated = consolidate(
        &rewrite.scene.lines,
        Some(parent_dir(&intermediate)),
        output,
        config,
    )?;

    Ok(PipelineReport {
        rewrite,
        consolidate: consolidated,
    })
}
