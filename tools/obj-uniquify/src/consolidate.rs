//! Mesh consolidator (rewritten OBJ -> merged vertices, one tagged material per mesh)

use anyhow::{Context, Result};
use mesh_common::{ExportSummary, Mesh, Scene, export_obj, load_obj_str};
use rayon::prelude::*;
use std::path::Path;
use xxhash_rust::xxh3::xxh3_64;

use crate::config::{Mode, PipelineConfig};

/// Per-mesh result of consolidation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshReport {
    pub name: String,
    pub vertices_before: usize,
    pub vertices_after: usize,
    pub faces: usize,
    pub uniqueness_tag: u64,
    /// Face count of each connected component (inspect mode only)
    pub component_faces: Option<Vec<usize>>,
}

/// Result of [`consolidate`]
#[derive(Debug, Clone)]
pub struct ConsolidateReport {
    pub meshes: Vec<MeshReport>,
    pub export: ExportSummary,
}

/// Material uniqueness tag for a mesh name (XXH3-64 of the UTF-8 bytes)
pub fn uniqueness_tag(name: &str) -> u64 {
    xxh3_64(name.as_bytes())
}

/// Merge a copy of `mesh` and give it its own material named after the mesh
pub fn consolidate_mesh(mesh: &Mesh, precision: u32, inspect: bool) -> (Mesh, MeshReport) {
    let mut merged = mesh.clone();
    merged.merge_vertices(precision);

    let tag = uniqueness_tag(&merged.name);
    let mut material = merged.material.take().unwrap_or_default();
    material.name = merged.name.clone();
    material.uniqueness_tag = Some(tag);
    merged.material = Some(material);

    let component_faces = inspect.then(|| {
        merged
            .split_components()
            .iter()
            .map(Mesh::face_count)
            .collect()
    });

    let report = MeshReport {
        name: merged.name.clone(),
        vertices_before: mesh.vertex_count(),
        vertices_after: merged.vertex_count(),
        faces: merged.face_count(),
        uniqueness_tag: tag,
        component_faces,
    };

    (merged, report)
}

/// Load rewritten scene lines, consolidate every mesh and export to `output`.
///
/// `base_dir` is where the rewritten material library lives.
pub fn consolidate(
    lines: &[String],
    base_dir: Option<&Path>,
    output: &Path,
    config: &PipelineConfig,
) -> Result<ConsolidateReport> {
    let text = lines.concat();
    let scene: Scene = load_obj_str(&text, base_dir)
        .context("Failed to load rewritten scene")?
        .into();

    let precision = config.precision();
    let inspect = config.mode == Mode::Inspect;
    tracing::info!(
        "Consolidating {} meshes (precision {} digits)",
        scene.len(),
        precision
    );

    // Order-preserving in both cases
    let processed: Vec<(Mesh, MeshReport)> = if config.parallel {
        scene
            .meshes()
            .par_iter()
            .map(|mesh| consolidate_mesh(mesh, precision, inspect))
            .collect()
    } else {
        scene
            .meshes()
            .iter()
            .map(|mesh| consolidate_mesh(mesh, precision, inspect))
            .collect()
    };

    let mut consolidated = Scene::new();
    let mut reports = Vec::with_capacity(processed.len());
    for (mesh, report) in processed {
        log_report(&report);
        consolidated.add_mesh(mesh);
        reports.push(report);
    }

    let export = export_obj(&consolidated, output, Some(""))
        .with_context(|| format!("Failed to export {:?}", output))?;

    Ok(ConsolidateReport {
        meshes: reports,
        export,
    })
}

fn log_report(report: &MeshReport) {
    tracing::info!(
        "name: {}, faces: {}, vertices: {} -> {}",
        report.name,
        report.faces,
        report.vertices_before,
        report.vertices_after
    );

    if let Some(components) = &report.component_faces {
        for (i, faces) in components.iter().enumerate() {
            tracing::info!("name: {}, Component {}: {} faces", report.name, i, faces);
        }
    }
}
