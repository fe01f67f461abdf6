//! OBJ + MTL export
//!
//! Materials that are equivalent (same attributes and uniqueness tag) are
//! written once and shared, so callers that need one block per mesh must give
//! each material a distinct tag.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use hashbrown::{HashMap, HashSet};
use tempfile::NamedTempFile;

use crate::error::{MeshError, Result};
use crate::material::{Material, MaterialAttribute, write_mtl};
use crate::mesh::{Corner, Mesh};
use crate::scene::Scene;

/// Header written when the caller does not override it
pub const DEFAULT_HEADER: &str = "Exported by mesh-common";

/// Files written by [`export_obj`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub obj_path: PathBuf,
    pub mtl_path: Option<PathBuf>,
    pub mesh_count: usize,
    pub material_count: usize,
}

/// Material blocks for a scene, after merging equivalent materials
struct MaterialTable<'a> {
    blocks: Vec<(String, &'a Material)>,
    /// Block index per mesh, `None` for meshes without a material
    assignment: Vec<Option<usize>>,
}

/// Equivalence key: materials with equal attributes and tag share a block
type MaterialKey<'a> = (&'a [MaterialAttribute], Option<u64>);

impl<'a> MaterialTable<'a> {
    fn build(scene: &'a Scene) -> Self {
        let mut blocks: Vec<(String, &'a Material)> = Vec::new();
        let mut assignment = Vec::with_capacity(scene.len());
        let mut by_key: HashMap<MaterialKey<'a>, usize> = HashMap::new();
        let mut taken: HashSet<String> = HashSet::new();

        for mesh in scene.meshes() {
            let Some(material) = &mesh.material else {
                assignment.push(None);
                continue;
            };

            let index = *by_key
                .entry(material.equivalence_key()).or_insert_with(|| {
                let name = unique_block_name(&material.name, &mut taken);
                blocks.push((name, material));
                blocks.len() - 1
            });
            assignment.push(Some(index));
        }

        Self { blocks, assignment }
    }

    fn block_name(&self, mesh_index: usize) -> Option<&str> {
        self.assignment[mesh_index].map(|b| self.blocks[b].0.as_str())
    }
}

/// Pick `base`, or the first free `base_n`, and mark it taken
fn unique_block_name(base: &str, taken: &mut HashSet<String>) -> String {
    let name = if taken.contains(base) {
        (1..)
            .map(|n| format!("{}_{}", base, n))
            .find(|name| !taken.contains(name.as_str()))
            .unwrap_or_else(|| base.to_string())
    } else {
        base.to_string()
    };
    taken.insert(name.clone());
    name
}

/// Export a scene to `path` with its materials in `<path stem>.mtl`.
///
/// `header` overrides the leading comment; `Some("")` writes no header.
/// Both files are written to temporary files first and only moved into place
/// once complete.
pub fn export_obj(scene: &Scene, path: &Path, header: Option<&str>) -> Result<ExportSummary> {
    let table = MaterialTable::build(scene);

    let mtl_path = (!table.blocks.is_empty()).then(|| path.with_extension("mtl"));
    let mtl_name = mtl_path
        .as_ref()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned());

    if let Some(mtl_path) = &mtl_path {
        let blocks: Vec<(&str, &Material)> =
            table.blocks.iter().map(|(n, m)| (n.as_str(), *m)).collect();
        write_atomic(mtl_path, |w| write_mtl(w, &blocks))?;
    }

    write_atomic(path, |w| {
        write_obj_with_table(w, scene, &table, mtl_name.as_deref(), header)
    })?;

    tracing::info!(
        "Exported {} meshes, {} materials to {:?}",
        scene.len(),
        table.blocks.len(),
        path
    );

    Ok(ExportSummary {
        obj_path: path.to_path_buf(),
        mtl_path,
        mesh_count: scene.len(),
        material_count: table.blocks.len(),
    })
}

/// Write the OBJ part of a scene, referencing `mtl_name` if given
pub fn write_obj<W: Write>(
    w: &mut W,
    scene: &Scene,
    mtl_name: Option<&str>,
    header: Option<&str>,
) -> io::Result<()> {
    let table = MaterialTable::build(scene);
    write_obj_with_table(w, scene, &table, mtl_name, header)
}

fn write_obj_with_table<W: Write>(
    w: &mut W,
    scene: &Scene,
    table: &MaterialTable<'_>,
    mtl_name: Option<&str>,
    header: Option<&str>,
) -> io::Result<()> {
    for line in header.unwrap_or(DEFAULT_HEADER).lines() {
        writeln!(w, "# {}", line)?;
    }

    if let Some(mtl_name) = mtl_name {
        writeln!(w, "mtllib {}", mtl_name)?;
    }

    // OBJ indices are 1-based and global across objects
    let mut offsets = (1, 1, 1);

    for (i, mesh) in scene.meshes().iter().enumerate() {
        writeln!(w, "o {}", mesh.name)?;
        write_mesh_data(w, mesh)?;

        if let Some(name) = table.block_name(i) {
            writeln!(w, "usemtl {}", name)?;
        }

        for face in &mesh.faces {
            write!(w, "f")?;
            for corner in face {
                write!(w, " ")?;
                write_corner(w, corner, offsets)?;
            }
            writeln!(w)?;
        }

        offsets.0 += mesh.positions.len();
        offsets.1 += mesh.tex_coords.len();
        offsets.2 += mesh.normals.len();
    }

    Ok(())
}

fn write_mesh_data<W: Write>(w: &mut W, mesh: &Mesh) -> io::Result<()> {
    for [x, y, z] in &mesh.positions {
        writeln!(w, "v {} {} {}", x, y, z)?;
    }
    for [u, v] in &mesh.tex_coords {
        writeln!(w, "vt {} {}", u, v)?;
    }
    for [x, y, z] in &mesh.normals {
        writeln!(w, "vn {} {} {}", x, y, z)?;
    }
    Ok(())
}

fn write_corner<W: Write>(
    w: &mut W,
    corner: &Corner,
    (vo, to, no): (usize, usize, usize),
) -> io::Result<()> {
    let v = corner.position + vo;
    match (corner.tex_coord, corner.normal) {
        (None, None) => write!(w, "{}", v),
        (Some(t), None) => write!(w, "{}/{}", v, t + to),
        (None, Some(n)) => write!(w, "{}//{}", v, n + no),
        (Some(t), Some(n)) => write!(w, "{}/{}/{}", v, t + to, n + no),
    }
}

/// Write through a temp file in the destination directory, then persist it
fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut fs::File>) -> io::Result<()>,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| MeshError::io(path, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer).map_err(|e| MeshError::io(path, e))?;
        writer.flush().map_err(|e| MeshError::io(path, e))?;
    }
    tmp.persist(path).map_err(|e| MeshError::io(path, e.error))?;
    Ok(())
}
