//! OBJ scene loading
//!
//! Supports `v`, `vt`, `vn`, `f` (triangulated as a fan), `o`, `usemtl` and
//! `mtllib`. Other directives (`g`, `s`, `l`, ...) are ignored. A mesh is
//! produced for every run of faces sharing an object and a material.

use hashbrown::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::error::{MeshError, Result};
use crate::material::{Material, parse_mtl};
use crate::mesh::{Corner, DEFAULT_MESH_NAME, Mesh, MeshBuilder, Triangle};
use crate::scene::Scene;

/// Result of loading OBJ text
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    /// No object was declared and all faces share one material
    Single(Mesh),
    /// Named meshes
    Scene(Scene),
}

impl Loaded {
    /// Wrap a single mesh into a one-entry scene if needed
    pub fn into_scene(self) -> Scene {
        match self {
            Loaded::Single(mesh) => Scene::from(mesh),
            Loaded::Scene(scene) => scene,
        }
    }
}

impl From<Loaded> for Scene {
    fn from(loaded: Loaded) -> Self {
        loaded.into_scene()
    }
}

/// Faces collected for one (object, material) run
struct Segment {
    object: Option<String>,
    material: Option<String>,
    faces: Vec<Triangle>,
}

/// Load an OBJ file; material libraries resolve relative to its directory
pub fn load_obj_file(path: &Path) -> Result<Loaded> {
    let text = fs::read_to_string(path).map_err(|e| MeshError::io(path, e))?;
    load_obj_str(&text, path.parent())
}

/// Load OBJ text.
///
/// `mtllib` files are read from `base_dir`. A library that cannot be read, or
/// a material missing from it, is logged and replaced by an empty material of
/// the requested name.
pub fn load_obj_str(text: &str, base_dir: Option<&Path>) -> Result<Loaded> {
    let mut positions: Vec<[f64; 3]> = Vec::new();
    let mut tex_coords: Vec<[f64; 2]> = Vec::new();
    let mut normals: Vec<[f64; 3]> = Vec::new();

    let mut segments: Vec<Segment> = Vec::new();
    let mut libraries: Vec<String> = Vec::new();
    let mut object: Option<String> = None;
    let mut material: Option<String> = None;
    let mut saw_object = false;

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (line, ""),
        };

        match keyword {
            "v" => positions.push(parse_floats(rest, line_no, "v")?),
            "vn" => normals.push(parse_floats(rest, line_no, "vn")?),
            "vt" => {
                let mut values = rest.split_whitespace();
                let u = parse_float(values.next(), line_no, "vt")?;
                let v = match values.next() {
                    Some(token) => parse_float(Some(token), line_no, "vt")?,
                    None => 0.0,
                };
                tex_coords.push([u, v]);
            }
            "f" => {
                let counts = (positions.len(), tex_coords.len(), normals.len());
                let corners = rest
                    .split_whitespace()
                    .map(|token| parse_corner(token, counts, line_no))
                    .collect::<Result<Vec<_>>>()?;

                if corners.len() < 3 {
                    return Err(MeshError::parse(
                        line_no,
                        format!("face needs at least 3 vertices, got {}", corners.len()),
                    ));
                }

                let segment = current_segment(&mut segments, &object, &material);
                // Fan triangulation (convex polygons)
                for i in 1..corners.len() - 1 {
                    segment.faces.push([corners[0], corners[i], corners[i + 1]]);
                }
            }
            "o" => {
                object = (!rest.is_empty()).then(|| rest.to_string());
                saw_object |= object.is_some();
            }
            "usemtl" => material = (!rest.is_empty()).then(|| rest.to_string()),
            "mtllib" => libraries.push(rest.to_string()),
            _ => {}
        }
    }

    let library = load_libraries(&libraries, base_dir);

    let mut used_names: HashSet<String> = HashSet::new();
    let mut meshes = Vec::with_capacity(segments.len());
    for segment in segments {
        let base = segment.object.as_deref().unwrap_or(DEFAULT_MESH_NAME);
        let name = unique_name(base, &mut used_names);

        let mut builder = MeshBuilder::new(name, &positions, &tex_coords, &normals);
        for face in &segment.faces {
            builder.push_face(face);
        }
        let mut mesh = builder.finish();
        mesh.material = segment
            .material
            .map(|name| resolve_material(&library, name));
        meshes.push(mesh);
    }

    tracing::debug!(
        "Loaded OBJ: {} meshes, {} positions, {} faces",
        meshes.len(),
        positions.len(),
        meshes.iter().map(Mesh::face_count).sum::<usize>()
    );

    if !saw_object && meshes.len() == 1 {
        if let Some(mesh) = meshes.pop() {
            return Ok(Loaded::Single(mesh));
        }
    }

    Ok(Loaded::Scene(meshes.into_iter().collect()))
}

fn current_segment<'a>(
    segments: &'a mut Vec<Segment>,
    object: &Option<String>,
    material: &Option<String>,
) -> &'a mut Segment {
    let reuse = segments
        .last()
        .is_some_and(|s| s.object == *object && s.material == *material);

    if !reuse {
        segments.push(Segment {
            object: object.clone(),
            material: material.clone(),
            faces: Vec::new(),
        });
    }

    let last = segments.len() - 1;
    &mut segments[last]
}

fn unique_name(base: &str, used: &mut HashSet<String>) -> String {
    let mut name = base.to_string();
    let mut n = 1;
    while used.contains(&name) {
        name = format!("{}_{}", base, n);
        n += 1;
    }
    used.insert(name.clone());
    name
}

fn load_libraries(names: &[String], base_dir: Option<&Path>) -> HashMap<String, Material> {
    let mut library = HashMap::new();

    for name in names {
        let Some(dir) = base_dir else {
            tracing::warn!("Cannot resolve material library {} without a base directory", name);
            continue;
        };

        let path = dir.join(name);
        match fs::read_to_string(&path) {
            Ok(text) => {
                for material in parse_mtl(&text) {
                    library.insert(material.name.clone(), material);
                }
            }
            Err(e) => tracing::warn!("Failed to read material library {:?}: {}", path, e),
        }
    }

    library
}

fn resolve_material(library: &HashMap<String, Material>, name: String) -> Material {
    match library.get(&name) {
        Some(material) => material.clone(),
        None => {
            tracing::warn!("Material {} not found in any material library", name);
            Material::new(name)
        }
    }
}

fn parse_float(token: Option<&str>, line: usize, keyword: &str) -> Result<f64> {
    let token =
        token.ok_or_else(|| MeshError::parse(line, format!("`{}` is missing a value", keyword)))?;
    token
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| {
            MeshError::parse(line, format!("invalid number {:?} in `{}`", token, keyword))
        })
}

fn parse_floats(rest: &str, line: usize, keyword: &str) -> Result<[f64; 3]> {
    let mut values = rest.split_whitespace();
    let mut out = [0.0; 3];
    for value in &mut out {
        *value = parse_float(values.next(), line, keyword)?;
    }
    Ok(out)
}

/// Parse a face corner: "v", "v/vt", "v/vt/vn", or "v//vn"
fn parse_corner(token: &str, counts: (usize, usize, usize), line: usize) -> Result<Corner> {
    let mut parts = token.split('/');
    let (position_count, tex_coord_count, normal_count) = counts;

    let position = resolve_index(parts.next().unwrap_or(""), position_count, line, "vertex")?;

    let tex_coord = match parts.next().filter(|s| !s.is_empty()) {
        Some(raw) => Some(resolve_index(raw, tex_coord_count, line, "texture coordinate")?),
        None => None,
    };

    let normal = match parts.next().filter(|s| !s.is_empty()) {
        Some(raw) => Some(resolve_index(raw, normal_count, line, "normal")?),
        None => None,
    };

    Ok(Corner {
        position,
        tex_coord,
        normal,
    })
}

/// Resolve a 1-based (or negative, relative) OBJ index to a 0-based one
fn resolve_index(raw: &str, count: usize, line: usize, what: &str) -> Result<usize> {
    let index: i64 = raw
        .parse()
        .map_err(|_| MeshError::parse(line, format!("invalid {} index {:?}", what, raw)))?;

    let resolved = match index {
        i if i > 0 => Some(i as usize - 1),
        i if i < 0 => (count as i64).checked_add(i).filter(|r| *r >= 0).map(|r| r as usize),
        _ => None,
    };

    resolved.filter(|r| *r < count).ok_or_else(|| {
        MeshError::parse(
            line,
            format!("{} index {} out of range ({} defined)", what, index, count),
        )
    })
}
