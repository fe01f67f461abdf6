//! Triangle meshes, vertex merging and connected components

use hashbrown::HashMap;

use crate::material::Material;

/// Name given to geometry that was not declared inside an object
pub const DEFAULT_MESH_NAME: &str = "geometry";

/// One triangle corner: indices into the mesh's attribute lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Corner {
    pub position: usize,
    pub tex_coord: Option<usize>,
    pub normal: Option<usize>,
}

impl Corner {
    pub fn new(position: usize) -> Self {
        Self {
            position,
            tex_coord: None,
            normal: None,
        }
    }
}

pub type Triangle = [Corner; 3];

/// Named triangle mesh with an optional material
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub positions: Vec<[f64; 3]>,
    pub tex_coords: Vec<[f64; 2]>,
    pub normals: Vec<[f64; 3]>,
    pub faces: Vec<Triangle>,
    pub material: Option<Material>,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Merge positions that are equal once rounded to `digits` decimal places.
    ///
    /// The first position of each group survives with its original
    /// coordinates, faces are rewritten to reference it and the position list
    /// is compacted. Faces are never removed, even when merging collapses a
    /// triangle. Returns the number of positions removed.
    pub fn merge_vertices(&mut self, digits: u32) -> usize {
        let scale = 10f64.powi(digits as i32);
        let before = self.positions.len();

        let mut lookup: HashMap<[i64; 3], usize> = HashMap::with_capacity(before);
        let mut merged: Vec<[f64; 3]> = Vec::with_capacity(before);
        let mut remap = Vec::with_capacity(before);

        for position in &self.positions {
            let key = quantize(position, scale);
            let index = *lookup.entry(key).or_insert_with(|| {
                merged.push(*position);
                merged.len() - 1
            });
            remap.push(index);
        }

        for face in &mut self.faces {
            for corner in face.iter_mut() {
                corner.position = remap[corner.position];
            }
        }

        self.positions = merged;
        before - self.positions.len()
    }

    /// Split into connected components.
    ///
    /// Faces are connected when they share a position index. Components are
    /// ordered by their first face and named `<name>_<index>`; each one
    /// carries a copy of the material.
    pub fn split_components(&self) -> Vec<Mesh> {
        let mut sets = DisjointSet::new(self.positions.len());
        for face in &self.faces {
            sets.union(face[0].position, face[1].position);
            sets.union(face[0].position, face[2].position);
        }

        let mut component_of_root: HashMap<usize, usize> = HashMap::new();
        let mut builders: Vec<MeshBuilder<'_>> = Vec::new();

        for face in &self.faces {
            let root = sets.find(face[0].position);
            let component = *component_of_root.entry(root).or_insert_with(|| {
                let name = format!("{}_{}", self.name, builders.len());
                builders.push(MeshBuilder::new(
                    name,
                    &self.positions,
                    &self.tex_coords,
                    &self.normals,
                ));
                builders.len() - 1
            });
            builders[component].push_face(face);
        }

        builders
            .into_iter()
            .map(|builder| {
                let mut mesh = builder.finish();
                mesh.material = self.material.clone();
                mesh
            })
            .collect()
    }
}

/// Merge key for a position. Coordinates are finite (the loader rejects the
/// rest); beyond `i64::MAX / scale` the cast saturates and such vertices share
/// a key.
fn quantize(position: &[f64; 3], scale: f64) -> [i64; 3] {
    position.map(|c| (c * scale).round() as i64)
}

/// Builds a compact mesh from faces that index into larger source lists
pub(crate) struct MeshBuilder<'a> {
    positions: &'a [[f64; 3]],
    tex_coords: &'a [[f64; 2]],
    normals: &'a [[f64; 3]],
    position_map: HashMap<usize, usize>,
    tex_coord_map: HashMap<usize, usize>,
    normal_map: HashMap<usize, usize>,
    mesh: Mesh,
}

impl<'a> MeshBuilder<'a> {
    pub(crate) fn new(
        name: impl Into<String>,
        positions: &'a [[f64; 3]],
        tex_coords: &'a [[f64; 2]],
        normals: &'a [[f64; 3]],
    ) -> Self {
        Self {
            positions,
            tex_coords,
            normals,
            position_map: HashMap::new(),
            tex_coord_map: HashMap::new(),
            normal_map: HashMap::new(),
            mesh: Mesh::new(name),
        }
    }

    /// Add a face whose indices refer to the source lists.
    ///
    /// Callers guarantee the indices are in range.
    pub(crate) fn push_face(&mut self, face: &Triangle) {
        let face = face.map(|corner| Corner {
            position: local_index(
                &mut self.position_map,
                &mut self.mesh.positions,
                self.positions,
                corner.position,
            ),
            tex_coord: corner.tex_coord.map(|i| {
                local_index(
                    &mut self.tex_coord_map,
                    &mut self.mesh.tex_coords,
                    self.tex_coords,
                    i,
                )
            }),
            normal: corner.normal.map(|i| {
                local_index(
                    &mut self.normal_map,
                    &mut self.mesh.normals,
                    self.normals,
                    i,
                )
            }),
        });
        self.mesh.faces.push(face);
    }

    pub(crate) fn finish(self) -> Mesh {
        self.mesh
    }
}

fn local_index<T: Copy>(
    map: &mut HashMap<usize, usize>,
    local: &mut Vec<T>,
    source: &[T],
    index: usize,
) -> usize {
    *map.entry(index).or_insert_with(|| {
        local.push(source[index]);
        local.len() - 1
    })
}

/// Union-find over position indices
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(a: usize, b: usize, c: usize) -> Triangle {
        [Corner::new(a), Corner::new(b), Corner::new(c)]
    }

    /// Two triangles sharing an edge, stored with duplicated corner positions
    fn split_quad() -> Mesh {
        let mut mesh = Mesh::new("quad");
        mesh.positions = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        mesh.faces = vec![triangle(0, 1, 2), triangle(3, 4, 5)];
        mesh
    }

    #[test]
    fn test_merge_vertices_shares_corners() {
        let mut mesh = split_quad();
        let removed = mesh.merge_vertices(5);

        assert_eq!(removed, 2);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.faces[1][0].position, 0);
        assert_eq!(mesh.faces[1][1].position, 2);
        assert_eq!(mesh.faces[1][2].position, 3);
    }

    #[test]
    fn test_merge_precision_sixth_decimal() {
        let positions = vec![[0.123451, 0.5, 0.5], [0.123454, 0.5, 0.5], [0.0, 1.0, 0.0]];

        let mut coarse = Mesh::new("m");
        coarse.positions = positions.clone();
        coarse.faces = vec![triangle(0, 1, 2)];
        coarse.merge_vertices(5);
        assert_eq!(coarse.vertex_count(), 2);

        let mut fine = Mesh::new("m");
        fine.positions = positions;
        fine.faces = vec![triangle(0, 1, 2)];
        fine.merge_vertices(6);
        assert_eq!(fine.vertex_count(), 3);
    }

    #[test]
    fn test_merge_keeps_degenerate_faces() {
        let mut mesh = Mesh::new("sliver");
        mesh.positions = vec![[0.0; 3], [0.000001, 0.0, 0.0], [1.0, 0.0, 0.0]];
        mesh.faces = vec![triangle(0, 1, 2)];

        mesh.merge_vertices(4);

        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.faces[0][0].position, mesh.faces[0][1].position);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut once = split_quad();
        once.merge_vertices(5);
        let mut twice = once.clone();
        assert_eq!(twice.merge_vertices(5), 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_split_components() {
        let mut mesh = split_quad();
        mesh.positions.extend([[5.0, 5.0, 5.0], [6.0, 5.0, 5.0], [5.0, 6.0, 5.0]]);
        mesh.faces.push(triangle(6, 7, 8));
        mesh.material = Some(Material::new("shared"));

        // Unmerged, the quad halves share no index
        assert_eq!(mesh.split_components().len(), 3);

        mesh.merge_vertices(5);
        let components = mesh.split_components();
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].name, "quad_0");
        assert_eq!(components[0].face_count(), 2);
        assert_eq!(components[0].vertex_count(), 4);
        assert_eq!(components[1].face_count(), 1);
        assert_eq!(components[1].positions[0], [5.0, 5.0, 5.0]);
        assert_eq!(
            components[1].material.as_ref().map(|m| m.name.as_str()),
            Some("shared")
        );
    }
}
