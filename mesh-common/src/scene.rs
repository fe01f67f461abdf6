//! Ordered collection of named meshes

use hashbrown::HashMap;

use crate::mesh::Mesh;

/// Scene graph: meshes keyed by name, kept in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    meshes: Vec<Mesh>,
    /// Mesh name -> index into `meshes`
    index: HashMap<String, usize>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mesh under its own name, replacing any mesh with the same name
    pub fn add_mesh(&mut self, mesh: Mesh) {
        match self.index.get(&mesh.name) {
            Some(&i) => self.meshes[i] = mesh,
            None => {
                self.index.insert(mesh.name.clone(), self.meshes.len());
                self.meshes.push(mesh);
            }
        }
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn get(&self, name: &str) -> Option<&Mesh> {
        self.index.get(name).map(|&i| &self.meshes[i])
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

}

impl From<Mesh> for Scene {
    fn from(mesh: Mesh) -> Self {
        let mut scene = Scene::new();
        scene.add_mesh(mesh);
        scene
    }
}

impl FromIterator<Mesh> for Scene {
    fn from_iter<I: IntoIterator<Item = Mesh>>(iter: I) -> Self {
        let mut scene = Scene::new();
        for mesh in iter {
            scene.add_mesh(mesh);
        }
        scene
    }
}
