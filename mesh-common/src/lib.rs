//! Triangle mesh scene model shared by the obj-uniquify pipeline
//!
//! This crate is the geometry side of the pipeline. The pipeline only relies on
//! four capabilities:
//! - [`load_obj_str`] - load a scene from OBJ text (materials resolved from a base directory)
//! - [`Scene::meshes`] - named meshes in declaration order
//! - [`Mesh::merge_vertices`] - merge positions equal at a decimal precision
//! - [`export_obj`] - write the scene as OBJ + MTL
//!
//! # Modules
//!
//! - [`mesh`] - triangle mesh, vertex merging and connected components
//! - [`material`] - material attributes and MTL parsing/writing
//! - [`scene`] - ordered collection of named meshes
//! - [`obj`] - OBJ loader
//! - [`export`] - OBJ/MTL exporter

pub mod error;
pub mod export;
pub mod material;
pub mod mesh;
pub mod obj;
pub mod scene;

pub use error::{MeshError, Result};
pub use export::{DEFAULT_HEADER, ExportSummary, export_obj, write_obj};
pub use material::{Material, MaterialAttribute, parse_mtl, write_mtl};
pub use mesh::{Corner, DEFAULT_MESH_NAME, Mesh, Triangle};
pub use obj::{Loaded, load_obj_file, load_obj_str};
pub use scene::Scene;
