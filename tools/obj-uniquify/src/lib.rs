//! obj-uniquify library
//!
//! Two-stage pipeline for OBJ scenes whose objects share materials:
//! - [`rewrite`] - text-level pass giving every object its own material block
//! - [`consolidate`] - geometry pass merging duplicate vertices and tagging materials
//!
//! [`pipeline::run`] chains both stages as the CLI does.

pub mod config;
pub mod consolidate;
pub mod pipeline;
pub mod rewrite;

pub use config::{Mode, NamingStrategy, PipelineConfig};
pub use consolidate::{ConsolidateReport, MeshReport, consolidate, uniqueness_tag};
pub use pipeline::{PipelineReport, run};
pub use rewrite::{
    MaterialLibrary, MaterialUsage, RewriteError, RewriteOutput, RewrittenScene, rewrite_scene,
    rewrite_scene_text,
};
