//! Viewer data structures: colours, meshes, materials, textures, instances
//! and the scene graph.
//!
//! - `colour` holds linear RGB colours and the sRGB hex conversion
//! - `model` contains vertex, mesh and material definitions and their GPU resources
//! - `texture` contains the GPU texture wrapper and creation utilities
//! - `instance` holds per-mesh transformation and emissive data
//! - `scene_graph` enables hierarchical scene organization

pub mod colour;
pub mod instance;
pub mod model;
pub mod scene_graph;
pub mod texture;
