//! orbit-viewer
//!
//! A small cross-platform glTF viewer. It loads one model, lights it with an
//! ambient light, a directional light and a procedural environment, lets the
//! user orbit the camera around it and highlights the mesh under the pointer.
//! Runs natively (winit window) and in the browser (WASM + WebGL2).
//!
//! High-level modules
//! - `camera`: camera, projection, pointer rays and the orbit controller
//! - `config`: layered configuration (defaults, TOML files, environment)
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `data_structures`: colours, meshes, materials, textures and the scene graph
//! - `flow`: the winit event loop and per-frame update
//! - `highlight`: hover highlighting with emissive save/restore
//! - `lighting`: light and environment uniforms
//! - `pick`: CPU ray picking
//! - `pipelines`: render pipelines and the model shader
//! - `render`: render composition for pipeline batching
//! - `resources`: async glTF loading into CPU side scene data
//! - `viewer`: loaded scene plus hover state
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod highlight;
pub mod lighting;
pub mod pick;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod viewer;

pub use flow::run;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Entry point of the web build.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), JsValue> {
    run().map_err(|e| JsValue::from_str(&format!("{e:#}")))
}
