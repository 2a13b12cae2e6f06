//! The viewer's per-frame state: the loaded scene and the hovered mesh.
//!
//! Nothing in here owns GPU objects directly, so the hover logic runs the
//! same way in tests as behind a window.

use crate::{
    camera::Ray,
    config::{ModelConfig, ViewerConfig},
    data_structures::{colour::Rgb, scene_graph::SceneGraph},
    highlight::Hover,
    render::Render,
    resources::SceneData,
};

#[derive(Debug)]
pub struct Viewer {
    scene: Option<SceneGraph>,
    hover: Hover,
    model: ModelConfig,
}

impl Viewer {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            scene: None,
            hover: Hover::new(Rgb::from_hex(config.highlight.colour)),
            model: config.model.clone(),
        }
    }

    pub fn scene(&self) -> Option<&SceneGraph> {
        self.scene.as_ref()
    }

    pub fn hover(&self) -> &Hover {
        &self.hover
    }

    /// Replace the shown scene. Any highlight referred to the old one.
    pub fn set_scene(&mut self, scene: SceneGraph) {
        self.hover.forget();
        log::info!("Showing {} ({} meshes)", scene.name, scene.mesh_count());
        self.scene = Some(scene);
    }

    /// Build the scene graph from a finished load. Failures are logged and the
    /// viewer carries on with whatever it showed before. Returns whether a new
    /// scene was set.
    pub fn on_load_result(&mut self, result: anyhow::Result<SceneData>) -> bool {
        match result {
            Ok(data) => {
                self.set_scene(SceneGraph::new(data, &self.model));
                true
            }
            Err(e) => {
                log::error!("An error occurred while loading the model: {e:#}");
                false
            }
        }
    }

    /// Move the GPU side of the current scene onto `device`. On failure the
    /// scene is dropped so it never renders half uploaded.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        material_layout: &wgpu::BindGroupLayout,
    ) -> anyhow::Result<()> {
        let Some(scene) = &mut self.scene else {
            return Ok(());
        };
        if let Err(e) = scene.upload(device, queue, material_layout) {
            self.scene = None;
            self.hover.forget();
            return Err(e);
        }
        Ok(())
    }

    /// Highlight the nearest mesh under `ray`, or nothing if the ray misses
    /// (or there is no ray). Returns whether the highlighted mesh changed.
    pub fn update_hover(&mut self, ray: Option<Ray>) -> bool {
        let Some(scene) = &mut self.scene else {
            return false;
        };
        let hit = ray.and_then(|ray| scene.raycast(&ray).first().map(|hit| hit.id));
        self.hover.update(scene, hit)
    }

    pub fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        if let Some(scene) = &mut self.scene {
            scene.write_to_buffers(queue);
        }
    }

    pub fn on_render(&self) -> Render<'_> {
        self.scene.as_ref().map_or(Render::None, SceneGraph::get_render)
    }
}
