use std::sync::Arc;

use anyhow::Context as _;
use cgmath::Vector2;
use winit::window::Window;

use crate::{
    camera::{Camera, CameraResources, OrbitController, Projection, Ray},
    config::ViewerConfig,
    data_structures::{colour::Rgb, texture},
    lighting::{LightResources, LightUniform},
    pipelines::Pipelines,
    resources::texture::material_layout,
};

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    /// Rendered into and resolved to the surface when antialiasing
    pub(crate) msaa_target: Option<texture::Texture>,
    pub sample_count: u32,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub material_layout: wgpu::BindGroupLayout,
    pub pipelines: Pipelines,
    pub clear_colour: wgpu::Color,
    /// Pointer in normalised device coordinates, the screen centre until the
    /// first cursor event
    pub pointer: Vector2<f32>,
}

impl Context {
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));

        // The instance is a handle to our GPU
        // BackendBit::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("Couldn't create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No graphics adapter can present to this window")?;
        log::info!("Using {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    // WebGL doesn't support all of wgpu's features, so if
                    // we're building for the web we'll have to disable some.
                    required_limits: if cfg!(target_arch = "wasm32") {
                        wgpu::Limits::downlevel_webgl2_defaults()
                    } else {
                        wgpu::Limits::default()
                    },
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .context("Couldn't open the graphics device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shader writes linear colour and relies on an sRGB surface for the
        // encode. Non-sRGB surfaces come out darker.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("The surface supports no texture formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        let sample_count = sample_count(
            viewer.window.antialias,
            adapter.get_texture_format_features(surface_format).flags,
        );
        log::debug!("Rendering with {sample_count}x multisampling");

        let projection = Projection::new(
            width,
            height,
            cgmath::Deg(viewer.camera.fov),
            viewer.camera.near,
            viewer.camera.far,
        );
        let controller = OrbitController::new(&viewer.controls, height);
        let camera = Camera::new(viewer.camera.position, controller.target);
        let camera = CameraResources::new(&device, camera, controller, &projection);

        let depth_texture =
            texture::Texture::create_depth_texture(&device, [width, height], sample_count, "depth_texture");
        let msaa_target = create_msaa_target(&device, &config, sample_count);

        let light = LightResources::new(&device, LightUniform::from_config(&viewer.scene));
        let material_layout = material_layout(&device);
        let pipelines = Pipelines::new(
            &device,
            config.format,
            sample_count,
            &material_layout,
            &camera.bind_group_layout,
            &light.bind_group_layout,
        );

        Ok(Self {
            window,
            depth_texture,
            msaa_target,
            sample_count,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            light,
            material_layout,
            pipelines,
            clear_colour: Rgb::from_hex(viewer.scene.background).to_wgpu(),
            pointer: Vector2::new(0.0, 0.0),
        })
    }

    /// Ray from the eye through the pointer.
    pub fn pointer_ray(&self) -> Option<Ray> {
        self.camera.camera.cast_ray(self.pointer, &self.projection)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture =
            texture::Texture::create_depth_texture(&self.device, [width, height], self.sample_count, "depth_texture");
        self.msaa_target = create_msaa_target(&self.device, &self.config, self.sample_count);
        self.projection.resize(width, height);
        self.camera.controller.set_viewport_height(height);
    }

    /// Colour attachment for a frame: the multisampled target resolving into
    /// `surface_view`, or `surface_view` itself without antialiasing.
    pub fn colour_attachment<'v>(&'v self, surface_view: &'v wgpu::TextureView) -> wgpu::RenderPassColorAttachment<'v> {
        let (view, resolve_target, store) = match &self.msaa_target {
            Some(target) => (&target.view, Some(surface_view), wgpu::StoreOp::Discard),
            None => (surface_view, None, wgpu::StoreOp::Store),
        };
        wgpu::RenderPassColorAttachment {
            view,
            resolve_target,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(self.clear_colour),
                store,
            },
        }
    }
}

/// 4x if antialiasing is on and the surface format can be multisampled and
/// resolved, otherwise 1.
pub fn sample_count(antialias: bool, features: wgpu::TextureFormatFeatureFlags) -> u32 {
    let supported =
        features.sample_count_supported(4) && features.contains(wgpu::TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE);
    if antialias && supported { 4 } else { 1 }
}

fn create_msaa_target(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    sample_count: u32,
) -> Option<texture::Texture> {
    (sample_count > 1).then(|| {
        texture::Texture::create_msaa_target(
            device,
            [config.width, config.height],
            sample_count,
            config.format,
            "msaa_target",
        )
    })
}

#[cfg(test)]
mod tests {
    use wgpu::TextureFormatFeatureFlags as Flags;

    use super::*;

    #[test]
    fn antialiasing_uses_four_samples_when_supported() {
        let flags = Flags::MULTISAMPLE_X4 | Flags::MULTISAMPLE_RESOLVE;
        assert_eq!(sample_count(true, flags), 4);
        assert_eq!(sample_count(false, flags), 1);
    }

    #[test]
    fn unsupported_formats_fall_back_to_one_sample() {
        assert_eq!(sample_count(true, Flags::empty()), 1);
        assert_eq!(sample_count(true, Flags::MULTISAMPLE_X4), 1);
        assert_eq!(sample_count(true, Flags::MULTISAMPLE_X2 | Flags::MULTISAMPLE_RESOLVE), 1);
    }
}
