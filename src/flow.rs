//! Application event loop.
//!
//! [`run`] loads the configuration, starts logging and hands an [`App`] to
//! winit. The app creates the window and GPU context on `resumed`, starts
//! loading the configured model and then renders one frame per
//! `RedrawRequested`.
//!
//! # Lifecycle
//!
//! Each frame:
//! 1. Update the orbit controls and write the camera uniform
//! 2. Cast a ray through the pointer and raycast the scene
//! 3. Move the hover highlight to the nearest hit
//! 4. Write changed per-mesh data to the GPU
//! 5. Batch the scene's drawables into pipelines and render
//! 6. Present and request the next frame
//!
//! Natively, async work (context creation and asset loading) is blocked on a
//! tokio runtime. On the web it is spawned with `wasm_bindgen_futures` and the
//! result comes back through the event loop proxy as a [`FlowEvent`].

use std::{fmt::Debug, iter, sync::Arc};

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    camera::pointer_to_ndc,
    config::ViewerConfig,
    context::Context,
    render::Batches,
    resources::{SceneData, load_scene},
    viewer::Viewer,
};

/// GPU context, viewer state and surface status.
#[derive(Debug)]
pub struct AppState {
    pub(crate) ctx: Context,
    viewer: Viewer,
    is_surface_configured: bool,
}

impl AppState {
    async fn new(window: Arc<Window>, config: ViewerConfig) -> anyhow::Result<Self> {
        let ctx = Context::new(window, &config).await?;
        Ok(Self {
            ctx,
            viewer: Viewer::new(&config),
            is_surface_configured: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.resize(width, height);
            self.is_surface_configured = true;
        }
    }

    fn on_scene_loaded(&mut self, result: anyhow::Result<SceneData>) {
        if self.viewer.on_load_result(result) {
            if let Err(e) = self.viewer.upload(&self.ctx.device, &self.ctx.queue, &self.ctx.material_layout) {
                log::error!("An error occurred while loading the model: {e:#}");
            }
        }
        self.ctx.window.request_redraw();
    }

    fn update(&mut self, dt: Duration) {
        let ctx = &mut self.ctx;
        ctx.camera.controller.update(&mut ctx.camera.camera, dt);
        ctx.camera.write_to_buffer(&ctx.queue, &ctx.projection);

        let ray = ctx.pointer_ray();
        self.viewer.update_hover(ray);
        self.viewer.write_to_buffers(&ctx.queue);
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(self.ctx.colour_attachment(&view))],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            let mut batches = Batches::default();
            self.viewer.on_render().set_pipelines(&mut batches);
            batches.draw(
                &mut render_pass,
                &self.ctx.pipelines,
                self.ctx.camera.camera.position,
                &self.ctx.camera.bind_group,
                &self.ctx.light.bind_group,
            );
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

pub(crate) enum FlowEvent {
    /// The GPU context finished setting up on the web
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    Initialized(anyhow::Result<AppState>),
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    SceneLoaded(anyhow::Result<SceneData>),
}

impl Debug for FlowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized(result) => f
                .debug_tuple("Initialized")
                .field(&result.as_ref().map(|_| "AppState"))
                .finish(),
            Self::SceneLoaded(result) => f
                .debug_tuple("SceneLoaded")
                .field(&result.as_ref().map(|scene| &scene.name))
                .finish(),
        }
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    proxy: EventLoopProxy<FlowEvent>,
    config: ViewerConfig,
    state: Option<AppState>,
    /// Set when start-up failed, returned from [`run`] once the loop exits
    startup_error: Option<anyhow::Error>,
    last_time: Instant,
}

impl App {
    fn new(event_loop: &EventLoop<FlowEvent>, config: ViewerConfig) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            config,
            state: None,
            startup_error: None,
            last_time: Instant::now(),
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("App initialization failed: {error:#}");
        self.startup_error = Some(error);
        event_loop.exit();
    }

    fn on_initialized(&mut self, mut state: AppState) {
        let size = state.ctx.window.inner_size();
        state.resize(size.width, size.height);
        state.ctx.window.request_redraw();
        self.state = Some(state);
        self.last_time = Instant::now();
        self.load_model();
    }

    fn load_model(&mut self) {
        let path = self.config.model.path.clone();
        let asset_root = self.config.model.asset_root.clone();
        log::info!("Loading {path}");

        #[cfg(not(target_arch = "wasm32"))]
        {
            let result = self.async_runtime.block_on(load_scene(&path, &asset_root));
            if let Some(state) = &mut self.state {
                state.on_scene_loaded(result);
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let result = load_scene(&path, &asset_root).await;
                if proxy.send_event(FlowEvent::SceneLoaded(result)).is_err() {
                    log::warn!("The event loop closed before {path} finished loading");
                }
            });
        }
    }
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let window_config = &self.config.window;
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes()
            .with_title(window_config.title.clone())
            .with_inner_size(LogicalSize::new(window_config.width, window_config.height));

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            let canvas = web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(&window_config.canvas_id))
                .and_then(|element| element.dyn_into::<web_sys::HtmlCanvasElement>().ok());
            window_attributes = match canvas {
                Some(canvas) => window_attributes.with_canvas(Some(canvas)),
                None => {
                    log::warn!(
                        "No <canvas id=\"{}\"> found, appending one to the document",
                        window_config.canvas_id
                    );
                    window_attributes.with_append(true)
                }
            };
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(event_loop, e.into());
                return;
            }
        };

        let init_future = AppState::new(window, self.config.clone());

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(init_future) {
                Ok(state) => self.on_initialized(state),
                Err(e) => self.fail(event_loop, e),
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let result = init_future.await;
                if proxy.send_event(FlowEvent::Initialized(result)).is_err() {
                    log::warn!("The event loop closed during start-up");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            // This is the message from our wasm `spawn_local`
            FlowEvent::Initialized(Ok(state)) => self.on_initialized(state),
            FlowEvent::Initialized(Err(e)) => self.fail(event_loop, e),
            FlowEvent::SceneLoaded(result) => {
                if let Some(state) = &mut self.state {
                    state.on_scene_loaded(result);
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        // Drag and wheel
        state.ctx.camera.controller.handle_window_events(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::CursorMoved { position, .. } => {
                state.ctx.pointer = pointer_to_ndc(position, state.ctx.window.inner_size());
            }
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();
                state.update(dt);

                match state.render() {
                    Ok(()) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
                state.ctx.window.request_redraw();
            }
            _ => {}
        }
    }
}

fn init_logger(level: &str) {
    #[cfg(not(target_arch = "wasm32"))]
    {
        let env = env_logger::Env::default().default_filter_or(level);
        if let Err(e) = env_logger::Builder::from_env(env).try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        let level = level.parse().unwrap_or(log::Level::Info);
        if let Err(e) = console_log::init_with_level(level) {
            web_sys::console::warn_1(&format!("Could not initialize logger: {e}").into());
        }
    }
}

/// Open the viewer and block until its window is closed.
pub fn run() -> anyhow::Result<()> {
    let config = ViewerConfig::load()?;
    init_logger(&config.debug.log_level);
    log::debug!("{config:?}");

    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config)?;

    event_loop.run_app(&mut app)?;

    match app.startup_error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
