//! Viewer configuration
//!
//! Configuration is loaded from multiple sources with the following priority (lowest to highest):
//! 1. built-in defaults (the values below)
//! 2. `config/default.toml`
//! 3. `config/user.toml` (gitignored, user overrides)
//! 4. Environment variables (`VIEWER_SECTION__KEY`)
//!
//! The web build has no file system and always runs with the built-in defaults.
//! Colours are sRGB hex integers, e.g. `background = 0x25244b`.

use std::path::Path;

use anyhow::Context as _;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

/// Main viewer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub controls: ControlsConfig,
    #[serde(default)]
    pub scene: SceneConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub highlight: HighlightConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

impl ViewerConfig {
    /// Load configuration from the `config` directory next to the working directory.
    pub fn load() -> anyhow::Result<Self> {
        #[cfg(not(target_arch = "wasm32"))]
        {
            Self::load_from("config")
        }
        #[cfg(target_arch = "wasm32")]
        {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific config directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> anyhow::Result<Self> {
        let config_dir = config_dir.as_ref();
        let default_path = config_dir.join("default.toml");
        let user_path = config_dir.join("user.toml");

        let mut figment = Figment::from(Serialized::defaults(ViewerConfig::default()));
        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }
        if user_path.exists() {
            figment = figment.merge(Toml::file(&user_path));
        }
        // VIEWER_MODEL__PATH=duck.glb -> model.path = "duck.glb"
        figment = figment.merge(Env::prefixed("VIEWER_").split("__"));

        figment
            .extract()
            .with_context(|| format!("Invalid configuration in {}", config_dir.display()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Id of the `<canvas>` to render into on the web. A new canvas is appended
    /// to the document body if no element with this id exists.
    pub canvas_id: String,
    /// 4x multisampling, where the surface format supports it
    pub antialias: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Orbit Viewer".to_string(),
            width: 1280,
            height: 720,
            canvas_id: "canvas".to_string(),
            antialias: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 40.0,
            near: 1.0,
            far: 100.0,
            position: [15.0, 5.0, 5.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlsConfig {
    /// Point the camera orbits around
    pub target: [f32; 3],
    pub enable_damping: bool,
    /// Fraction of the pending rotation applied per 60 Hz frame
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub enable_zoom: bool,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Polar angle range in radians, measured from the up axis
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            target: [0.0, 0.5, 0.0],
            enable_damping: true,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            enable_zoom: true,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: std::f32::consts::PI,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    pub background: u32,
    pub ambient_colour: u32,
    pub ambient_intensity: f32,
    pub directional_colour: u32,
    pub directional_intensity: f32,
    /// The directional light shines from here towards the origin
    pub directional_position: [f32; 3],
    /// Upper hemisphere of the reflected environment
    pub environment_sky: u32,
    /// Lower hemisphere of the reflected environment
    pub environment_ground: u32,
    pub environment_intensity: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            background: 0x25244b,
            ambient_colour: 0xffffff,
            ambient_intensity: 0.6,
            directional_colour: 0xffffff,
            directional_intensity: 1.0,
            directional_position: [5.0, 10.0, 7.5],
            environment_sky: 0xe0e0e0,
            environment_ground: 0x5a5a5a,
            environment_intensity: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// glTF or GLB file, relative to the asset root (native) or the page origin (web)
    pub path: String,
    /// Directory models are read from in native builds
    pub asset_root: String,
    pub position: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: "3d_model/scene.gltf".to_string(),
            asset_root: "assets".to_string(),
            position: [1.0, 1.0, 1.0],
            scale: [0.5, 0.5, 0.5],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightConfig {
    /// Emissive colour of the hovered mesh
    pub colour: u32,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self { colour: 0xff0000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Default log filter (error, warn, info, debug, trace). `RUST_LOG` wins natively.
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
