use std::path::PathBuf;

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::gpu::Primitive;
use crate::sketches::SketchKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Sketch started when none is given on the command line.
    pub sketch: SketchKind,
    pub window: WindowConfig,
    pub render: RenderConfig,
    pub fps: FpsConfig,
    pub logging: LoggingConfig,
    pub particles: ParticlesConfig,
    pub rectangles: RectanglesConfig,
    pub tumble: TumbleConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sketch: SketchKind::Rainbow,
            window: WindowConfig::default(),
            render: RenderConfig::default(),
            fps: FpsConfig::default(),
            logging: LoggingConfig::default(),
            particles: ParticlesConfig::default(),
            rectangles: RectanglesConfig::default(),
            tumble: TumbleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "glsketch".to_string(),
            width: 960,
            height: 640,
            vsync: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub clear_color: [f32; 4],
    /// Directory holding `shaders/*.glsl`.
    pub assets_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            assets_dir: PathBuf::from("assets"),
        }
    }
}

impl RenderConfig {
    pub fn shader_path(&self, file_name: &str) -> PathBuf {
        self.assets_dir.join("shaders").join(file_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FpsConfig {
    /// Non-positive values fall back to 500 ms.
    pub update_interval_ms: i64,
}

impl Default for FpsConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: crate::frame::fps::DEFAULT_UPDATE_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Unknown level names fall back to `info`.
    pub fn level_filter(&self) -> LevelFilter {
        self.level.parse().unwrap_or(LevelFilter::Info)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticlesConfig {
    pub count: usize,
    pub point_size: f32,
    pub color: [f32; 4],
    pub primitive: Primitive,
    /// Fixed seed for reproducible runs; random when absent.
    pub seed: Option<u64>,
}

impl Default for ParticlesConfig {
    fn default() -> Self {
        Self {
            count: 5000,
            point_size: 2.0,
            color: [0.0, 1.0, 1.0, 1.0],
            primitive: Primitive::Points,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectanglesConfig {
    /// Rectangles scattered on each pointer move.
    pub per_move: usize,
    /// Exclusive bound, in pixels, for corner coordinates and side lengths.
    pub max_extent: u32,
    pub seed: Option<u64>,
}

impl Default for RectanglesConfig {
    fn default() -> Self {
        Self {
            per_move: 5,
            max_extent: 300,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TumbleConfig {
    /// Rounded down to whole triangles.
    pub vertex_count: usize,
    pub seed: Option<u64>,
}

impl Default for TumbleConfig {
    fn default() -> Self {
        Self {
            vertex_count: 30,
            seed: None,
        }
    }
}
