pub mod app;
pub mod loader;

pub use app::{
    AppConfig, FpsConfig, LoggingConfig, ParticlesConfig, RectanglesConfig, RenderConfig,
    TumbleConfig, WindowConfig,
};
pub use loader::default_config_path;
