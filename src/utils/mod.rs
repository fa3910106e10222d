pub mod error;
pub mod logging;

pub use error::{AssetError, ConfigError, RenderError, SketchError};
pub use logging::init_logging;
