pub mod config;
pub mod frame;
pub mod gpu;
pub mod render;
pub mod sketches;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use frame::{DemoLoop, FrameTime, LoopState, Sketch};
pub use gpu::{GraphicsContext, HeadlessContext};
pub use render::mesh::{create_mesh, Mesh, MeshDescriptor};
pub use render::program::{create_program, LinkedProgram};
pub use render::shaders::{compile_shader, ShaderSource};
pub use render::surface::SurfaceSize;
pub use sketches::SketchKind;
pub use utils::error::{RenderError, SketchError};
