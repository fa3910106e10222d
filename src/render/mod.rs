pub mod layer;
pub mod mesh;
pub mod program;
pub mod shaders;
pub mod surface;

pub use layer::{CustomLayer, Disposable, LayerSketch, MapView, MercatorCoordinate};
pub use mesh::{create_mesh, AttributeDescriptor, Indices, Mesh, MeshDescriptor};
pub use program::{create_program, link_program, LinkedProgram};
pub use shaders::{compile_shader, CompiledShader, ShaderSource};
pub use surface::{Surface, SurfaceSize};
