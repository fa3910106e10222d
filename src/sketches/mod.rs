//! The bundled demo scenes.

pub mod cube;
pub mod highlight;
pub mod particles;
pub mod rainbow;
pub mod rectangles;
pub mod triangle;
pub mod tumble;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::frame::Sketch;
use crate::gpu::GraphicsContext;
use crate::render::{LayerSketch, LinkedProgram, MapView};

pub use cube::Cube;
pub use highlight::HighlightLayer;
pub use particles::Particles;
pub use rainbow::Rainbow;
pub use rectangles::Rectangles;
pub use triangle::Triangle;
pub use tumble::Tumble;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SketchKind {
    /// Flat triangle from shader files on disk
    Triangle,
    /// Rotating star with animated colours
    #[default]
    Rainbow,
    /// Points pushed away by the pointer
    Particles,
    /// Lit spinning cube
    Cube,
    /// City route drawn as a map layer
    Highlight,
    /// Random rectangles scattered by pointer moves
    Rectangles,
    /// Random triangles tumbling in 3D
    Tumble,
}

impl SketchKind {
    pub const ALL: [SketchKind; 7] = [
        Self::Triangle,
        Self::Rainbow,
        Self::Particles,
        Self::Cube,
        Self::Highlight,
        Self::Rectangles,
        Self::Tumble,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Triangle => "triangle",
            Self::Rainbow => "rainbow",
            Self::Particles => "particles",
            Self::Cube => "cube",
            Self::Highlight => "highlight",
            Self::Rectangles => "rectangles",
            Self::Tumble => "tumble",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Triangle => "flat triangle from shader files on disk",
            Self::Rainbow => "rotating star with animated colours",
            Self::Particles => "points pushed away by the pointer",
            Self::Cube => "lit spinning cube",
            Self::Highlight => "city route drawn as a map layer",
            Self::Rectangles => "random rectangles scattered by pointer moves",
            Self::Tumble => "random triangles tumbling in 3D",
        }
    }
}

impl fmt::Display for SketchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Instantiates the sketch for `kind`. Nothing touches the context until
/// the sketch's `init`.
pub fn build<C: GraphicsContext + 'static>(
    kind: SketchKind,
    config: &AppConfig,
) -> Box<dyn Sketch<C>> {
    match kind {
        SketchKind::Triangle => Box::new(Triangle::<C>::new(
            config.render.shader_path(triangle::VERTEX_FILE),
            config.render.shader_path(triangle::FRAGMENT_FILE),
        )),
        SketchKind::Rainbow => Box::new(Rainbow::<C>::new()),
        SketchKind::Particles => Box::new(Particles::<C>::new(config.particles.clone())),
        SketchKind::Cube => Box::new(Cube::<C>::new()),
        SketchKind::Highlight => Box::new(LayerSketch::new(
            "highlight",
            HighlightLayer::<C>::new(),
            MapView::new(7.5, 58.0, 3.0),
        )),
        SketchKind::Rectangles => Box::new(Rectangles::<C>::new(config.rectangles.clone())),
        SketchKind::Tumble => Box::new(Tumble::<C>::new(config.tumble.clone())),
    }
}

/// Looks up an attribute slot, falling back to `fallback` when the linker
/// dropped or renamed it.
fn attribute_slot<C: GraphicsContext>(
    program: &mut LinkedProgram<C>,
    ctx: &C,
    name: &str,
    fallback: u32,
) -> u32 {
    program.attrib_location(ctx, name).unwrap_or(fallback)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessContext;
    use clap::ValueEnum;

    #[test]
    fn test_names_match_cli_values() {
        for kind in SketchKind::ALL {
            let parsed = SketchKind::from_str(kind.name(), false).unwrap();
            assert_eq!(parsed, kind);
            assert_eq!(kind.to_string(), kind.name());
        }
        assert_eq!(SketchKind::value_variants().len(), SketchKind::ALL.len());
    }

    #[test]
    fn test_build_names_each_sketch() {
        let config = AppConfig::default();
        for kind in SketchKind::ALL {
            let sketch: Box<dyn Sketch<HeadlessContext>> = build(kind, &config);
            assert_eq!(sketch.name(), kind.name());
        }
    }
}
