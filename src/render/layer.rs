//! Layers rendered into a host-owned context.
//!
//! A host (a map view here) owns the context and the camera. It calls
//! [`CustomLayer::on_add`] once and then [`CustomLayer::render`] every frame
//! with its current projection matrix.

use std::f64::consts::PI;

use glam::{Mat4, Vec3};

use crate::frame::{FrameTime, Sketch};
use crate::gpu::GraphicsContext;
use crate::render::surface::{Surface, SurfaceSize};
use crate::utils::error::{RenderError, SketchError};

const EARTH_RADIUS_M: f64 = 6_371_008.8;
/// Pixel size of the whole world at zoom 0.
const TILE_SIZE: f64 = 512.0;

pub trait CustomLayer<C: GraphicsContext> {
    /// Creates the layer's GPU resources.
    fn on_add(&mut self, ctx: &C) -> Result<(), RenderError>;

    /// Draws with the host's world-to-clip matrix.
    fn render(&mut self, ctx: &C, matrix: &Mat4);
}

/// Releases GPU resources owned by a layer.
pub trait Disposable<C: GraphicsContext> {
    fn dispose(&mut self, ctx: &C);
}

/// Web-Mercator position in `[0, 1]` world units, y pointing south.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MercatorCoordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl MercatorCoordinate {
    pub fn from_lng_lat(lng: f64, lat: f64, altitude_m: f64) -> Self {
        let x = (180.0 + lng) / 360.0;
        let y = (180.0 - (180.0 / PI) * (PI / 4.0 + lat * PI / 360.0).tan().ln()) / 360.0;
        let circumference = 2.0 * PI * EARTH_RADIUS_M * (lat * PI / 180.0).cos();
        Self {
            x,
            y,
            z: altitude_m / circumference,
        }
    }
}

/// Flat top-down map camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    pub center_lng: f64,
    pub center_lat: f64,
    pub zoom: f64,
}

impl MapView {
    pub fn new(center_lng: f64, center_lat: f64, zoom: f64) -> Self {
        Self {
            center_lng,
            center_lat,
            zoom,
        }
    }

    /// Maps Mercator world coordinates to clip space for a surface of `size`.
    pub fn matrix(&self, size: SurfaceSize) -> Mat4 {
        let center = MercatorCoordinate::from_lng_lat(self.center_lng, self.center_lat, 0.0);
        let world_size = (TILE_SIZE * 2f64.powf(self.zoom)) as f32;
        let half_w = size.width.max(1) as f32 / 2.0;
        let half_h = size.height.max(1) as f32 / 2.0;

        // Bottom and top are swapped so that Mercator y (south) points down.
        let projection = Mat4::orthographic_rh_gl(-half_w, half_w, half_h, -half_h, -1.0, 1.0);
        projection
            * Mat4::from_scale(Vec3::new(world_size, world_size, 1.0))
            * Mat4::from_translation(Vec3::new(-center.x as f32, -center.y as f32, 0.0))
    }
}

/// Hosts a custom layer under a map view so it can run as a sketch.
pub struct LayerSketch<L> {
    name: &'static str,
    layer: L,
    view: MapView,
    matrix: Mat4,
}

impl<L> LayerSketch<L> {
    pub fn new(name: &'static str, layer: L, view: MapView) -> Self {
        Self {
            name,
            layer,
            view,
            matrix: Mat4::IDENTITY,
        }
    }

    pub fn layer(&self) -> &L {
        &self.layer
    }

    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }
}

impl<C, L> Sketch<C> for LayerSketch<L>
where
    C: GraphicsContext,
    L: CustomLayer<C> + Disposable<C>,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn init(&mut self, ctx: &C, surface: &Surface) -> Result<(), SketchError> {
        self.matrix = self.view.matrix(surface.size());
        self.layer.on_add(ctx)?;
        Ok(())
    }

    fn resize(&mut self, _ctx: &C, surface: &Surface) {
        self.matrix = self.view.matrix(surface.size());
    }

    fn frame(&mut self, ctx: &C, _time: &FrameTime) -> Result<(), SketchError> {
        self.layer.render(ctx, &self.matrix);
        Ok(())
    }

    fn dispose(&mut self, ctx: &C) {
        self.layer.dispose(ctx);
    }

    fn clear_color(&self) -> Option<[f32; 4]> {
        // Monochrome basemap background.
        Some([0.92, 0.92, 0.92, 1.0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessContext;
    use glam::Vec4;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_mercator_projection() {
        let origin = MercatorCoordinate::from_lng_lat(0.0, 0.0, 0.0);
        assert!(approx(origin.x, 0.5) && approx(origin.y, 0.5) && approx(origin.z, 0.0));

        let helsinki = MercatorCoordinate::from_lng_lat(25.004, 60.239, 0.0);
        let berlin = MercatorCoordinate::from_lng_lat(13.403, 52.562, 0.0);
        assert!(helsinki.x > berlin.x);
        assert!(helsinki.y < berlin.y, "north is smaller y");
        assert!(approx(berlin.x, (180.0 + 13.403) / 360.0));

        let up = MercatorCoordinate::from_lng_lat(0.0, 0.0, EARTH_RADIUS_M * 2.0 * PI);
        assert!(approx(up.z, 1.0));
    }

    #[test]
    fn test_view_matrix_centers_the_map() {
        let view = MapView::new(13.403, 52.562, 3.0);
        let matrix = view.matrix(SurfaceSize::new(800, 600));

        let berlin = MercatorCoordinate::from_lng_lat(13.403, 52.562, 0.0);
        let clip = matrix * Vec4::new(berlin.x as f32, berlin.y as f32, 0.0, 1.0);
        assert!(clip.x.abs() < 1e-3 && clip.y.abs() < 1e-3);

        let helsinki = MercatorCoordinate::from_lng_lat(25.004, 60.239, 0.0);
        let clip = matrix * Vec4::new(helsinki.x as f32, helsinki.y as f32, 0.0, 1.0);
        assert!(clip.x > 0.0 && clip.y > 0.0, "north-east lands up and right");
    }

    #[derive(Default)]
    struct Counting {
        added: usize,
        rendered: Vec<Mat4>,
        disposed: bool,
    }

    impl CustomLayer<HeadlessContext> for Counting {
        fn on_add(&mut self, _ctx: &HeadlessContext) -> Result<(), RenderError> {
            self.added += 1;
            Ok(())
        }

        fn render(&mut self, _ctx: &HeadlessContext, matrix: &Mat4) {
            self.rendered.push(*matrix);
        }
    }

    impl Disposable<HeadlessContext> for Counting {
        fn dispose(&mut self, _ctx: &HeadlessContext) {
            self.disposed = true;
        }
    }

    #[test]
    fn test_layer_sketch_forwards_matrix() {
        let ctx = HeadlessContext::new();
        let view = MapView::new(7.5, 58.0, 3.0);
        let surface = Surface::new(SurfaceSize::new(400, 300));
        let mut sketch = LayerSketch::new("counting", Counting::default(), view);

        Sketch::<HeadlessContext>::init(&mut sketch, &ctx, &surface).unwrap();
        let time = crate::frame::FrameClock::new().tick();
        sketch.frame(&ctx, &time).unwrap();
        Sketch::<HeadlessContext>::dispose(&mut sketch, &ctx);

        let layer = sketch.layer();
        assert_eq!(layer.added, 1);
        assert_eq!(layer.rendered, vec![view.matrix(surface.size())]);
        assert!(layer.disposed);
    }
}
