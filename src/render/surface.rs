use glam::Vec2;

/// Absorbs float error when a logical size was itself derived from pixels.
const PIXEL_SLACK: f64 = 1e-6;

/// Drawing-buffer size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Converts a CSS/logical size to device pixels, flooring each axis.
    pub fn from_css(width: f64, height: f64, device_pixel_ratio: f64) -> Self {
        let to_px = |v: f64| (v * device_pixel_ratio + PIXEL_SLACK).floor().max(0.0) as u32;
        Self {
            width: to_px(width),
            height: to_px(height),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Tracks the drawing-buffer size of the render target.
#[derive(Debug, Clone, Default)]
pub struct Surface {
    size: SurfaceSize,
}

impl Surface {
    pub fn new(size: SurfaceSize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    /// Stores `size` and reports whether it differs from the previous one.
    pub fn resize(&mut self, size: SurfaceSize) -> bool {
        if self.size == size {
            return false;
        }
        self.size = size;
        true
    }

    /// Maps a pixel position (origin top-left) to normalized device coordinates.
    pub fn to_ndc(&self, x: f64, y: f64) -> Vec2 {
        let map = |value: f64, extent: u32, lo: f64, hi: f64| {
            if extent == 0 {
                0.0
            } else {
                (value / extent as f64 * (hi - lo) + lo) as f32
            }
        };
        Vec2::new(
            map(x, self.size.width, -1.0, 1.0),
            map(y, self.size.height, 1.0, -1.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_css_floors() {
        assert_eq!(SurfaceSize::from_css(300.0, 150.0, 1.0), SurfaceSize::new(300, 150));
        assert_eq!(SurfaceSize::from_css(333.0, 101.0, 1.5), SurfaceSize::new(499, 151));
        assert_eq!(SurfaceSize::from_css(10.0, 10.0, -2.0), SurfaceSize::new(0, 0));
    }

    #[test]
    fn test_from_css_round_trips_window_pixels() {
        for scale in [1.0, 1.25, 1.5, 1.75, 2.0, 3.0] {
            for px in [1u32, 333, 1001, 1919, 2161] {
                let logical = f64::from(px) / scale;
                assert_eq!(
                    SurfaceSize::from_css(logical, logical, scale),
                    SurfaceSize::new(px, px),
                    "{px}px at {scale}x"
                );
            }
        }
    }

    #[test]
    fn test_resize_only_reports_changes() {
        let mut surface = Surface::new(SurfaceSize::new(640, 480));
        assert!(!surface.resize(SurfaceSize::new(640, 480)));
        assert!(surface.resize(SurfaceSize::new(800, 600)));
        assert_eq!(surface.size(), SurfaceSize::new(800, 600));
        assert!((surface.size().aspect() - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_to_ndc() {
        let surface = Surface::new(SurfaceSize::new(200, 100));
        assert_eq!(surface.to_ndc(0.0, 0.0), Vec2::new(-1.0, 1.0));
        assert_eq!(surface.to_ndc(200.0, 100.0), Vec2::new(1.0, -1.0));
        assert_eq!(surface.to_ndc(100.0, 50.0), Vec2::ZERO);
        assert_eq!(Surface::default().to_ndc(5.0, 5.0), Vec2::ZERO);
        assert!(Surface::default().size().is_empty());
    }
}
