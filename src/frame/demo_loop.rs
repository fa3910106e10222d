use std::time::Instant;

use glam::Vec2;
use log::{debug, error, info};

use super::clock::{FrameClock, FrameTime};
use super::fps::FpsCounter;
use crate::gpu::{ClearFlags, GraphicsContext};
use crate::render::surface::{Surface, SurfaceSize};
use crate::utils::error::SketchError;

/// One self-contained animated scene.
///
/// A sketch owns all of its GPU objects. `init` runs once before the first
/// frame; `dispose` releases whatever `init` created, including after a
/// partially failed `init`. A frame that returns an error ends the loop.
pub trait Sketch<C: GraphicsContext> {
    fn name(&self) -> &'static str;

    fn init(&mut self, ctx: &C, surface: &Surface) -> Result<(), SketchError>;

    fn resize(&mut self, _ctx: &C, _surface: &Surface) {}

    /// Pointer position in normalized device coordinates.
    fn pointer_moved(&mut self, _position: Vec2) {}

    fn frame(&mut self, ctx: &C, time: &FrameTime) -> Result<(), SketchError>;

    fn dispose(&mut self, ctx: &C);

    /// Overrides the loop's clear colour.
    fn clear_color(&self) -> Option<[f32; 4]> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
}

/// Drives a sketch: timing, FPS readout, surface size and teardown.
pub struct DemoLoop<C: GraphicsContext> {
    sketch: Box<dyn Sketch<C>>,
    clock: FrameClock,
    fps: FpsCounter,
    surface: Surface,
    clear_color: [f32; 4],
    state: LoopState,
}

impl<C: GraphicsContext> DemoLoop<C> {
    pub fn new(sketch: Box<dyn Sketch<C>>, size: SurfaceSize) -> Self {
        Self {
            sketch,
            clock: FrameClock::new(),
            fps: FpsCounter::default(),
            surface: Surface::new(size),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            state: LoopState::Idle,
        }
    }

    pub fn with_fps_interval(mut self, interval_ms: i64) -> Self {
        self.fps = FpsCounter::new(interval_ms);
        self
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn sketch_name(&self) -> &'static str {
        self.sketch.name()
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn fps_label(&self) -> &str {
        self.fps.label()
    }

    /// Initialises the sketch. An error aborts the loop: the sketch's partial
    /// resources are released and no frame will ever run.
    pub fn start(&mut self, ctx: &C) -> Result<(), SketchError> {
        self.start_at(ctx, Instant::now())
    }

    pub fn start_at(&mut self, ctx: &C, now: Instant) -> Result<(), SketchError> {
        if self.state != LoopState::Idle {
            return Ok(());
        }
        let size = self.surface.size();
        ctx.viewport(0, 0, size.width as i32, size.height as i32);

        if let Err(err) = self.sketch.init(ctx, &self.surface) {
            error!("Sketch '{}' failed to initialise: {}", self.sketch.name(), err);
            self.sketch.dispose(ctx);
            self.state = LoopState::Stopped;
            return Err(err);
        }

        info!(
            "Sketch '{}' running on {} ({}x{})",
            self.sketch.name(),
            ctx.backend_name(),
            size.width,
            size.height
        );
        self.clock.reset(now);
        self.fps.reset();
        self.state = LoopState::Running;
        Ok(())
    }

    /// Renders one frame. Returns `None` unless the loop is running.
    ///
    /// A failing sketch frame is fatal: the sketch is disposed, the loop
    /// stops and the error is returned.
    pub fn frame(&mut self, ctx: &C) -> Result<Option<FrameTime>, SketchError> {
        self.frame_at(ctx, Instant::now())
    }

    pub fn frame_at(&mut self, ctx: &C, now: Instant) -> Result<Option<FrameTime>, SketchError> {
        if self.state != LoopState::Running {
            return Ok(None);
        }
        let time = self.clock.tick_at(now);
        if self.fps.update(time.elapsed_ms()) {
            debug!("{}: {}", self.sketch.name(), self.fps.label());
        }

        let [r, g, b, a] = self.sketch.clear_color().unwrap_or(self.clear_color);
        ctx.clear_color(r, g, b, a);
        ctx.clear(ClearFlags::COLOR | ClearFlags::DEPTH);
        if let Err(err) = self.sketch.frame(ctx, &time) {
            error!(
                "Sketch '{}' failed in frame {}: {}",
                self.sketch.name(),
                time.frame_index,
                err
            );
            self.sketch.dispose(ctx);
            self.state = LoopState::Stopped;
            return Err(err);
        }
        Ok(Some(time))
    }

    /// Applies a new drawing-buffer size. The viewport and the sketch are only
    /// updated when the size actually changed.
    pub fn resize(&mut self, ctx: &C, size: SurfaceSize) -> bool {
        if !self.surface.resize(size) {
            return false;
        }
        debug!("Surface resized to {}x{}", size.width, size.height);
        ctx.viewport(0, 0, size.width as i32, size.height as i32);
        if self.state == LoopState::Running {
            self.sketch.resize(ctx, &self.surface);
        }
        true
    }

    /// Forwards a pointer position given in physical pixels.
    pub fn pointer_moved(&mut self, x: f64, y: f64) {
        let position = self.surface.to_ndc(x, y);
        self.sketch.pointer_moved(position);
    }

    /// Disposes the sketch. Later calls do nothing.
    pub fn stop(&mut self, ctx: &C) {
        if self.state != LoopState::Running {
            self.state = LoopState::Stopped;
            return;
        }
        info!("Stopping sketch '{}'", self.sketch.name());
        self.sketch.dispose(ctx);
        self.state = LoopState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GlError, HeadlessContext};
    use crate::utils::error::RenderError;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Default)]
    struct Calls {
        init: usize,
        frames: Vec<u64>,
        resizes: Vec<SurfaceSize>,
        pointer: Option<Vec2>,
        disposed: usize,
    }

    struct Probe {
        calls: Rc<RefCell<Calls>>,
        fail_init: bool,
        fail_frame: Option<u64>,
    }

    impl Sketch<HeadlessContext> for Probe {
        fn name(&self) -> &'static str {
            "probe"
        }

        fn init(&mut self, _ctx: &HeadlessContext, _surface: &Surface) -> Result<(), SketchError> {
            self.calls.borrow_mut().init += 1;
            if self.fail_init {
                return Err(RenderError::ProgramLink {
                    log: "boom".into(),
                }
                .into());
            }
            Ok(())
        }

        fn resize(&mut self, _ctx: &HeadlessContext, surface: &Surface) {
            self.calls.borrow_mut().resizes.push(surface.size());
        }

        fn pointer_moved(&mut self, position: Vec2) {
            self.calls.borrow_mut().pointer = Some(position);
        }

        fn frame(&mut self, _ctx: &HeadlessContext, time: &FrameTime) -> Result<(), SketchError> {
            self.calls.borrow_mut().frames.push(time.frame_index);
            if self.fail_frame == Some(time.frame_index) {
                return Err(RenderError::Gl {
                    operation: "drawing",
                    error: GlError::InvalidOperation,
                }
                .into());
            }
            Ok(())
        }

        fn dispose(&mut self, _ctx: &HeadlessContext) {
            self.calls.borrow_mut().disposed += 1;
        }

        fn clear_color(&self) -> Option<[f32; 4]> {
            Some([0.0, 0.0, 1.0, 1.0])
        }
    }

    fn probe(fail_init: bool) -> (DemoLoop<HeadlessContext>, Rc<RefCell<Calls>>) {
        failing_frame(fail_init, None)
    }

    fn failing_frame(
        fail_init: bool,
        fail_frame: Option<u64>,
    ) -> (DemoLoop<HeadlessContext>, Rc<RefCell<Calls>>) {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let sketch = Probe {
            calls: Rc::clone(&calls),
            fail_init,
            fail_frame,
        };
        (DemoLoop::new(Box::new(sketch), SurfaceSize::new(320, 240)), calls)
    }

    #[test]
    fn test_frames_run_after_start() {
        let ctx = HeadlessContext::new();
        let (mut demo, calls) = probe(false);
        let t0 = Instant::now();

        assert!(demo.frame_at(&ctx, t0).unwrap().is_none());
        demo.start_at(&ctx, t0).unwrap();
        assert_eq!(ctx.current_viewport(), [0, 0, 320, 240]);

        for i in 1..=3 {
            demo.frame_at(&ctx, t0 + Duration::from_millis(16 * i))
                .unwrap()
                .unwrap();
        }
        assert_eq!(calls.borrow().frames, vec![0, 1, 2]);
        assert_eq!(ctx.clear_count(), 3);
        assert_eq!(ctx.current_clear_color(), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_failed_init_is_fatal() {
        let ctx = HeadlessContext::new();
        let (mut demo, calls) = probe(true);
        assert!(demo.start(&ctx).is_err());
        assert_eq!(demo.state(), LoopState::Stopped);
        assert!(demo.frame(&ctx).unwrap().is_none());
        assert!(calls.borrow().frames.is_empty());
        assert_eq!(calls.borrow().disposed, 1);

        demo.stop(&ctx);
        assert_eq!(calls.borrow().disposed, 1);
    }

    #[test]
    fn test_resize_only_on_change() {
        let ctx = HeadlessContext::new();
        let (mut demo, calls) = probe(false);
        demo.start(&ctx).unwrap();

        assert!(!demo.resize(&ctx, SurfaceSize::new(320, 240)));
        assert!(demo.resize(&ctx, SurfaceSize::new(640, 480)));
        assert_eq!(ctx.current_viewport(), [0, 0, 640, 480]);
        assert_eq!(calls.borrow().resizes, vec![SurfaceSize::new(640, 480)]);
    }

    #[test]
    fn test_pointer_is_converted_to_ndc() {
        let (mut demo, calls) = probe(false);
        demo.pointer_moved(160.0, 0.0);
        assert_eq!(calls.borrow().pointer, Some(Vec2::new(0.0, 1.0)));
    }

    #[test]
    fn test_stop_disposes_once() {
        let ctx = HeadlessContext::new();
        let (mut demo, calls) = probe(false);
        demo.start(&ctx).unwrap();
        demo.stop(&ctx);
        demo.stop(&ctx);
        assert_eq!(calls.borrow().disposed, 1);
        assert_eq!(calls.borrow().init, 1);
        assert!(demo.frame(&ctx).unwrap().is_none());
    }

    #[test]
    fn test_failed_frame_stops_the_loop() {
        let ctx = HeadlessContext::new();
        let (mut demo, calls) = failing_frame(false, Some(1));
        let t0 = Instant::now();
        demo.start_at(&ctx, t0).unwrap();

        assert!(demo.frame_at(&ctx, t0).unwrap().is_some());
        let err = demo.frame_at(&ctx, t0 + Duration::from_millis(16)).unwrap_err();
        assert!(err.to_string().contains("INVALID_OPERATION"));
        assert_eq!(demo.state(), LoopState::Stopped);
        assert_eq!(calls.borrow().disposed, 1);

        assert!(demo.frame_at(&ctx, t0 + Duration::from_millis(32)).unwrap().is_none());
        assert_eq!(calls.borrow().frames, vec![0, 1]);
        demo.stop(&ctx);
        assert_eq!(calls.borrow().disposed, 1);
    }

    #[test]
    fn test_fps_label_updates() {
        let ctx = HeadlessContext::new();
        let (demo, _) = probe(false);
        let mut demo = demo.with_fps_interval(100);
        let t0 = Instant::now();
        demo.start_at(&ctx, t0).unwrap();
        assert_eq!(demo.fps_label(), "-- FPS");
        for i in 0..=10 {
            demo.frame_at(&ctx, t0 + Duration::from_millis(10 * i)).unwrap();
        }
        assert_eq!(demo.fps_label(), "110.0 FPS");
    }
}
