mod cli;

use std::num::NonZeroU32;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use glutin::{
    config::ConfigTemplateBuilder,
    context::{ContextApi, ContextAttributesBuilder, GlProfile, PossiblyCurrentContext, Version},
    display::{GetGlDisplay, GlDisplay},
    prelude::*,
    surface::{Surface, SwapInterval, WindowSurface},
};
use glutin_winit::{DisplayBuilder, GlWindow};
use log::{debug, error, info, warn};
use raw_window_handle::HasRawWindowHandle;
use winit::{
    dpi::{LogicalSize, PhysicalSize},
    event::{Event, WindowEvent},
    event_loop::{EventLoop, EventLoopBuilder},
    window::{Window, WindowBuilder},
};

use glsketch::{
    config::{default_config_path, AppConfig},
    frame::DemoLoop,
    gpu::{GraphicsContext, HeadlessContext},
    render::SurfaceSize,
    sketches::{self, SketchKind},
    utils::init_logging,
};

use cli::Cli;

const DEFAULT_HEADLESS_FRAMES: u64 = 120;
const HEADLESS_FRAME_NANOS: u64 = 16_666_667;

struct App {
    window: Window,
    gl_context: PossiblyCurrentContext,
    gl_surface: Surface<WindowSurface>,
    gl: glow::Context,
    demo: DemoLoop<glow::Context>,
    /// Window size in logical pixels and the factor mapping it to the drawing buffer.
    logical_size: LogicalSize<f64>,
    scale_factor: f64,
    title: String,
    fps_label: String,
    frames: u64,
    max_frames: Option<u64>,
}

impl App {
    fn new(kind: SketchKind, config: &AppConfig, max_frames: Option<u64>) -> Result<(Self, EventLoop<()>)> {
        let event_loop = EventLoopBuilder::new().build()?;
        let title = format!("{} - {}", config.window.title, kind);
        let window_builder = WindowBuilder::new()
            .with_title(&title)
            .with_inner_size(LogicalSize::new(config.window.width, config.window.height));

        let template = ConfigTemplateBuilder::new()
            .with_alpha_size(8)
            .with_depth_size(24);

        let display_builder = DisplayBuilder::new().with_window_builder(Some(window_builder));
        let (window, gl_config) = display_builder
            .build(&event_loop, template, |configs| {
                // find_configs fails before the picker runs when nothing matches.
                configs
                    .reduce(|accum, config| {
                        if config.num_samples() > accum.num_samples() {
                            config
                        } else {
                            accum
                        }
                    })
                    .expect("config set is non-empty")
            })
            .map_err(|err| anyhow!("Failed to create window: {err}"))?;
        let window = window.context("Display builder returned no window")?;
        let raw_window_handle = window.raw_window_handle();
        let gl_display = gl_config.display();

        let gles_attributes = ContextAttributesBuilder::new()
            .with_context_api(ContextApi::Gles(Some(Version::new(3, 0))))
            .build(Some(raw_window_handle));
        let desktop_attributes = ContextAttributesBuilder::new()
            .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
            .with_profile(GlProfile::Compatibility)
            .build(Some(raw_window_handle));

        let gl_context = unsafe {
            gl_display
                .create_context(&gl_config, &gles_attributes)
                .or_else(|err| {
                    warn!("OpenGL ES 3.0 unavailable ({err}), falling back to OpenGL 3.3");
                    gl_display.create_context(&gl_config, &desktop_attributes)
                })
        }
        .context("Failed to create OpenGL context")?;

        let attrs = window.build_surface_attributes(<_>::default());
        let gl_surface = unsafe { gl_display.create_window_surface(&gl_config, &attrs) }
            .context("Failed to create GL surface")?;
        let gl_context = gl_context
            .make_current(&gl_surface)
            .context("Failed to make context current")?;

        if config.window.vsync {
            if let Err(err) =
                gl_surface.set_swap_interval(&gl_context, SwapInterval::Wait(NonZeroU32::MIN))
            {
                warn!("Could not enable vsync: {err}");
            }
        }

        let gl = unsafe {
            glow::Context::from_loader_function_cstr(|symbol| gl_display.get_proc_address(symbol))
        };
        info!("Created {} context", gl.backend_name());

        let scale_factor = window.scale_factor();
        let logical_size = window.inner_size().to_logical::<f64>(scale_factor);
        let mut demo = DemoLoop::new(
            sketches::build(kind, config),
            SurfaceSize::from_css(logical_size.width, logical_size.height, scale_factor),
        )
        .with_fps_interval(config.fps.update_interval_ms)
        .with_clear_color(config.render.clear_color);
        demo.start(&gl)
            .with_context(|| format!("Sketch '{kind}' failed to start"))?;

        Ok((
            Self {
                window,
                gl_context,
                gl_surface,
                gl,
                fps_label: demo.fps_label().to_string(),
                demo,
                logical_size,
                scale_factor,
                title,
                frames: 0,
                max_frames,
            },
            event_loop,
        ))
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.logical_size = size.to_logical(self.scale_factor);
        self.apply_surface_size();
    }

    fn rescale(&mut self, scale_factor: f64) {
        debug!("Scale factor changed to {scale_factor}");
        self.scale_factor = scale_factor;
        self.apply_surface_size();
    }

    /// Sizes the drawing buffer to the logical window size times the scale factor.
    fn apply_surface_size(&mut self) {
        let size = SurfaceSize::from_css(
            self.logical_size.width,
            self.logical_size.height,
            self.scale_factor,
        );
        if let (Some(width), Some(height)) =
            (NonZeroU32::new(size.width), NonZeroU32::new(size.height))
        {
            self.gl_surface.resize(&self.gl_context, width, height);
        }
        if self.demo.resize(&self.gl, size) {
            self.window.request_redraw();
        }
    }

    /// Renders and presents one frame. Returns false once the app should exit.
    fn redraw(&mut self) -> bool {
        match self.demo.frame(&self.gl) {
            Ok(Some(_)) => {}
            // The loop has already logged and disposed a failed sketch.
            Ok(None) | Err(_) => return false,
        }
        if let Err(err) = self.gl_surface.swap_buffers(&self.gl_context) {
            error!("Failed to swap buffers: {err}");
            return false;
        }

        if self.demo.fps_label() != self.fps_label {
            self.fps_label = self.demo.fps_label().to_string();
            self.window
                .set_title(&format!("{} ({})", self.title, self.fps_label));
        }

        self.frames += 1;
        !self.max_frames.is_some_and(|max| self.frames >= max)
    }

    fn shutdown(&mut self) {
        self.demo.stop(&self.gl);
    }

    fn run(mut self, event_loop: EventLoop<()>) -> Result<()> {
        event_loop.run(move |event, elwt| match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    self.shutdown();
                    elwt.exit();
                }
                WindowEvent::Resized(size) => self.resize(size),
                WindowEvent::ScaleFactorChanged { scale_factor, .. } => self.rescale(scale_factor),
                WindowEvent::CursorMoved { position, .. } => {
                    self.demo.pointer_moved(position.x, position.y)
                }
                WindowEvent::RedrawRequested => {
                    if !self.redraw() {
                        self.shutdown();
                        elwt.exit();
                    }
                }
                _ => (),
            },
            Event::AboutToWait => self.window.request_redraw(),
            Event::LoopExiting => self.shutdown(),
            _ => (),
        })?;
        Ok(())
    }
}

/// Drives a sketch against the validating in-memory context with a fixed
/// 60 Hz timeline.
fn run_headless(kind: SketchKind, config: &AppConfig, frames: u64) -> Result<()> {
    let ctx = HeadlessContext::new();
    let size = SurfaceSize::new(config.window.width, config.window.height);
    let mut demo = DemoLoop::new(sketches::build(kind, config), size)
        .with_fps_interval(config.fps.update_interval_ms)
        .with_clear_color(config.render.clear_color);

    let start = Instant::now();
    demo.start_at(&ctx, start)
        .with_context(|| format!("Sketch '{kind}' failed to start"))?;

    for frame in 1..=frames {
        demo.frame_at(&ctx, start + Duration::from_nanos(HEADLESS_FRAME_NANOS * frame))
            .with_context(|| format!("Frame {frame} of sketch '{kind}' failed"))?;
        let gl_error = ctx.get_error();
        if gl_error.is_error() {
            demo.stop(&ctx);
            bail!("GL error {gl_error} in frame {frame} of sketch '{kind}'");
        }
    }
    demo.stop(&ctx);

    let size = demo.surface().size();
    info!(
        "Sketch '{}' rendered {} frames at {}x{} with {} draw calls ({})",
        demo.sketch_name(),
        frames,
        size.width,
        size.height,
        ctx.draw_calls().len(),
        demo.fps_label()
    );
    let leaked = ctx.live_objects();
    if leaked != 0 {
        bail!("Sketch '{}' leaked {leaked} GL objects", demo.sketch_name());
    }
    Ok(())
}

fn print_sketches() {
    for kind in SketchKind::ALL {
        println!("{:<10} {}", kind.name(), kind.description());
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.list {
        print_sketches();
        return Ok(());
    }

    let config_path = cli.config.clone().map_or_else(default_config_path, Ok);
    let config = match &config_path {
        Ok(path) => AppConfig::load_or_create(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        Err(_) => AppConfig::default(),
    };

    init_logging(cli.log_level.unwrap_or_else(|| config.logging.level_filter()))?;
    match &config_path {
        Ok(path) => info!("Using config {}", path.display()),
        Err(err) => warn!("{err}; using built-in defaults"),
    }

    let kind = cli.sketch.unwrap_or(config.sketch);
    if cli.headless {
        return run_headless(kind, &config, cli.max_frames.unwrap_or(DEFAULT_HEADLESS_FRAMES));
    }

    let (app, event_loop) = App::new(kind, &config, cli.max_frames)?;
    app.run(event_loop)
}
