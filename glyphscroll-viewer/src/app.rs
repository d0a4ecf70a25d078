use std::{num::NonZeroU32, path::Path};

use color_eyre::eyre::{Context, Report, Result, eyre};
use glow::HasContext;
use glutin::{
    config::{ConfigTemplateBuilder, GlConfig},
    context::{
        ContextApi, ContextAttributesBuilder, NotCurrentGlContext, PossiblyCurrentContext, Version,
    },
    display::{GetGlDisplay, GlDisplay},
    surface::{GlSurface, Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface},
};
use glutin_winit::DisplayBuilder;
use glyphscroll_core::{GlState, GlslVersion, TextSource, TextView};
use raw_window_handle::HasWindowHandle;
use tracing::{debug, error, info};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::cli::ViewerConfig;

/// Opens a window onto `file` and runs until it is closed.
pub fn run(config: ViewerConfig, file: &Path, swap: bool, start_line: usize) -> Result<()> {
    let source = if swap { TextSource::open_swap(file)? } else { TextSource::open(file)? };
    let title = format!("glyphscroll - {}", file.display());

    let event_loop = EventLoop::new().wrap_err("Failed to create event loop")?;
    let mut app = App {
        config,
        title,
        pending: Some((source, start_line)),
        state: None,
        error: None,
    };

    event_loop.run_app(&mut app).wrap_err("Event loop failed")?;

    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct App {
    config: ViewerConfig,
    title: String,
    /// Source waiting for a window to show it in.
    pending: Option<(TextSource, usize)>,
    state: Option<AppState>,
    error: Option<Report>,
}

struct AppState {
    window: Window,
    gl_context: PossiblyCurrentContext,
    gl_surface: Surface<WindowSurface>,
    gl: glow::Context,
    gl_state: GlState,
    view: TextView,
    editable: bool,
    wheel: WheelScroll,
}

/// Wheel movement not yet large enough to scroll a whole line.
#[derive(Debug, Default)]
struct WheelScroll {
    lines: f64,
    pixels: f64,
}

impl WheelScroll {
    /// Whole lines to scroll for `delta`, positive meaning down. Fractions
    /// carry over to later events.
    fn take_lines(&mut self, delta: MouseScrollDelta, step: usize, pixel_height: u32) -> isize {
        match delta {
            MouseScrollDelta::LineDelta(_, y) => {
                take_whole(&mut self.lines, -f64::from(y) * step as f64)
            },
            MouseScrollDelta::PixelDelta(position) => {
                take_whole(&mut self.pixels, -position.y / f64::from(pixel_height.max(1)))
            },
        }
    }
}

/// Adds `delta` to `pending` and removes the whole part, which is returned.
fn take_whole(pending: &mut f64, delta: f64) -> isize {
    *pending += delta;
    let whole = pending.trunc();
    *pending -= whole;
    whole as isize
}

impl App {
    fn fail(&mut self, event_loop: &ActiveEventLoop, e: Report) {
        error!("{e:#}");
        self.error.get_or_insert(e);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some((source, start_line)) = self.pending.take() else {
            return;
        };

        match AppState::new(event_loop, &self.config, &self.title, source, start_line) {
            Ok(state) => {
                state.window.request_redraw();
                self.state = Some(state);
            },
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        let outcome = match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
                Ok(())
            },
            WindowEvent::Resized(new_size) => state.resize(new_size.width, new_size.height),
            WindowEvent::KeyboardInput { event, .. } => state
                .handle_key(&event, self.config.scroll_step)
                .map(|quit| {
                    if quit {
                        event_loop.exit();
                    }
                }),
            WindowEvent::MouseWheel { delta, .. } => {
                state.handle_wheel(delta, self.config.scroll_step, self.config.pixel_height);
                Ok(())
            },
            WindowEvent::RedrawRequested => state.redraw(),
            _ => Ok(()),
        };

        if let Err(e) = outcome {
            self.fail(event_loop, e);
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.take() {
            info!(
                line = state.view.grid().applied_start_line(),
                known_lines = state.view.grid().source().known_lines(),
                "Closing viewer"
            );
            state.view.delete(&state.gl);
        }
    }
}

impl AppState {
    fn new(
        event_loop: &ActiveEventLoop,
        config: &ViewerConfig,
        title: &str,
        source: TextSource,
        start_line: usize,
    ) -> Result<Self> {
        let (width, height) = config.window_size;
        let window_attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(LogicalSize::new(width, height));

        let config_template = ConfigTemplateBuilder::new().with_alpha_size(8);

        let (window, gl_config) = DisplayBuilder::new()
            .with_window_attributes(Some(window_attrs))
            .build(event_loop, config_template, |configs| {
                // glutin never calls the picker with an empty iterator
                configs
                    .reduce(|accum, config| {
                        if config.num_samples() > accum.num_samples() { config } else { accum }
                    })
                    .expect("at least one GL config")
            })
            .map_err(|e| eyre!("Failed to build display: {e}"))?;

        let window = window.ok_or_else(|| eyre!("Failed to create window"))?;
        let gl_display = gl_config.display();
        let window_handle = window
            .window_handle()
            .wrap_err("Failed to get window handle")?
            .as_raw();

        let context_attrs = ContextAttributesBuilder::new()
            .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
            .build(Some(window_handle));

        let not_current_context = unsafe { gl_display.create_context(&gl_config, &context_attrs) }
            .wrap_err("Failed to create GL context")?;

        let size = window.inner_size();
        let surface_attrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(
            window_handle,
            non_zero(size.width),
            non_zero(size.height),
        );

        let gl_surface = unsafe { gl_display.create_window_surface(&gl_config, &surface_attrs) }
            .wrap_err("Failed to create GL surface")?;

        let gl_context = not_current_context
            .make_current(&gl_surface)
            .wrap_err("Failed to make GL context current")?;

        // vsync is best effort
        if let Err(e) = gl_surface.set_swap_interval(&gl_context, SwapInterval::Wait(non_zero(1))) {
            debug!("Swap interval not supported: {e}");
        }

        let gl = unsafe {
            glow::Context::from_loader_function_cstr(|name| gl_display.get_proc_address(name))
        };

        let editable = source.is_writable();
        let mut view = TextView::new(
            &gl,
            source,
            (size.width, size.height),
            config.grid,
            &GlslVersion::Gl330,
        )?;

        if let Err(e) = view.set_font(&gl, &config.font, config.pixel_height) {
            view.delete(&gl);
            return Err(e).wrap_err("Failed to load font");
        }
        view.set_start_line(start_line);

        info!(
            width = size.width,
            height = size.height,
            grid = ?view.grid().dimensions(),
            editable,
            "Viewer window ready"
        );

        Ok(Self {
            window,
            gl_context,
            gl_surface,
            gl,
            gl_state: GlState::new(),
            view,
            editable,
            wheel: WheelScroll::default(),
        })
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }

        self.gl_surface
            .resize(&self.gl_context, non_zero(width), non_zero(height));
        self.view.resize((width, height))?;
        self.window.request_redraw();
        Ok(())
    }

    /// Returns `true` when the key asks to quit.
    fn handle_key(&mut self, event: &KeyEvent, step: usize) -> Result<bool> {
        if event.state != ElementState::Pressed {
            return Ok(false);
        }

        let rows = self.view.grid().dimensions().1.max(1);
        let step = step as isize;
        match &event.logical_key {
            Key::Named(NamedKey::Escape) => return Ok(true),
            Key::Named(NamedKey::ArrowDown) => self.view.scroll_by(step),
            Key::Named(NamedKey::ArrowUp) => self.view.scroll_by(-step),
            Key::Named(NamedKey::PageDown) => self.view.scroll_by(rows as isize),
            Key::Named(NamedKey::PageUp) => self.view.scroll_by(-(rows as isize)),
            Key::Named(NamedKey::Home) => self.view.set_start_line(0),
            Key::Named(NamedKey::Enter) if self.editable => self.view.insert_text("\n")?,
            Key::Character(text) if self.editable => self.view.insert_text(text)?,
            _ => return Ok(false),
        }

        self.window.request_redraw();
        Ok(false)
    }

    fn handle_wheel(&mut self, delta: MouseScrollDelta, step: usize, pixel_height: u32) {
        let lines = self.wheel.take_lines(delta, step, pixel_height);

        if lines != 0 {
            self.view.scroll_by(lines);
            self.window.request_redraw();
        }
    }

    fn redraw(&mut self) -> Result<()> {
        let kind = self.view.sync(&self.gl);
        debug!(?kind, line = self.view.grid().applied_start_line(), "Synced viewport");

        let (w, h) = self.view.grid().viewport();
        self.gl_state
            .viewport(&self.gl, 0, 0, w as i32, h as i32)
            .clear_color(&self.gl, 0.0, 0.0, 0.0, 1.0);

        unsafe { self.gl.clear(glow::COLOR_BUFFER_BIT) };

        self.view.render(&self.gl, &mut self.gl_state)?;

        self.gl_surface
            .swap_buffers(&self.gl_context)
            .wrap_err("Failed to swap buffers")
    }
}

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}
