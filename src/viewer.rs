//! Standalone window backed by winit.
//!
//! ```no_run
//! # use horizon::{Options, Viewer};
//! Viewer::builder()
//!     .with_options(Options::default())
//!     .build()
//!     .run()
//!     .unwrap();
//! ```

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{Window, WindowId},
};

use crate::{error::HorizonError, input::KeyAction, options::Options, Engine};

// ── Builder ──────────────────────────────────────────────────────────────

/// Fluent builder for [`Viewer`].
pub struct ViewerBuilder {
    options: Options,
    title: Option<String>,
}

impl ViewerBuilder {
    fn new() -> Self {
        Self {
            options: Options::default(),
            title: None,
        }
    }

    /// Override the default options.
    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Set the window title (defaults to `display.title`).
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Consume the builder and produce a [`Viewer`].
    #[must_use]
    pub fn build(self) -> Viewer {
        let title = self
            .title
            .unwrap_or_else(|| self.options.display.title.clone());
        Viewer {
            options: self.options,
            title,
        }
    }
}

// ── Viewer ───────────────────────────────────────────────────────────────

/// A window presenting the black hole renderer.
///
/// Construct via [`Viewer::builder`], then call [`run`](Self::run) to
/// enter the event loop.
pub struct Viewer {
    options: Options,
    title: String,
}

impl Viewer {
    /// Start a new builder.
    #[must_use]
    pub fn builder() -> ViewerBuilder {
        ViewerBuilder::new()
    }

    /// Open the window and run the event loop. Blocks until the window is
    /// closed.
    ///
    /// # Errors
    ///
    /// [`HorizonError::Viewer`] if the event loop fails, or the setup error
    /// that prevented the engine from starting.
    pub fn run(self) -> Result<(), HorizonError> {
        let event_loop =
            EventLoop::new().map_err(|e| HorizonError::Viewer(e.to_string()))?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = ViewerApp {
            window: None,
            engine: None,
            options: Some(self.options),
            title: self.title,
            setup_error: None,
        };
        event_loop
            .run_app(&mut app)
            .map_err(|e| HorizonError::Viewer(e.to_string()))?;
        app.setup_error.map_or(Ok(()), Err)
    }
}

// ── Winit app ────────────────────────────────────────────────────────────

struct ViewerApp {
    window: Option<Arc<Window>>,
    engine: Option<Engine>,
    options: Option<Options>,
    title: String,
    setup_error: Option<HorizonError>,
}

fn viewport_size(inner: winit::dpi::PhysicalSize<u32>) -> (u32, u32) {
    (inner.width.max(1), inner.height.max(1))
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let Some(options) = self.options.take() else {
            return;
        };

        let attrs = Window::default_attributes()
            .with_title(&self.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                options.display.width,
                options.display.height,
            ));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("failed to create window: {e}");
                self.setup_error = Some(HorizonError::Viewer(e.to_string()));
                event_loop.exit();
                return;
            }
        };

        let size = viewport_size(window.inner_size());
        match pollster::block_on(Engine::new(window.clone(), size, options)) {
            Ok(engine) => self.engine = Some(engine),
            Err(e) => {
                log::error!("failed to initialize engine: {e}");
                self.setup_error = Some(e);
                event_loop.exit();
                return;
            }
        }
        window.request_redraw();
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: WindowId,
        event: WindowEvent,
    ) {
        if matches!(event, WindowEvent::CloseRequested) {
            event_loop.exit();
            return;
        }
        let (Some(window), Some(engine)) = (&self.window, &mut self.engine) else {
            return;
        };

        match event {
            WindowEvent::Resized(size) => {
                let (w, h) = viewport_size(size);
                engine.resize(w, h);
            }

            WindowEvent::RedrawRequested => {
                match engine.render() {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                        let (w, h) = viewport_size(window.inner_size());
                        engine.resize(w, h);
                    }
                    Err(e) => log::error!("render error: {e:?}"),
                }
                window.request_redraw();
            }

            WindowEvent::CursorMoved { position, .. } => {
                engine.handle_cursor(position.x, position.y);
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                if engine.handle_key(&format!("{code:?}")) == Some(KeyAction::Quit) {
                    event_loop.exit();
                }
            }

            _ => (),
        }
    }
}
