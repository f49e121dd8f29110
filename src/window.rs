//! Window management using winit

use std::sync::Arc;
use thiserror::Error;
use winit::{
    dpi::PhysicalSize,
    error::{EventLoopError, OsError},
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    window::{Window as WinitWindow, WindowBuilder},
};

#[derive(Error, Debug)]
pub enum WindowError {
    #[error("Failed to create event loop: {0}")]
    EventLoop(#[from] EventLoopError),
    #[error("Failed to create window: {0}")]
    Os(#[from] OsError),
    #[error("Setup failed: {0}")]
    Setup(String),
}

/// Wrapper around winit window with additional state
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
    resized: bool,
    close_requested: bool,
}

impl Window {
    pub fn new(
        event_loop: &EventLoop<()>,
        title: &str,
        width: u32,
        height: u32,
    ) -> Result<Self, WindowError> {
        let window = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .build(event_loop)?;

        Ok(Self {
            window: Arc::new(window),
            width,
            height,
            resized: false,
            close_requested: false,
        })
    }

    pub fn window_arc(&self) -> Arc<WinitWindow> {
        Arc::clone(&self.window)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Check if window was resized since last frame
    pub fn was_resized(&self) -> bool {
        self.resized
    }

    pub fn clear_resize_flag(&mut self) {
        self.resized = false;
    }

    pub fn should_close(&self) -> bool {
        self.close_requested
    }

    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(size) => {
                self.width = size.width;
                self.height = size.height;
                self.resized = true;
            }
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            _ => {}
        }
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }
}

/// Open a window and call `setup` once, then `frame` on every iteration of
/// the event loop until the window closes.
///
/// `setup` runs before the loop starts so GPU initialization can see the
/// window's real surface.
pub fn run<S, F, T, E>(
    title: &str,
    width: u32,
    height: u32,
    setup: S,
    mut frame: F,
) -> Result<(), WindowError>
where
    S: FnOnce(&Window) -> Result<T, E>,
    E: std::fmt::Display,
    F: FnMut(&mut Window, &mut T) -> bool + 'static,
    T: 'static,
{
    let event_loop = EventLoop::new()?;
    let mut window = Window::new(&event_loop, title, width, height)?;
    let mut state = setup(&window).map_err(|e| WindowError::Setup(e.to_string()))?;

    event_loop.run(move |event, elwt: &EventLoopWindowTarget<()>| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { event, .. } => {
                window.handle_event(&event);
                if window.should_close() {
                    elwt.exit();
                }
            }
            Event::AboutToWait => {
                if !frame(&mut window, &mut state) {
                    elwt.exit();
                    return;
                }
                window.request_redraw();
            }
            _ => {}
        }
    })?;
    Ok(())
}
