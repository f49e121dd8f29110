//! CRT Monitor - renders a lit 3D scene as seen on an old CRT monitor
//!
//! Each frame runs three passes:
//! - **Scene**: Phong-lit geometry into an offscreen target
//! - **CRT**: barrel distortion, scanlines, glow, vignette, flicker, noise
//!   and phosphor persistence against the previous output
//! - **Monitor**: the CRT image mapped onto the screen of a lit monitor casing
//!
//! Two backends implement the passes:
//! - **wgpu**: the windowed GPU renderer ([`WgpuRenderer`])
//! - **Software**: a deterministic CPU renderer for tests and headless
//!   snapshots ([`SoftwareRenderer`])

pub mod backend;
pub mod engine;
pub mod frame;
pub mod layout;
pub mod pipeline;
pub mod resources;
pub mod scene;
pub mod software;
pub mod uniforms;
pub mod window;

pub use backend::{BackendError, BackendResult};
pub use engine::{Engine, GpuTarget, WgpuRenderer};
pub use frame::{FrameInputs, FrameOrchestrator, FrameStatus, HistoryBuffer};
pub use layout::LayoutError;
pub use pipeline::{CrtSettings, FrameBackend, MeshHandle};
pub use software::{ColorImage, SoftwareRenderer};
pub use window::Window;

// Re-export wgpu backend for direct access
pub use backend::wgpu_backend::WgpuBackend;

/// Configuration for the windowed renderer
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window title
    pub title: String,
    /// Initial window width
    pub width: u32,
    /// Initial window height
    pub height: u32,
    /// Enable vsync
    pub vsync: bool,
    /// Size of the scene target shown on the monitor
    pub offscreen_width: u32,
    pub offscreen_height: u32,
    /// Initial CRT effect parameters
    pub crt: CrtSettings,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            title: "CRT Monitor".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            offscreen_width: 800,
            offscreen_height: 600,
            crt: CrtSettings::default(),
        }
    }
}

impl RendererConfig {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn with_offscreen_size(mut self, width: u32, height: u32) -> Self {
        self.offscreen_width = width;
        self.offscreen_height = height;
        self
    }

    pub fn with_crt(mut self, crt: CrtSettings) -> Self {
        self.crt = crt;
        self
    }
}

/// Route `log` output to stderr, filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
