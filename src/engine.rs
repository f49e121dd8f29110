//! GPU frame backend and the windowed engine built on it

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::backend::wgpu_backend::WgpuBackend;
use crate::frame::{FrameInputs, FrameOrchestrator, FrameStatus};
use crate::pipeline::{
    validate_programs, CrtPostProcessor, FrameBackend, GpuMesh, MeshHandle, MonitorCompositor,
    MonitorDraw, SceneDraw, SceneRenderer,
};
use crate::resources::{Mesh, QuadMesh};
use crate::uniforms::CrtUniforms;
use crate::RendererConfig;
use glam::Vec4;
use std::sync::Arc;
use std::time::Instant;
use winit::window::Window as WinitWindow;

/// Format of the scene target and the CRT outputs
pub const TARGET_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

/// Offscreen color texture owned by the frame orchestrator
#[derive(Debug)]
pub struct GpuTarget {
    texture: TextureHandle,
    view: TextureViewHandle,
    width: u32,
    height: u32,
}

impl GpuTarget {
    pub fn view(&self) -> TextureViewHandle {
        self.view
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Depth attachment recreated whenever the color target size changes
struct DepthTarget {
    texture: TextureHandle,
    view: TextureViewHandle,
    size: (u32, u32),
}

fn ensure_depth(
    backend: &mut WgpuBackend,
    slot: &mut Option<DepthTarget>,
    size: (u32, u32),
    label: &str,
) -> BackendResult<TextureViewHandle> {
    if let Some(depth) = slot {
        if depth.size == size {
            return Ok(depth.view);
        }
    }
    if let Some(old) = slot.take() {
        backend.destroy_texture(old.texture, old.view);
    }

    let texture = backend.create_texture(&TextureDescriptor::depth(label, size.0, size.1))?;
    let view = backend.create_texture_view(texture)?;
    log::debug!("Created {} ({}x{})", label, size.0, size.1);
    *slot = Some(DepthTarget {
        texture,
        view,
        size,
    });
    Ok(view)
}

/// [`FrameBackend`] issuing the three passes through wgpu
pub struct WgpuRenderer {
    backend: WgpuBackend,
    scene_renderer: SceneRenderer,
    crt: CrtPostProcessor,
    monitor: MonitorCompositor,
    meshes: Vec<GpuMesh>,
    scene_depth: Option<DepthTarget>,
    surface_depth: Option<DepthTarget>,
    frame: Option<FrameContext>,
}

impl WgpuRenderer {
    /// Create the device for `window` and build all pipelines.
    ///
    /// Fails with [`BackendError::Layout`] if a program disagrees with the
    /// host uniform records.
    pub fn new(window: Arc<WinitWindow>, vsync: bool) -> BackendResult<Self> {
        validate_programs()?;
        let backend = WgpuBackend::new(window, vsync)?;
        Self::from_backend(backend)
    }

    /// Build the pipelines on an already initialized backend
    pub fn from_backend(mut backend: WgpuBackend) -> BackendResult<Self> {
        let surface_format = backend.swapchain_format();
        let scene_renderer = SceneRenderer::new(&mut backend, TARGET_FORMAT)?;
        let crt = CrtPostProcessor::new(&mut backend, TARGET_FORMAT)?;
        let monitor = MonitorCompositor::new(&mut backend, surface_format)?;
        log::info!("wgpu renderer ready (surface format {:?})", surface_format);

        Ok(Self {
            backend,
            scene_renderer,
            crt,
            monitor,
            meshes: Vec::new(),
            scene_depth: None,
            surface_depth: None,
            frame: None,
        })
    }

    pub fn backend(&self) -> &WgpuBackend {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut WgpuBackend {
        &mut self.backend
    }

    fn push_mesh(&mut self, mesh: GpuMesh) -> MeshHandle {
        self.meshes.push(mesh);
        MeshHandle(self.meshes.len() as u32 - 1)
    }
}

impl FrameBackend for WgpuRenderer {
    type Target = GpuTarget;

    fn create_target(&mut self, width: u32, height: u32, label: &str) -> BackendResult<GpuTarget> {
        let texture = self.backend.create_texture(&TextureDescriptor::render_target(
            label,
            width,
            height,
            TARGET_FORMAT,
        ))?;
        let view = self.backend.create_texture_view(texture)?;
        log::debug!("Allocated GPU target '{}' ({}x{})", label, width, height);
        Ok(GpuTarget {
            texture,
            view,
            width,
            height,
        })
    }

    fn destroy_target(&mut self, target: GpuTarget) {
        self.crt.forget_view(&mut self.backend, target.view);
        self.monitor.forget_view(&mut self.backend, target.view);
        self.backend.destroy_texture(target.texture, target.view);
    }

    fn upload_mesh(&mut self, mesh: &Mesh) -> BackendResult<MeshHandle> {
        let gpu = GpuMesh::upload(&mut self.backend, &mesh.name, mesh.vertex_bytes(), &mesh.indices)?;
        Ok(self.push_mesh(gpu))
    }

    fn upload_quad(&mut self, quad: &QuadMesh) -> BackendResult<MeshHandle> {
        let gpu = GpuMesh::upload(&mut self.backend, "Screen Quad", quad.vertex_bytes(), &quad.indices)?;
        Ok(self.push_mesh(gpu))
    }

    fn output_size(&self) -> (u32, u32) {
        self.backend.surface_size()
    }

    fn resize_output(&mut self, width: u32, height: u32) -> BackendResult<()> {
        self.backend.resize(width, height);
        Ok(())
    }

    fn begin_frame(&mut self) -> BackendResult<()> {
        let frame = self.backend.begin_frame()?;
        ensure_depth(
            &mut self.backend,
            &mut self.surface_depth,
            (frame.width, frame.height),
            "Monitor Depth",
        )?;
        self.frame = Some(frame);
        Ok(())
    }

    fn draw_scene(
        &mut self,
        target: &mut GpuTarget,
        clear_color: Vec4,
        draws: &[SceneDraw],
    ) -> BackendResult<()> {
        let size = target.size();
        let depth_view = ensure_depth(&mut self.backend, &mut self.scene_depth, size, "Scene Depth")?;
        self.scene_renderer.record(
            &mut self.backend,
            &self.meshes,
            target.view,
            depth_view,
            size,
            clear_color,
            draws,
        )
    }

    fn post_process(
        &mut self,
        scene: &GpuTarget,
        previous: Option<&GpuTarget>,
        output: &mut GpuTarget,
        uniforms: &CrtUniforms,
    ) -> BackendResult<()> {
        let previous = previous.filter(|p| p.size() == output.size());
        self.crt.record(
            &mut self.backend,
            scene.view,
            previous.map(GpuTarget::view),
            output.view,
            output.size(),
            uniforms,
        )
    }

    fn composite(&mut self, screen: &GpuTarget, monitor: &MonitorDraw) -> BackendResult<()> {
        let Some(frame) = self.frame.as_ref() else {
            return Err(BackendError::AcquireImageFailed(
                "composite called outside a frame".into(),
            ));
        };
        let Some(depth) = self.surface_depth.as_ref() else {
            return Err(BackendError::TextureCreationFailed("monitor depth missing".into()));
        };
        self.monitor.record(
            &mut self.backend,
            &self.meshes,
            frame.swapchain_view,
            depth.view,
            (frame.width, frame.height),
            screen.view,
            monitor,
        )
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.frame = None;
        self.backend.end_frame()
    }

    fn abort_frame(&mut self) {
        self.frame = None;
        self.backend.abort_frame();
    }
}

impl Drop for WgpuRenderer {
    fn drop(&mut self) {
        for depth in [self.scene_depth.take(), self.surface_depth.take()].into_iter().flatten() {
            self.backend.destroy_texture(depth.texture, depth.view);
        }
        for mesh in self.meshes.drain(..) {
            self.backend.destroy_buffer(mesh.vertex_buffer);
            self.backend.destroy_buffer(mesh.index_buffer);
        }
    }
}

/// Windowed renderer: a [`WgpuRenderer`] driven by a frame orchestrator
/// with wall-clock frame times
pub struct Engine {
    window: Arc<WinitWindow>,
    orchestrator: FrameOrchestrator<WgpuRenderer>,
    last_frame: Option<Instant>,
}

impl Engine {
    pub fn new(window: Arc<WinitWindow>, config: &RendererConfig) -> BackendResult<Self> {
        let renderer = WgpuRenderer::new(Arc::clone(&window), config.vsync)?;
        let orchestrator = FrameOrchestrator::new(
            renderer,
            config.crt.clone(),
            (config.offscreen_width, config.offscreen_height),
        );
        Ok(Self {
            window,
            orchestrator,
            last_frame: None,
        })
    }

    pub fn window(&self) -> &WinitWindow {
        &self.window
    }

    pub fn orchestrator(&self) -> &FrameOrchestrator<WgpuRenderer> {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut FrameOrchestrator<WgpuRenderer> {
        &mut self.orchestrator
    }

    /// The GPU backend, for uploading meshes
    pub fn renderer_mut(&mut self) -> &mut WgpuRenderer {
        self.orchestrator.backend_mut()
    }

    /// Handle a window resize. A zero size (minimized) is ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> BackendResult<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.orchestrator.backend_mut().resize_output(width, height)
    }

    /// Render one frame, timing it against the previous call
    pub fn render(&mut self, inputs: &FrameInputs<'_>) -> BackendResult<FrameStatus> {
        let now = Instant::now();
        let elapsed = self
            .last_frame
            .map(|last| now.duration_since(last))
            .unwrap_or_default();
        self.last_frame = Some(now);
        self.orchestrator.render_frame(inputs, elapsed)
    }
}
