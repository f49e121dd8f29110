//! Two-pass CRT monitor pipeline
//!
//! 1. Scene pass - lit geometry into an offscreen target (T0)
//! 2. CRT pass - full-screen emulation reading T0 and the previous output,
//!    writing T1
//! 3. Monitor pass - casing plus a screen quad textured with T1, drawn into
//!    the presented framebuffer
//!
//! Each pass has a WGSL program and GPU recorder, plus the same shading math
//! in Rust that the software backend evaluates per pixel.

/// WGSL mirror of [`SceneUniforms`], prepended to every program that binds it
macro_rules! scene_uniforms_wgsl {
    () => {
        r#"
struct SceneUniforms {
    model_matrix: mat4x4<f32>,
    view_matrix: mat4x4<f32>,
    projection_matrix: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    light_position: vec3<f32>,
    ambient_intensity: f32,
    light_color: vec3<f32>,
    diffuse_intensity: f32,
    camera_position: vec3<f32>,
    specular_intensity: f32,
    specular_power: f32,
    padding1: f32,
    padding2: f32,
    padding3: f32,
}
"#
    };
}

/// WGSL helpers of the lit programs, matching `normalize_or_zero` on the host
macro_rules! lighting_wgsl {
    () => {
        r#"
fn safe_normalize(x: vec3<f32>) -> vec3<f32> {
    return select(vec3<f32>(0.0), normalize(x), dot(x, x) > 0.0);
}
"#
    };
}

pub mod crt;
pub mod monitor;
pub mod scene_renderer;

pub use crt::{CrtPostProcessor, CrtSettings};
pub use monitor::MonitorCompositor;
pub use scene_renderer::SceneRenderer;

use crate::backend::traits::*;
use crate::backend::types::{BufferDescriptor, BufferUsage};
use crate::layout::{LayoutError, ProgramReflection};
use crate::resources::{Mesh, QuadMesh};
use crate::uniforms::{
    CrtUniforms, MaterialUniforms, QuadVertex, SceneUniforms, SceneVertex, UniformLayout,
};
use glam::Vec4;

/// Index of a mesh uploaded to a [`FrameBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub(crate) u32);

/// One draw of the scene pass.
#[derive(Debug, Clone, Copy)]
pub struct SceneDraw {
    pub mesh: MeshHandle,
    pub uniforms: SceneUniforms,
}

/// Everything the monitor pass needs for one frame.
#[derive(Debug, Clone, Copy)]
pub struct MonitorDraw {
    pub casing: MeshHandle,
    pub casing_uniforms: SceneUniforms,
    pub material: MaterialUniforms,
    pub screen: MeshHandle,
    pub screen_uniforms: SceneUniforms,
    pub clear_color: Vec4,
}

/// Executes the three passes of a frame.
///
/// Targets are owned by the caller and only borrowed for the duration of a
/// call. All passes of a frame are issued between `begin_frame` and
/// `end_frame`, in pipeline order. A frame that fails after `begin_frame`
/// is closed with `abort_frame` instead.
pub trait FrameBackend {
    /// Offscreen color image
    type Target;

    fn create_target(&mut self, width: u32, height: u32, label: &str)
        -> BackendResult<Self::Target>;

    fn destroy_target(&mut self, target: Self::Target);

    fn upload_mesh(&mut self, mesh: &Mesh) -> BackendResult<MeshHandle>;

    fn upload_quad(&mut self, quad: &QuadMesh) -> BackendResult<MeshHandle>;

    /// Size of the presented framebuffer
    fn output_size(&self) -> (u32, u32);

    fn resize_output(&mut self, width: u32, height: u32) -> BackendResult<()>;

    fn begin_frame(&mut self) -> BackendResult<()>;

    fn draw_scene(
        &mut self,
        target: &mut Self::Target,
        clear_color: Vec4,
        draws: &[SceneDraw],
    ) -> BackendResult<()>;

    /// `previous` is `None` on the first frame and after a resize.
    fn post_process(
        &mut self,
        scene: &Self::Target,
        previous: Option<&Self::Target>,
        output: &mut Self::Target,
        uniforms: &CrtUniforms,
    ) -> BackendResult<()>;

    fn composite(&mut self, screen: &Self::Target, monitor: &MonitorDraw) -> BackendResult<()>;

    fn end_frame(&mut self) -> BackendResult<()>;

    /// Close the open frame without presenting anything
    fn abort_frame(&mut self);
}

/// Vertex and index buffers of an uploaded mesh
#[derive(Debug, Clone, Copy)]
pub struct GpuMesh {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
}

impl GpuMesh {
    pub fn upload<B: GraphicsBackend>(
        backend: &mut B,
        label: &str,
        vertex_bytes: &[u8],
        indices: &[u32],
    ) -> BackendResult<Self> {
        let vertex_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{label} Vertices")),
                size: vertex_bytes.len() as u64,
                usage: BufferUsage::VERTEX,
            },
            vertex_bytes,
        )?;

        let index_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{label} Indices")),
                size: std::mem::size_of_val(indices) as u64,
                usage: BufferUsage::INDEX,
            },
            bytemuck::cast_slice(indices),
        )?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        })
    }
}

/// A uniform buffer and the bind group exposing it at binding 0
#[derive(Debug, Clone, Copy)]
pub struct UniformSlot {
    pub buffer: BufferHandle,
    pub bind_group: BindGroupHandle,
}

impl UniformSlot {
    pub fn new<B: GraphicsBackend, T: UniformLayout>(
        backend: &mut B,
        layout: BindGroupLayoutHandle,
        label: &str,
    ) -> BackendResult<Self> {
        let buffer =
            backend.create_buffer(&BufferDescriptor::uniform(label, T::byte_size() as u64))?;
        let bind_group =
            backend.create_bind_group(layout, &[(0, BindGroupEntry::Buffer { buffer })])?;
        Ok(Self { buffer, bind_group })
    }

    pub fn write<B: GraphicsBackend, T: UniformLayout>(&self, backend: &mut B, value: &T) {
        backend.write_buffer(self.buffer, 0, value.as_bytes());
    }
}

/// Parse every shipped WGSL program and check it against the host records.
pub fn validate_programs() -> Result<(), LayoutError> {
    let scene = ProgramReflection::parse("scene", scene_renderer::SCENE_SHADER)?;
    scene.check_uniform::<SceneUniforms>()?;
    scene.check_vertex_inputs(&[SceneVertex::layout()])?;

    let crt = ProgramReflection::parse("crt", crt::CRT_SHADER)?;
    crt.check_uniform::<CrtUniforms>()?;
    crt.check_vertex_inputs(&[QuadVertex::layout()])?;

    let casing = ProgramReflection::parse("monitor_casing", monitor::CASING_SHADER)?;
    casing.check_uniform::<SceneUniforms>()?;
    casing.check_uniform::<MaterialUniforms>()?;
    casing.check_vertex_inputs(&[SceneVertex::layout()])?;

    let screen = ProgramReflection::parse("monitor_screen", monitor::SCREEN_SHADER)?;
    screen.check_uniform::<SceneUniforms>()?;
    screen.check_vertex_inputs(&[QuadVertex::layout()])?;

    log::debug!("Uniform layouts validated against all programs");
    Ok(())
}

/// Hermite step, identical to WGSL `smoothstep`
pub(crate) fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
