//! Low-level GPU abstraction used by the render passes
//!
//! Resources live inside the backend and are addressed through small copyable
//! handles. Render pass commands are recorded between `begin_render_pass` and
//! `end_render_pass`.

use crate::backend::types::*;
use crate::layout::LayoutError;
use std::sync::Arc;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create surface: {0}")]
    SurfaceCreationFailed(String),
    #[error("Failed to create device: {0}")]
    DeviceCreationFailed(String),
    #[error("Failed to acquire next image: {0}")]
    AcquireImageFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create pipeline: {0}")]
    PipelineCreationFailed(String),
    #[error("Uniform layout mismatch: {0}")]
    Layout(#[from] LayoutError),
    #[error("Failed to write image: {0}")]
    ImageExport(String),
    #[error("Surface lost")]
    SurfaceLost,
    #[error("Out of memory")]
    OutOfMemory,
}

impl BackendError {
    /// Errors caused by a resource that may be available again on a later
    /// frame. The frame is skipped instead of failing the renderer.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::AcquireImageFailed(_)
                | BackendError::BufferCreationFailed(_)
                | BackendError::TextureCreationFailed(_)
                | BackendError::SurfaceLost
                | BackendError::OutOfMemory
        )
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a texture view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureViewHandle(pub(crate) u64);

/// Handle to a sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerHandle(pub(crate) u64);

/// Handle to a render pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPipelineHandle(pub(crate) u64);

/// Handle to a bind group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupHandle(pub(crate) u64);

/// Handle to a bind group layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupLayoutHandle(pub(crate) u64);

#[derive(Debug, Clone)]
pub enum BindGroupEntry {
    Buffer { buffer: BufferHandle },
    Texture(TextureViewHandle),
    Sampler(SamplerHandle),
}

#[derive(Debug, Clone)]
pub struct BindGroupLayoutEntry {
    pub binding: u32,
    pub visibility: ShaderStageFlags,
    pub ty: BindingType,
}

impl BindGroupLayoutEntry {
    pub fn uniform(binding: u32, visibility: ShaderStageFlags) -> Self {
        Self {
            binding,
            visibility,
            ty: BindingType::UniformBuffer,
        }
    }

    pub fn texture(binding: u32, filterable: bool) -> Self {
        Self {
            binding,
            visibility: ShaderStageFlags::FRAGMENT,
            ty: BindingType::Texture { filterable },
        }
    }

    pub fn sampler(binding: u32) -> Self {
        Self {
            binding,
            visibility: ShaderStageFlags::FRAGMENT,
            ty: BindingType::Sampler,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderStageFlags(u32);

impl ShaderStageFlags {
    pub const VERTEX: Self = Self(1 << 0);
    pub const FRAGMENT: Self = Self(1 << 1);
    pub const VERTEX_FRAGMENT: Self = Self((1 << 0) | (1 << 1));

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

#[derive(Debug, Clone)]
pub enum BindingType {
    UniformBuffer,
    Texture { filterable: bool },
    Sampler,
}

/// Render pipeline descriptor. The program must define `vs_main` and, when a
/// fragment stage is requested, `fs_main`.
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor {
    pub label: Option<String>,
    pub shader: String,
    pub has_fragment: bool,
    pub vertex_layouts: Vec<VertexBufferLayout>,
    pub bind_group_layouts: Vec<BindGroupLayoutHandle>,
    pub front_face: FrontFace,
    pub cull_mode: CullMode,
    pub depth_stencil: Option<DepthStencilState>,
    pub color_format: TextureFormat,
}

#[derive(Debug, Clone)]
pub struct DepthStencilState {
    pub format: TextureFormat,
    pub depth_write_enabled: bool,
    pub depth_compare: CompareFunction,
}

#[derive(Debug, Clone)]
pub struct ColorAttachment {
    pub view: TextureViewHandle,
    pub load_op: LoadOp,
}

#[derive(Debug, Clone)]
pub enum LoadOp {
    Clear([f32; 4]),
    Load,
}

#[derive(Debug, Clone)]
pub struct DepthStencilAttachment {
    pub view: TextureViewHandle,
    pub depth_clear_value: f32,
}

#[derive(Debug, Clone)]
pub struct RenderPassDescriptor {
    pub label: Option<String>,
    pub color_attachment: ColorAttachment,
    pub depth_stencil_attachment: Option<DepthStencilAttachment>,
}

/// Frame context returned when beginning a frame
pub struct FrameContext {
    pub swapchain_view: TextureViewHandle,
    pub width: u32,
    pub height: u32,
}

/// Main graphics backend trait
pub trait GraphicsBackend: Sized {
    fn new(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self>;

    /// Resize the swapchain
    fn resize(&mut self, width: u32, height: u32);

    /// Actual surface size (may be clamped by device limits)
    fn surface_size(&self) -> (u32, u32);

    /// Largest width or height a 2D texture may have
    fn max_texture_dimension(&self) -> u32;

    fn begin_frame(&mut self) -> BackendResult<FrameContext>;

    /// Submit recorded work and present
    fn end_frame(&mut self) -> BackendResult<()>;

    /// Drop recorded work and release the swapchain image unpresented
    fn abort_frame(&mut self);

    fn swapchain_format(&self) -> TextureFormat;

    // Resource creation

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle>;

    fn create_buffer_init(&mut self, desc: &BufferDescriptor, data: &[u8])
        -> BackendResult<BufferHandle>;

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    fn create_texture_view(&mut self, texture: TextureHandle) -> BackendResult<TextureViewHandle>;

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle>;

    // Pipeline creation

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle>;

    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle>;

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle>;

    // Command recording

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor);

    fn end_render_pass(&mut self);

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle);

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle);

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle);

    fn set_index_buffer(&mut self, buffer: BufferHandle);

    fn set_viewport(&mut self, width: f32, height: f32);

    fn draw_indexed(&mut self, indices: std::ops::Range<u32>);

    // Resource cleanup

    fn destroy_buffer(&mut self, buffer: BufferHandle);

    fn destroy_texture(&mut self, texture: TextureHandle, view: TextureViewHandle);

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle);
}
