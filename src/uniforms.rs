//! Fixed-layout records shared by host code and the WGSL programs
//!
//! Every record is `#[repr(C)]` and `Pod`, so its bytes can be handed to the
//! GPU as-is. Three-component vectors are packed with the scalar that follows
//! them, which reproduces the WGSL uniform layout (vec3 aligned to 16 bytes,
//! 12 bytes wide). The `padding*` fields are part of that contract and must
//! not be removed or reordered.

use crate::backend::types::{VertexAttribute, VertexBufferLayout, VertexFormat};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};
use std::mem::{offset_of, size_of};

/// Name, byte offset and byte size of one record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: &'static str,
    pub offset: u32,
    pub size: u32,
}

impl FieldLayout {
    const fn new(name: &'static str, offset: usize, size: usize) -> Self {
        Self {
            name,
            offset: offset as u32,
            size: size as u32,
        }
    }
}

/// A record whose layout is mirrored by a struct in a WGSL program.
pub trait UniformLayout: Pod {
    /// Name of the matching WGSL struct
    const WGSL_NAME: &'static str;

    /// Host-side field table, in declaration order
    fn field_layouts() -> Vec<FieldLayout>;

    /// Total size in bytes
    fn byte_size() -> u32 {
        size_of::<Self>() as u32
    }

    fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Rebuild a record from bytes produced by [`UniformLayout::as_bytes`].
    ///
    /// Returns `None` when the slice length does not match the record size.
    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bytemuck::try_pod_read_unaligned(bytes).ok()
    }
}

/// One vertex of scene geometry.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
}

impl SceneVertex {
    pub fn new(position: Vec3, normal: Vec3, tex_coord: Vec2) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }

    pub fn layout() -> VertexBufferLayout {
        VertexBufferLayout {
            array_stride: size_of::<Self>() as u64,
            attributes: vec![
                VertexAttribute {
                    location: 0,
                    format: VertexFormat::Float32x3,
                    offset: offset_of!(Self, position) as u64,
                },
                VertexAttribute {
                    location: 1,
                    format: VertexFormat::Float32x3,
                    offset: offset_of!(Self, normal) as u64,
                },
                VertexAttribute {
                    location: 2,
                    format: VertexFormat::Float32x2,
                    offset: offset_of!(Self, tex_coord) as u64,
                },
            ],
        }
    }
}

/// Vertex of the full-screen quad and of the monitor screen quad.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: Vec2,
    pub tex_coord: Vec2,
}

impl QuadVertex {
    pub fn new(position: Vec2, tex_coord: Vec2) -> Self {
        Self {
            position,
            tex_coord,
        }
    }

    pub fn layout() -> VertexBufferLayout {
        VertexBufferLayout {
            array_stride: size_of::<Self>() as u64,
            attributes: vec![
                VertexAttribute {
                    location: 0,
                    format: VertexFormat::Float32x2,
                    offset: offset_of!(Self, position) as u64,
                },
                VertexAttribute {
                    location: 1,
                    format: VertexFormat::Float32x2,
                    offset: offset_of!(Self, tex_coord) as u64,
                },
            ],
        }
    }
}

/// Per-draw transform and lighting state.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneUniforms {
    pub model_matrix: Mat4,
    pub view_matrix: Mat4,
    pub projection_matrix: Mat4,
    pub normal_matrix: Mat4,
    pub light_position: Vec3,
    pub ambient_intensity: f32,
    pub light_color: Vec3,
    pub diffuse_intensity: f32,
    pub camera_position: Vec3,
    pub specular_intensity: f32,
    pub specular_power: f32,
    pub padding1: f32,
    pub padding2: f32,
    pub padding3: f32,
}

impl Default for SceneUniforms {
    fn default() -> Self {
        Self {
            model_matrix: Mat4::IDENTITY,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            normal_matrix: Mat4::IDENTITY,
            light_position: Vec3::new(0.0, 5.0, 5.0),
            ambient_intensity: 0.1,
            light_color: Vec3::ONE,
            diffuse_intensity: 0.8,
            camera_position: Vec3::ZERO,
            specular_intensity: 0.5,
            specular_power: 32.0,
            padding1: 0.0,
            padding2: 0.0,
            padding3: 0.0,
        }
    }
}

impl SceneUniforms {
    /// Combined projection * view * model
    pub fn model_view_projection(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix * self.model_matrix
    }
}

impl UniformLayout for SceneUniforms {
    const WGSL_NAME: &'static str = "SceneUniforms";

    fn field_layouts() -> Vec<FieldLayout> {
        vec![
            FieldLayout::new("model_matrix", offset_of!(Self, model_matrix), size_of::<Mat4>()),
            FieldLayout::new("view_matrix", offset_of!(Self, view_matrix), size_of::<Mat4>()),
            FieldLayout::new(
                "projection_matrix",
                offset_of!(Self, projection_matrix),
                size_of::<Mat4>(),
            ),
            FieldLayout::new("normal_matrix", offset_of!(Self, normal_matrix), size_of::<Mat4>()),
            FieldLayout::new("light_position", offset_of!(Self, light_position), size_of::<Vec3>()),
            FieldLayout::new(
                "ambient_intensity",
                offset_of!(Self, ambient_intensity),
                size_of::<f32>(),
            ),
            FieldLayout::new("light_color", offset_of!(Self, light_color), size_of::<Vec3>()),
            FieldLayout::new(
                "diffuse_intensity",
                offset_of!(Self, diffuse_intensity),
                size_of::<f32>(),
            ),
            FieldLayout::new(
                "camera_position",
                offset_of!(Self, camera_position),
                size_of::<Vec3>(),
            ),
            FieldLayout::new(
                "specular_intensity",
                offset_of!(Self, specular_intensity),
                size_of::<f32>(),
            ),
            FieldLayout::new("specular_power", offset_of!(Self, specular_power), size_of::<f32>()),
            FieldLayout::new("padding1", offset_of!(Self, padding1), size_of::<f32>()),
            FieldLayout::new("padding2", offset_of!(Self, padding2), size_of::<f32>()),
            FieldLayout::new("padding3", offset_of!(Self, padding3), size_of::<f32>()),
        ]
    }
}

/// Per-frame parameters of the CRT emulation pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CrtUniforms {
    /// Seconds since the first frame
    pub time: f32,
    /// Barrel distortion strength, 0 = flat
    pub curvature: f32,
    pub scanline_intensity: f32,
    pub scanline_count: f32,
    pub glow_intensity: f32,
    pub vignette_strength: f32,
    pub flicker_amount: f32,
    pub brightness: f32,
    /// Pixel size of the target being processed
    pub resolution: Vec2,
    pub green_tint_r: f32,
    pub green_tint_g: f32,
    pub green_tint_b: f32,
    /// 0 = no afterimage, 1 = previous frame fully retained
    pub phosphor_persistence: f32,
    pub noise_amount: f32,
    pub padding: f32,
}

impl UniformLayout for CrtUniforms {
    const WGSL_NAME: &'static str = "CrtUniforms";

    fn field_layouts() -> Vec<FieldLayout> {
        let f = size_of::<f32>();
        vec![
            FieldLayout::new("time", offset_of!(Self, time), f),
            FieldLayout::new("curvature", offset_of!(Self, curvature), f),
            FieldLayout::new("scanline_intensity", offset_of!(Self, scanline_intensity), f),
            FieldLayout::new("scanline_count", offset_of!(Self, scanline_count), f),
            FieldLayout::new("glow_intensity", offset_of!(Self, glow_intensity), f),
            FieldLayout::new("vignette_strength", offset_of!(Self, vignette_strength), f),
            FieldLayout::new("flicker_amount", offset_of!(Self, flicker_amount), f),
            FieldLayout::new("brightness", offset_of!(Self, brightness), f),
            FieldLayout::new("resolution", offset_of!(Self, resolution), size_of::<Vec2>()),
            FieldLayout::new("green_tint_r", offset_of!(Self, green_tint_r), f),
            FieldLayout::new("green_tint_g", offset_of!(Self, green_tint_g), f),
            FieldLayout::new("green_tint_b", offset_of!(Self, green_tint_b), f),
            FieldLayout::new("phosphor_persistence", offset_of!(Self, phosphor_persistence), f),
            FieldLayout::new("noise_amount", offset_of!(Self, noise_amount), f),
            FieldLayout::new("padding", offset_of!(Self, padding), f),
        ]
    }
}

/// Surface appearance of the monitor casing.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialUniforms {
    pub base_color: Vec3,
    pub roughness: f32,
    pub metallic: f32,
    pub padding1: f32,
    pub padding2: f32,
    pub padding3: f32,
}

impl UniformLayout for MaterialUniforms {
    const WGSL_NAME: &'static str = "MaterialUniforms";

    fn field_layouts() -> Vec<FieldLayout> {
        let f = size_of::<f32>();
        vec![
            FieldLayout::new("base_color", offset_of!(Self, base_color), size_of::<Vec3>()),
            FieldLayout::new("roughness", offset_of!(Self, roughness), f),
            FieldLayout::new("metallic", offset_of!(Self, metallic), f),
            FieldLayout::new("padding1", offset_of!(Self, padding1), f),
            FieldLayout::new("padding2", offset_of!(Self, padding2), f),
            FieldLayout::new("padding3", offset_of!(Self, padding3), f),
        ]
    }
}

static_assertions::const_assert_eq!(size_of::<SceneVertex>(), 32);
static_assertions::const_assert_eq!(size_of::<QuadVertex>(), 16);
static_assertions::const_assert_eq!(size_of::<SceneUniforms>(), 320);
static_assertions::const_assert_eq!(size_of::<CrtUniforms>(), 64);
static_assertions::const_assert_eq!(size_of::<MaterialUniforms>(), 32);
