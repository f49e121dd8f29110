//! Scene pass: lit geometry into the offscreen target
//!
//! Single light, white albedo, ambient + Lambert diffuse + Blinn-Phong
//! specular, each term scaled by its intensity and the light color. Normals
//! go through the normal matrix carried in [`SceneUniforms`].

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::{GpuMesh, MeshHandle, SceneDraw, UniformSlot};
use crate::uniforms::{SceneUniforms, SceneVertex};
use glam::{Mat3, Mat4, Vec3, Vec4};

/// Determinant magnitude below which a model matrix counts as degenerate
const DEGENERATE_DETERMINANT: f32 = 1e-8;

/// Inverse-transpose of the upper 3x3 of `model`.
///
/// A non-invertible model matrix yields the identity so the draw still goes
/// through with untransformed normals.
pub fn normal_matrix(model: Mat4) -> Mat4 {
    let upper = Mat3::from_mat4(model);
    let det = upper.determinant();
    if !det.is_finite() || det.abs() < DEGENERATE_DETERMINANT {
        return Mat4::IDENTITY;
    }
    Mat4::from_mat3(upper.inverse().transpose())
}

/// Unscaled diffuse and specular factors at a surface point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingTerms {
    /// max(N.L, 0)
    pub diffuse: f32,
    /// max(N.H, 0)^power, zero when the surface faces away from the light
    pub specular: f32,
}

pub fn lighting_terms(uniforms: &SceneUniforms, world_position: Vec3, normal: Vec3) -> LightingTerms {
    let n = normal.normalize_or_zero();
    let l = (uniforms.light_position - world_position).normalize_or_zero();
    let v = (uniforms.camera_position - world_position).normalize_or_zero();
    let h = (l + v).normalize_or_zero();

    let diffuse = n.dot(l).max(0.0);
    let specular = if diffuse > 0.0 {
        n.dot(h).max(0.0).powf(uniforms.specular_power)
    } else {
        0.0
    };

    LightingTerms { diffuse, specular }
}

/// Color of a scene fragment with world-space `normal`
pub fn shade_fragment(uniforms: &SceneUniforms, world_position: Vec3, normal: Vec3) -> Vec3 {
    let terms = lighting_terms(uniforms, world_position, normal);
    let intensity = uniforms.ambient_intensity
        + uniforms.diffuse_intensity * terms.diffuse
        + uniforms.specular_intensity * terms.specular;
    uniforms.light_color * intensity
}

/// GPU recorder of the scene pass
pub struct SceneRenderer {
    pipeline: RenderPipelineHandle,
    uniform_layout: BindGroupLayoutHandle,
    // One uniform buffer per draw, grown on demand
    draw_slots: Vec<UniformSlot>,
}

impl SceneRenderer {
    pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

    pub fn new<B: GraphicsBackend>(backend: &mut B, color_format: TextureFormat) -> BackendResult<Self> {
        let uniform_layout = backend.create_bind_group_layout(&[BindGroupLayoutEntry::uniform(
            0,
            ShaderStageFlags::VERTEX_FRAGMENT,
        )])?;

        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Scene Pipeline".into()),
            shader: SCENE_SHADER.into(),
            has_fragment: true,
            vertex_layouts: vec![SceneVertex::layout()],
            bind_group_layouts: vec![uniform_layout],
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::Back,
            depth_stencil: Some(DepthStencilState {
                format: Self::DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
            }),
            color_format,
        })?;

        Ok(Self {
            pipeline,
            uniform_layout,
            draw_slots: Vec::new(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        meshes: &[GpuMesh],
        color_view: TextureViewHandle,
        depth_view: TextureViewHandle,
        size: (u32, u32),
        clear_color: Vec4,
        draws: &[SceneDraw],
    ) -> BackendResult<()> {
        while self.draw_slots.len() < draws.len() {
            let label = format!("Scene Uniforms {}", self.draw_slots.len());
            let slot = UniformSlot::new::<B, SceneUniforms>(backend, self.uniform_layout, &label)?;
            self.draw_slots.push(slot);
        }

        for (slot, draw) in self.draw_slots.iter().zip(draws) {
            slot.write(backend, &draw.uniforms);
        }

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Scene Pass".into()),
            color_attachment: ColorAttachment {
                view: color_view,
                load_op: LoadOp::Clear(clear_color.to_array()),
            },
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: depth_view,
                depth_clear_value: 1.0,
            }),
        });

        backend.set_viewport(size.0 as f32, size.1 as f32);
        backend.set_render_pipeline(self.pipeline);

        for (slot, draw) in self.draw_slots.iter().zip(draws) {
            let Some(mesh) = mesh_for(meshes, draw.mesh) else {
                log::debug!("Scene draw references unknown mesh {:?}", draw.mesh);
                continue;
            };
            backend.set_bind_group(0, slot.bind_group);
            backend.set_vertex_buffer(0, mesh.vertex_buffer);
            backend.set_index_buffer(mesh.index_buffer);
            backend.draw_indexed(0..mesh.index_count);
        }

        backend.end_render_pass();
        Ok(())
    }
}

pub(crate) fn mesh_for(meshes: &[GpuMesh], handle: MeshHandle) -> Option<&GpuMesh> {
    meshes.get(handle.0 as usize)
}

pub const SCENE_SHADER: &str = concat!(
    scene_uniforms_wgsl!(),
    lighting_wgsl!(),
    r#"
@group(0) @binding(0) var<uniform> scene: SceneUniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) tex_coord: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) tex_coord: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = scene.model_matrix * vec4<f32>(in.position, 1.0);
    out.world_position = world.xyz;
    out.clip_position = scene.projection_matrix * scene.view_matrix * world;
    out.world_normal = (scene.normal_matrix * vec4<f32>(in.normal, 0.0)).xyz;
    out.tex_coord = in.tex_coord;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let n = safe_normalize(in.world_normal);
    let l = safe_normalize(scene.light_position - in.world_position);
    let v = safe_normalize(scene.camera_position - in.world_position);
    let h = safe_normalize(l + v);

    let n_dot_l = max(dot(n, l), 0.0);
    var specular: f32 = 0.0;
    if (n_dot_l > 0.0) {
        specular = pow(max(dot(n, h), 0.0), scene.specular_power);
    }

    let intensity = scene.ambient_intensity
        + scene.diffuse_intensity * n_dot_l
        + scene.specular_intensity * specular;
    return vec4<f32>(scene.light_color * intensity, 1.0);
}
"#
);

#[cfg(test)]
mod tests {
    use super::*;

    fn uniforms() -> SceneUniforms {
        SceneUniforms {
            light_position: Vec3::new(0.0, 0.0, 10.0),
            camera_position: Vec3::new(0.0, 0.0, 10.0),
            light_color: Vec3::new(1.0, 0.5, 0.25),
            ambient_intensity: 0.1,
            diffuse_intensity: 0.6,
            specular_intensity: 0.3,
            specular_power: 16.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_normal_matrix_rotation_is_rotation() {
        let model = Mat4::from_rotation_y(0.7);
        let normal = normal_matrix(model);
        let rotated = normal.transform_vector3(Vec3::X);
        let expected = model.transform_vector3(Vec3::X);
        assert!((rotated - expected).length() < 1e-5);
    }

    #[test]
    fn test_normal_matrix_non_uniform_scale() {
        // A plane tilted 45 degrees, squashed in y, keeps its normal perpendicular
        let model = Mat4::from_scale(Vec3::new(1.0, 0.5, 1.0));
        let normal = normal_matrix(model).transform_vector3(Vec3::new(0.0, 1.0, 1.0));
        let tangent = model.transform_vector3(Vec3::new(0.0, 1.0, -1.0));
        assert!(normal.dot(tangent).abs() < 1e-5);
    }

    #[test]
    fn test_normal_matrix_degenerate_falls_back_to_identity() {
        let model = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
        assert_eq!(normal_matrix(model), Mat4::IDENTITY);

        let nan = Mat4::from_cols_array(&[f32::NAN; 16]);
        assert_eq!(normal_matrix(nan), Mat4::IDENTITY);
    }

    #[test]
    fn test_facing_light_is_fully_lit() {
        let u = uniforms();
        let color = shade_fragment(&u, Vec3::ZERO, Vec3::Z);
        // N.L = 1, N.H = 1
        let expected = u.light_color * (0.1 + 0.6 + 0.3);
        assert!((color - expected).length() < 1e-5);
    }

    #[test]
    fn test_facing_away_gets_ambient_only() {
        let u = uniforms();
        let color = shade_fragment(&u, Vec3::ZERO, -Vec3::Z);
        assert!((color - u.light_color * 0.1).length() < 1e-6);
    }

    #[test]
    fn test_diffuse_is_lambertian() {
        let u = uniforms();
        let normal = Vec3::new(1.0, 0.0, 1.0).normalize();
        let terms = lighting_terms(&u, Vec3::ZERO, normal);
        assert!((terms.diffuse - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
        assert!(terms.specular < terms.diffuse);
    }

    #[test]
    fn test_zero_normal_does_not_produce_nan() {
        let color = shade_fragment(&uniforms(), Vec3::ZERO, Vec3::ZERO);
        assert!(color.is_finite());
    }

    #[test]
    fn test_shader_normalizes_only_through_zero_guard() {
        // The one bare call is inside safe_normalize itself
        assert_eq!(SCENE_SHADER.matches(" normalize(").count(), 1);
        assert!(SCENE_SHADER.contains("safe_normalize(l + v)"));
    }
}
