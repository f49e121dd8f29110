//! Monitor pass: the casing and the CRT image on its screen
//!
//! The casing is lit by the room light with a roughness/metallic material.
//! The screen quad is emissive: it shows the CRT output unlit.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::crt::SampleSource;
use crate::pipeline::scene_renderer::{lighting_terms, mesh_for};
use crate::pipeline::{GpuMesh, MonitorDraw, UniformSlot};
use crate::uniforms::{MaterialUniforms, QuadVertex, SceneUniforms, SceneVertex};
use glam::{Vec2, Vec3};
use std::collections::HashMap;

/// Lit color of a casing fragment.
///
/// Metallic surfaces trade diffuse for base-colored highlights; rough ones
/// scatter the highlight away.
pub fn shade_casing(
    uniforms: &SceneUniforms,
    material: &MaterialUniforms,
    world_position: Vec3,
    normal: Vec3,
) -> Vec3 {
    let terms = lighting_terms(uniforms, world_position, normal);
    let base = material.base_color;
    let metallic = material.metallic.clamp(0.0, 1.0);
    let roughness = material.roughness.clamp(0.0, 1.0);

    let ambient = base * uniforms.ambient_intensity;
    let diffuse = base * ((1.0 - metallic) * uniforms.diffuse_intensity * terms.diffuse);
    let specular_color = Vec3::ONE.lerp(base, metallic);
    let specular = specular_color * ((1.0 - roughness) * uniforms.specular_intensity * terms.specular);

    (ambient + diffuse + specular) * uniforms.light_color
}

/// Color of the screen quad at `uv`: the CRT output, unlit
pub fn sample_screen<S: SampleSource + ?Sized>(screen: &S, uv: Vec2) -> Vec3 {
    screen.sample(uv)
}

/// GPU recorder of the monitor pass
pub struct MonitorCompositor {
    casing_pipeline: RenderPipelineHandle,
    screen_pipeline: RenderPipelineHandle,
    casing_slot: UniformSlot,
    material_slot: UniformSlot,
    screen_slot: UniformSlot,
    screen_layout: BindGroupLayoutHandle,
    sampler: SamplerHandle,
    screen_groups: HashMap<TextureViewHandle, BindGroupHandle>,
}

impl MonitorCompositor {
    pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

    pub fn new<B: GraphicsBackend>(backend: &mut B, color_format: TextureFormat) -> BackendResult<Self> {
        let scene_layout = backend.create_bind_group_layout(&[BindGroupLayoutEntry::uniform(
            0,
            ShaderStageFlags::VERTEX_FRAGMENT,
        )])?;
        let material_layout = backend.create_bind_group_layout(&[BindGroupLayoutEntry::uniform(
            0,
            ShaderStageFlags::FRAGMENT,
        )])?;
        let screen_layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry::texture(0, true),
            BindGroupLayoutEntry::sampler(1),
        ])?;

        let depth = || {
            Some(DepthStencilState {
                format: Self::DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
            })
        };

        let casing_pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Monitor Casing Pipeline".into()),
            shader: CASING_SHADER.into(),
            has_fragment: true,
            vertex_layouts: vec![SceneVertex::layout()],
            bind_group_layouts: vec![scene_layout, material_layout],
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::Back,
            depth_stencil: depth(),
            color_format,
        })?;

        let screen_pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Monitor Screen Pipeline".into()),
            shader: SCREEN_SHADER.into(),
            has_fragment: true,
            vertex_layouts: vec![QuadVertex::layout()],
            bind_group_layouts: vec![scene_layout, screen_layout],
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            depth_stencil: depth(),
            color_format,
        })?;

        let casing_slot =
            UniformSlot::new::<B, SceneUniforms>(backend, scene_layout, "Casing Uniforms")?;
        let material_slot =
            UniformSlot::new::<B, MaterialUniforms>(backend, material_layout, "Casing Material")?;
        let screen_slot =
            UniformSlot::new::<B, SceneUniforms>(backend, scene_layout, "Screen Uniforms")?;

        let sampler = backend.create_sampler(&SamplerDescriptor {
            label: Some("Monitor Screen Sampler".into()),
            filter: FilterMode::Linear,
        })?;

        Ok(Self {
            casing_pipeline,
            screen_pipeline,
            casing_slot,
            material_slot,
            screen_slot,
            screen_layout,
            sampler,
            screen_groups: HashMap::new(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        meshes: &[GpuMesh],
        output_view: TextureViewHandle,
        depth_view: TextureViewHandle,
        size: (u32, u32),
        screen_view: TextureViewHandle,
        draw: &MonitorDraw,
    ) -> BackendResult<()> {
        let screen_group = match self.screen_groups.get(&screen_view) {
            Some(group) => *group,
            None => {
                let group = backend.create_bind_group(
                    self.screen_layout,
                    &[
                        (0, BindGroupEntry::Texture(screen_view)),
                        (1, BindGroupEntry::Sampler(self.sampler)),
                    ],
                )?;
                self.screen_groups.insert(screen_view, group);
                group
            }
        };

        self.casing_slot.write(backend, &draw.casing_uniforms);
        self.material_slot.write(backend, &draw.material);
        self.screen_slot.write(backend, &draw.screen_uniforms);

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Monitor Pass".into()),
            color_attachment: ColorAttachment {
                view: output_view,
                load_op: LoadOp::Clear(draw.clear_color.to_array()),
            },
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: depth_view,
                depth_clear_value: 1.0,
            }),
        });
        backend.set_viewport(size.0 as f32, size.1 as f32);

        if let Some(casing) = mesh_for(meshes, draw.casing) {
            backend.set_render_pipeline(self.casing_pipeline);
            backend.set_bind_group(0, self.casing_slot.bind_group);
            backend.set_bind_group(1, self.material_slot.bind_group);
            backend.set_vertex_buffer(0, casing.vertex_buffer);
            backend.set_index_buffer(casing.index_buffer);
            backend.draw_indexed(0..casing.index_count);
        }

        if let Some(screen) = mesh_for(meshes, draw.screen) {
            backend.set_render_pipeline(self.screen_pipeline);
            backend.set_bind_group(0, self.screen_slot.bind_group);
            backend.set_bind_group(1, screen_group);
            backend.set_vertex_buffer(0, screen.vertex_buffer);
            backend.set_index_buffer(screen.index_buffer);
            backend.draw_indexed(0..screen.index_count);
        }

        backend.end_render_pass();
        Ok(())
    }

    /// Drop the cached bind group of a destroyed screen texture
    pub fn forget_view<B: GraphicsBackend>(&mut self, backend: &mut B, view: TextureViewHandle) {
        if let Some(group) = self.screen_groups.remove(&view) {
            backend.destroy_bind_group(group);
        }
    }
}

pub const CASING_SHADER: &str = concat!(
    scene_uniforms_wgsl!(),
    lighting_wgsl!(),
    r#"
struct MaterialUniforms {
    base_color: vec3<f32>,
    roughness: f32,
    metallic: f32,
    padding1: f32,
    padding2: f32,
    padding3: f32,
}

@group(0) @binding(0) var<uniform> scene: SceneUniforms;
@group(1) @binding(0) var<uniform> material: MaterialUniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) tex_coord: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = scene.model_matrix * vec4<f32>(in.position, 1.0);
    out.world_position = world.xyz;
    out.clip_position = scene.projection_matrix * scene.view_matrix * world;
    out.world_normal = (scene.normal_matrix * vec4<f32>(in.normal, 0.0)).xyz;
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

    let metallic = clamp(material.metallic, 0.0, 1.0);
    let roughness = clamp(material.roughness, 0.0, 1.0);
    let base = material.base_color;

    let ambient = base * scene.ambient_intensity;
    let diffuse = base * ((1.0 - metallic) * scene.diffuse_intensity * n_dot_l);
    let specular_color = mix(vec3<f32>(1.0), base, metallic);
    let highlight = specular_color * ((1.0 - roughness) * scene.specular_intensity * specular);

    return vec4<f32>((ambient + diffuse + highlight) * scene.light_color, 1.0);
}
"#
);

pub const SCREEN_SHADER: &str = concat!(
    scene_uniforms_wgsl!(),
    r#"
@group(0) @binding(0) var<uniform> scene: SceneUniforms;
@group(1) @binding(0) var screen_texture: texture_2d<f32>;
@group(1) @binding(1) var screen_sampler: sampler;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) tex_coord: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = scene.model_matrix * vec4<f32>(in.position, 0.0, 1.0);
    out.clip_position = scene.projection_matrix * scene.view_matrix * world;
    out.uv = in.tex_coord;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(textureSample(screen_texture, screen_sampler, in.uv).rgb, 1.0);
}
"#
);

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> SceneUniforms {
        SceneUniforms {
            light_position: Vec3::new(1.0, 2.0, 6.0),
            camera_position: Vec3::new(0.0, 0.5, 5.0),
            ..Default::default()
        }
    }

    fn material(roughness: f32, metallic: f32) -> MaterialUniforms {
        MaterialUniforms {
            base_color: Vec3::new(0.8, 0.78, 0.7),
            roughness,
            metallic,
            padding1: 0.0,
            padding2: 0.0,
            padding3: 0.0,
        }
    }

    fn luminance(color: Vec3) -> f32 {
        color.x + color.y + color.z
    }

    #[test]
    fn test_rougher_casing_is_never_brighter() {
        let u = room();
        let normal = Vec3::new(0.1, 0.2, 1.0);
        let mut last = f32::INFINITY;
        for step in 0..=10 {
            let roughness = step as f32 / 10.0;
            let value = luminance(shade_casing(&u, &material(roughness, 0.2), Vec3::ZERO, normal));
            assert!(value <= last + 1e-6, "roughness {roughness}: {value} > {last}");
            last = value;
        }
    }

    #[test]
    fn test_more_metallic_casing_is_never_brighter() {
        let u = room();
        let normal = Vec3::new(-0.2, 0.1, 1.0);
        let mut last = f32::INFINITY;
        for step in 0..=10 {
            let metallic = step as f32 / 10.0;
            let value = luminance(shade_casing(&u, &material(0.4, metallic), Vec3::ZERO, normal));
            assert!(value <= last + 1e-6, "metallic {metallic}: {value} > {last}");
            last = value;
        }
    }

    #[test]
    fn test_casing_facing_away_is_ambient() {
        let u = room();
        let m = material(0.3, 0.5);
        let color = shade_casing(&u, &m, Vec3::ZERO, -Vec3::Z);
        let expected = m.base_color * u.ambient_intensity * u.light_color;
        assert!((color - expected).length() < 1e-6);
    }

    #[test]
    fn test_screen_is_unlit() {
        struct Flat;
        impl SampleSource for Flat {
            fn sample(&self, _uv: Vec2) -> Vec3 {
                Vec3::new(0.1, 0.9, 0.1)
            }
        }
        assert_eq!(sample_screen(&Flat, Vec2::splat(0.3)), Vec3::new(0.1, 0.9, 0.1));
    }

    #[test]
    fn test_casing_with_zero_normal_is_finite() {
        let color = shade_casing(&room(), &material(0.5, 0.0), Vec3::ZERO, Vec3::ZERO);
        assert!(color.is_finite());
        assert_eq!(CASING_SHADER.matches(" normalize(").count(), 1);
    }

    #[test]
    fn test_programs_share_scene_struct() {
        assert!(CASING_SHADER.starts_with(scene_uniforms_wgsl!()));
        assert!(SCREEN_SHADER.starts_with(scene_uniforms_wgsl!()));
    }
}
