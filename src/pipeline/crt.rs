//! CRT emulation pass
//!
//! Per output pixel, in order: barrel distortion, base sample, scanlines,
//! glow, green phosphor tint, vignette, flicker, noise, brightness, clamp,
//! phosphor persistence. Pixels whose distorted coordinate leaves the unit
//! square are black regardless of every other stage.
//!
//! The Rust functions here and `CRT_SHADER` implement the same math; the
//! software backend runs the former, the GPU the latter.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::{smoothstep, GpuMesh};
use crate::resources::QuadMesh;
use crate::uniforms::{CrtUniforms, QuadVertex, UniformLayout};
use glam::{UVec2, Vec2, Vec3};
use std::collections::HashMap;

/// Radii, in texels, of the two glow sampling rings
const GLOW_RADII: [f32; 2] = [1.5, 3.0];
const GLOW_DIRECTIONS: usize = 8;

/// Vignette starts darkening at this fraction of the center-to-corner distance
const VIGNETTE_INNER: f32 = 0.35;

/// Flicker carrier frequencies in Hz
const FLICKER_FAST_HZ: f32 = 60.0;
const FLICKER_SLOW_HZ: f32 = 7.3;

/// User-facing CRT configuration, turned into [`CrtUniforms`] every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CrtSettings {
    pub curvature: f32,
    pub scanline_intensity: f32,
    pub scanline_count: f32,
    pub glow_intensity: f32,
    pub vignette_strength: f32,
    pub flicker_amount: f32,
    pub brightness: f32,
    pub green_tint: Vec3,
    pub phosphor_persistence: f32,
    pub noise_amount: f32,
}

impl Default for CrtSettings {
    fn default() -> Self {
        Self {
            curvature: 0.02,
            scanline_intensity: 0.3,
            scanline_count: 300.0,
            glow_intensity: 0.35,
            vignette_strength: 0.35,
            flicker_amount: 0.03,
            brightness: 1.0,
            green_tint: Vec3::new(0.1, 1.0, 0.1),
            phosphor_persistence: 0.4,
            noise_amount: 0.03,
        }
    }
}

impl CrtSettings {
    /// Every effect disabled: the pass reproduces its input
    pub fn passthrough() -> Self {
        Self {
            curvature: 0.0,
            scanline_intensity: 0.0,
            glow_intensity: 0.0,
            vignette_strength: 0.0,
            flicker_amount: 0.0,
            brightness: 1.0,
            green_tint: Vec3::ONE,
            phosphor_persistence: 0.0,
            noise_amount: 0.0,
            ..Default::default()
        }
    }

    pub fn with_curvature(mut self, curvature: f32) -> Self {
        self.curvature = curvature;
        self
    }

    pub fn with_scanlines(mut self, count: f32, intensity: f32) -> Self {
        self.scanline_count = count;
        self.scanline_intensity = intensity;
        self
    }

    pub fn with_glow(mut self, intensity: f32) -> Self {
        self.glow_intensity = intensity;
        self
    }

    pub fn with_vignette(mut self, strength: f32) -> Self {
        self.vignette_strength = strength;
        self
    }

    pub fn with_flicker(mut self, amount: f32) -> Self {
        self.flicker_amount = amount;
        self
    }

    pub fn with_brightness(mut self, brightness: f32) -> Self {
        self.brightness = brightness;
        self
    }

    pub fn with_tint(mut self, tint: Vec3) -> Self {
        self.green_tint = tint;
        self
    }

    pub fn with_persistence(mut self, persistence: f32) -> Self {
        self.phosphor_persistence = persistence;
        self
    }

    pub fn with_noise(mut self, amount: f32) -> Self {
        self.noise_amount = amount;
        self
    }

    pub fn to_uniforms(&self, time: f32, resolution: Vec2) -> CrtUniforms {
        CrtUniforms {
            time,
            curvature: self.curvature,
            scanline_intensity: self.scanline_intensity,
            scanline_count: self.scanline_count,
            glow_intensity: self.glow_intensity,
            vignette_strength: self.vignette_strength,
            flicker_amount: self.flicker_amount,
            brightness: self.brightness,
            resolution,
            green_tint_r: self.green_tint.x,
            green_tint_g: self.green_tint.y,
            green_tint_b: self.green_tint.z,
            phosphor_persistence: self.phosphor_persistence,
            noise_amount: self.noise_amount,
            padding: 0.0,
        }
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

impl CrtUniforms {
    /// Clamp every field into its valid range.
    ///
    /// Non-finite values fall back to the defaults, a non-positive scanline
    /// count becomes 1 and an empty resolution is replaced by `target_size`.
    pub fn sanitized(&self, target_size: (u32, u32)) -> Self {
        let defaults = CrtSettings::default();
        let scanline_count = finite_or(self.scanline_count, defaults.scanline_count);

        let resolution = if self.resolution.is_finite()
            && self.resolution.x >= 1.0
            && self.resolution.y >= 1.0
        {
            self.resolution
        } else {
            Vec2::new(target_size.0 as f32, target_size.1 as f32)
        };

        Self {
            time: finite_or(self.time, 0.0).max(0.0),
            curvature: finite_or(self.curvature, defaults.curvature).max(0.0),
            scanline_intensity: finite_or(self.scanline_intensity, defaults.scanline_intensity)
                .clamp(0.0, 1.0),
            scanline_count: if scanline_count > 0.0 {
                scanline_count.max(1.0)
            } else {
                1.0
            },
            glow_intensity: finite_or(self.glow_intensity, defaults.glow_intensity).max(0.0),
            vignette_strength: finite_or(self.vignette_strength, defaults.vignette_strength)
                .clamp(0.0, 1.0),
            flicker_amount: finite_or(self.flicker_amount, defaults.flicker_amount).clamp(0.0, 1.0),
            brightness: finite_or(self.brightness, defaults.brightness).max(0.0),
            resolution,
            green_tint_r: finite_or(self.green_tint_r, defaults.green_tint.x).max(0.0),
            green_tint_g: finite_or(self.green_tint_g, defaults.green_tint.y).max(0.0),
            green_tint_b: finite_or(self.green_tint_b, defaults.green_tint.z).max(0.0),
            phosphor_persistence: finite_or(
                self.phosphor_persistence,
                defaults.phosphor_persistence,
            )
            .clamp(0.0, 1.0),
            noise_amount: finite_or(self.noise_amount, defaults.noise_amount).clamp(0.0, 1.0),
            padding: 0.0,
        }
    }

    pub fn tint(&self) -> Vec3 {
        Vec3::new(self.green_tint_r, self.green_tint_g, self.green_tint_b)
    }
}

/// Something the CRT pass can read with filtered, clamp-to-edge lookups.
pub trait SampleSource {
    /// Color at normalized coordinate `uv`, (0, 0) being the top-left corner
    fn sample(&self, uv: Vec2) -> Vec3;
}

/// Map a screen coordinate through the tube's barrel distortion.
///
/// The center is a fixed point for every curvature; curvature 0 is the
/// identity.
pub fn barrel_distort(uv: Vec2, curvature: f32) -> Vec2 {
    let centered = uv * 2.0 - Vec2::ONE;
    let r2 = centered.dot(centered);
    centered * (1.0 + curvature * r2) * 0.5 + Vec2::splat(0.5)
}

pub fn is_off_screen(uv: Vec2) -> bool {
    uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0
}

/// Beam modulation at vertical coordinate `y`.
///
/// Each scanline period is lit for its first half and dark for the second,
/// with short smooth transitions. Period is `1 / count`.
pub fn scanline_factor(y: f32, count: f32, intensity: f32) -> f32 {
    let phase = (y * count).fract();
    let dark = smoothstep(0.45, 0.55, phase) * (1.0 - smoothstep(0.95, 1.0, phase));
    1.0 - intensity * dark
}

/// Darkening toward the corners, 1 at the center
pub fn vignette_factor(uv: Vec2, strength: f32) -> f32 {
    let distance = (uv - Vec2::splat(0.5)).length() * std::f32::consts::SQRT_2;
    1.0 - strength * smoothstep(VIGNETTE_INNER, 1.0, distance)
}

/// Global brightness wobble, 1 at time 0
pub fn flicker_factor(time: f32, amount: f32) -> f32 {
    let fast = (std::f32::consts::PI * time * FLICKER_FAST_HZ).sin();
    let slow = (std::f32::consts::PI * time * FLICKER_SLOW_HZ).sin();
    1.0 - amount * (0.5 * fast * fast + 0.5 * slow * slow)
}

/// Stateless hash of a pixel and a seed into [0, 1)
pub fn noise_hash(x: u32, y: u32, seed: u32) -> f32 {
    let mut h = x.wrapping_mul(0x8da6_b343) ^ y.wrapping_mul(0xd816_3841) ^ seed.wrapping_mul(0xcb1a_b31f);
    h ^= h >> 16;
    h = h.wrapping_mul(0x7feb_352d);
    h ^= h >> 15;
    h = h.wrapping_mul(0x846c_a68b);
    h ^= h >> 16;
    (h >> 8) as f32 / 16_777_216.0
}

/// Zero-mean noise added to every channel of `pixel`
pub fn noise_offset(pixel: UVec2, time: f32, amount: f32) -> f32 {
    amount * (noise_hash(pixel.x, pixel.y, time.to_bits()) - 0.5)
}

fn bright_pass(color: Vec3) -> Vec3 {
    (color - Vec3::splat(0.5)).max(Vec3::ZERO) * 2.0
}

/// Light bleeding in from bright neighbours.
///
/// Only the part of the surrounding bright energy that exceeds the pixel's own
/// is added, so flat regions receive no glow.
pub fn glow<S: SampleSource + ?Sized>(scene: &S, uv: Vec2, uniforms: &CrtUniforms) -> Vec3 {
    let texel = Vec2::ONE / uniforms.resolution.max(Vec2::ONE);
    let mut halo = Vec3::ZERO;
    for i in 0..GLOW_DIRECTIONS {
        let angle = i as f32 * std::f32::consts::FRAC_PI_4;
        let direction = Vec2::new(angle.cos(), angle.sin()) * texel;
        for radius in GLOW_RADII {
            halo += bright_pass(scene.sample(uv + direction * radius));
        }
    }
    halo /= (GLOW_DIRECTIONS * GLOW_RADII.len()) as f32;
    (halo - bright_pass(scene.sample(uv))).max(Vec3::ZERO) * uniforms.glow_intensity
}

/// Final color of the output pixel `pixel` whose center is at `uv`.
///
/// `previous` is the co-located pixel of the last output, `None` when there
/// is no history yet.
pub fn shade_pixel<S: SampleSource + ?Sized>(
    uniforms: &CrtUniforms,
    uv: Vec2,
    pixel: UVec2,
    scene: &S,
    previous: Option<Vec3>,
) -> Vec3 {
    let distorted = barrel_distort(uv, uniforms.curvature);
    if is_off_screen(distorted) {
        return Vec3::ZERO;
    }

    let mut color = scene.sample(distorted);
    color *= scanline_factor(distorted.y, uniforms.scanline_count, uniforms.scanline_intensity);
    if uniforms.glow_intensity > 0.0 {
        color += glow(scene, distorted, uniforms);
    }
    color *= uniforms.tint();
    color *= vignette_factor(uv, uniforms.vignette_strength);
    color *= flicker_factor(uniforms.time, uniforms.flicker_amount);
    color += Vec3::splat(noise_offset(pixel, uniforms.time, uniforms.noise_amount));
    color *= uniforms.brightness;
    color = color.clamp(Vec3::ZERO, Vec3::ONE);

    match previous {
        Some(previous) => color.lerp(previous, uniforms.phosphor_persistence),
        None => color,
    }
}

/// GPU recorder of the CRT pass
pub struct CrtPostProcessor {
    pipeline: RenderPipelineHandle,
    bind_group_layout: BindGroupLayoutHandle,
    uniform_buffer: BufferHandle,
    sampler: SamplerHandle,
    quad: GpuMesh,
    // Keyed by (scene view, history view)
    bind_groups: HashMap<(TextureViewHandle, TextureViewHandle), BindGroupHandle>,
}

impl CrtPostProcessor {
    pub fn new<B: GraphicsBackend>(backend: &mut B, output_format: TextureFormat) -> BackendResult<Self> {
        let bind_group_layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry::texture(0, true),
            BindGroupLayoutEntry::sampler(1),
            BindGroupLayoutEntry::texture(2, true),
            BindGroupLayoutEntry::uniform(3, ShaderStageFlags::FRAGMENT),
        ])?;

        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("CRT Pipeline".into()),
            shader: CRT_SHADER.into(),
            has_fragment: true,
            vertex_layouts: vec![QuadVertex::layout()],
            bind_group_layouts: vec![bind_group_layout],
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            depth_stencil: None,
            color_format: output_format,
        })?;

        let uniform_buffer = backend.create_buffer(&BufferDescriptor::uniform(
            "CRT Uniforms",
            CrtUniforms::byte_size() as u64,
        ))?;

        let sampler = backend.create_sampler(&SamplerDescriptor {
            label: Some("CRT Scene Sampler".into()),
            filter: FilterMode::Linear,
        })?;

        let quad = QuadMesh::fullscreen();
        let quad = GpuMesh::upload(backend, "Fullscreen Quad", quad.vertex_bytes(), &quad.indices)?;

        Ok(Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
            sampler,
            quad,
            bind_groups: HashMap::new(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        scene_view: TextureViewHandle,
        previous_view: Option<TextureViewHandle>,
        output_view: TextureViewHandle,
        size: (u32, u32),
        uniforms: &CrtUniforms,
    ) -> BackendResult<()> {
        // Without history the scene is bound in its place; zero persistence
        // keeps it from contributing.
        let (history_view, uniforms) = match previous_view {
            Some(view) => (view, *uniforms),
            None => (
                scene_view,
                CrtUniforms {
                    phosphor_persistence: 0.0,
                    ..*uniforms
                },
            ),
        };

        let bind_group = match self.bind_groups.get(&(scene_view, history_view)) {
            Some(group) => *group,
            None => {
                let group = backend.create_bind_group(
                    self.bind_group_layout,
                    &[
                        (0, BindGroupEntry::Texture(scene_view)),
                        (1, BindGroupEntry::Sampler(self.sampler)),
                        (2, BindGroupEntry::Texture(history_view)),
                        (3, BindGroupEntry::Buffer { buffer: self.uniform_buffer }),
                    ],
                )?;
                self.bind_groups.insert((scene_view, history_view), group);
                group
            }
        };

        backend.write_buffer(self.uniform_buffer, 0, uniforms.as_bytes());

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("CRT Pass".into()),
            color_attachment: ColorAttachment {
                view: output_view,
                load_op: LoadOp::Clear([0.0, 0.0, 0.0, 1.0]),
            },
            depth_stencil_attachment: None,
        });
        backend.set_viewport(size.0 as f32, size.1 as f32);
        backend.set_render_pipeline(self.pipeline);
        backend.set_bind_group(0, bind_group);
        backend.set_vertex_buffer(0, self.quad.vertex_buffer);
        backend.set_index_buffer(self.quad.index_buffer);
        backend.draw_indexed(0..self.quad.index_count);
        backend.end_render_pass();

        Ok(())
    }

    /// Drop cached bind groups that reference `view`
    pub fn forget_view<B: GraphicsBackend>(&mut self, backend: &mut B, view: TextureViewHandle) {
        self.bind_groups.retain(|(scene, history), group| {
            let stale = *scene == view || *history == view;
            if stale {
                backend.destroy_bind_group(*group);
            }
            !stale
        });
    }
}

pub const CRT_SHADER: &str = r#"
struct CrtUniforms {
    time: f32,
    curvature: f32,
    scanline_intensity: f32,
    scanline_count: f32,
    glow_intensity: f32,
    vignette_strength: f32,
    flicker_amount: f32,
    brightness: f32,
    resolution: vec2<f32>,
    green_tint_r: f32,
    green_tint_g: f32,
    green_tint_b: f32,
    phosphor_persistence: f32,
    noise_amount: f32,
    padding: f32,
}

@group(0) @binding(0) var scene_texture: texture_2d<f32>;
@group(0) @binding(1) var scene_sampler: sampler;
@group(0) @binding(2) var history_texture: texture_2d<f32>;
@group(0) @binding(3) var<uniform> crt: CrtUniforms;

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
    out.clip_position = vec4<f32>(in.position, 0.0, 1.0);
    out.uv = in.tex_coord;
    return out;
}

fn sample_scene(uv: vec2<f32>) -> vec3<f32> {
    return textureSampleLevel(scene_texture, scene_sampler, uv, 0.0).rgb;
}

fn barrel_distort(uv: vec2<f32>) -> vec2<f32> {
    let centered = uv * 2.0 - vec2<f32>(1.0);
    let r2 = dot(centered, centered);
    return centered * (1.0 + crt.curvature * r2) * 0.5 + vec2<f32>(0.5);
}

fn scanline_factor(y: f32) -> f32 {
    let phase = fract(y * crt.scanline_count);
    let dark = smoothstep(0.45, 0.55, phase) * (1.0 - smoothstep(0.95, 1.0, phase));
    return 1.0 - crt.scanline_intensity * dark;
}

fn bright_pass(color: vec3<f32>) -> vec3<f32> {
    return max(color - vec3<f32>(0.5), vec3<f32>(0.0)) * 2.0;
}

fn glow(uv: vec2<f32>) -> vec3<f32> {
    let texel = vec2<f32>(1.0) / max(crt.resolution, vec2<f32>(1.0));
    var halo = vec3<f32>(0.0);
    for (var i: i32 = 0; i < 8; i = i + 1) {
        let angle = f32(i) * 0.78539816;
        let direction = vec2<f32>(cos(angle), sin(angle)) * texel;
        halo = halo + bright_pass(sample_scene(uv + direction * 1.5));
        halo = halo + bright_pass(sample_scene(uv + direction * 3.0));
    }
    halo = halo / 16.0;
    return max(halo - bright_pass(sample_scene(uv)), vec3<f32>(0.0)) * crt.glow_intensity;
}

fn vignette_factor(uv: vec2<f32>) -> f32 {
    let distance = length(uv - vec2<f32>(0.5)) * 1.41421356;
    return 1.0 - crt.vignette_strength * smoothstep(0.35, 1.0, distance);
}

fn flicker_factor(time: f32) -> f32 {
    let fast = sin(3.14159265 * time * 60.0);
    let slow = sin(3.14159265 * time * 7.3);
    return 1.0 - crt.flicker_amount * (0.5 * fast * fast + 0.5 * slow * slow);
}

fn noise_hash(x: u32, y: u32, seed: u32) -> f32 {
    var h: u32 = (x * 0x8da6b343u) ^ (y * 0xd8163841u) ^ (seed * 0xcb1ab31fu);
    h = h ^ (h >> 16u);
    h = h * 0x7feb352du;
    h = h ^ (h >> 15u);
    h = h * 0x846ca68bu;
    h = h ^ (h >> 16u);
    return f32(h >> 8u) / 16777216.0;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let distorted = barrel_distort(in.uv);
    if (distorted.x < 0.0 || distorted.x > 1.0 || distorted.y < 0.0 || distorted.y > 1.0) {
        return vec4<f32>(0.0, 0.0, 0.0, 1.0);
    }

    var color = sample_scene(distorted);
    color = color * scanline_factor(distorted.y);
    color = color + glow(distorted);
    color = color * vec3<f32>(crt.green_tint_r, crt.green_tint_g, crt.green_tint_b);
    color = color * vignette_factor(in.uv);
    color = color * flicker_factor(crt.time);

    let pixel = vec2<u32>(in.clip_position.xy);
    let noise = noise_hash(pixel.x, pixel.y, bitcast<u32>(crt.time)) - 0.5;
    color = color + vec3<f32>(crt.noise_amount * noise);
    color = clamp(color * crt.brightness, vec3<f32>(0.0), vec3<f32>(1.0));

    let previous = textureLoad(history_texture, vec2<i32>(in.clip_position.xy), 0).rgb;
    return vec4<f32>(mix(color, previous, crt.phosphor_persistence), 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    struct Solid(Vec3);

    impl SampleSource for Solid {
        fn sample(&self, _uv: Vec2) -> Vec3 {
            self.0
        }
    }

    /// Horizontal gradient, left black to right white
    struct Gradient;

    impl SampleSource for Gradient {
        fn sample(&self, uv: Vec2) -> Vec3 {
            Vec3::splat(uv.x.clamp(0.0, 1.0))
        }
    }

    fn default_uniforms() -> CrtUniforms {
        CrtSettings::default().to_uniforms(0.0, Vec2::new(800.0, 600.0))
    }

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < 1e-5
    }

    #[test]
    fn test_center_is_fixed_point_for_any_curvature() {
        for curvature in [0.0, 0.02, 0.1, 0.5, 2.0] {
            assert_eq!(barrel_distort(Vec2::splat(0.5), curvature), Vec2::splat(0.5));
        }
    }

    #[test]
    fn test_zero_curvature_is_identity() {
        for uv in [Vec2::new(0.1, 0.9), Vec2::new(0.73, 0.27), Vec2::ZERO, Vec2::ONE] {
            assert!((barrel_distort(uv, 0.0) - uv).length() < 1e-6);
        }
    }

    #[test]
    fn test_corners_leave_screen_with_curvature() {
        let corner = barrel_distort(Vec2::new(0.01, 0.01), 0.1);
        assert!(is_off_screen(corner));
        assert!(!is_off_screen(barrel_distort(Vec2::new(0.5, 0.4), 0.1)));
    }

    #[test]
    fn test_off_screen_is_black_regardless_of_other_fields() {
        let uniforms = CrtUniforms {
            curvature: 0.5,
            brightness: 5.0,
            noise_amount: 1.0,
            glow_intensity: 3.0,
            phosphor_persistence: 1.0,
            ..default_uniforms()
        };
        let color = shade_pixel(
            &uniforms,
            Vec2::new(0.02, 0.03),
            UVec2::new(3, 4),
            &Solid(Vec3::ONE),
            Some(Vec3::ONE),
        );
        assert_eq!(color, Vec3::ZERO);
    }

    #[test]
    fn test_white_center_equals_brightness_times_tint() {
        for brightness in [1.0, 0.8] {
            let uniforms = CrtUniforms {
                brightness,
                noise_amount: 0.0,
                phosphor_persistence: 0.0,
                ..default_uniforms()
            };
            assert_eq!(uniforms.curvature, 0.02);
            assert_eq!(uniforms.scanline_count, 300.0);

            let color = shade_pixel(
                &uniforms,
                Vec2::splat(0.5),
                UVec2::new(400, 300),
                &Solid(Vec3::ONE),
                None,
            );
            let expected = uniforms.tint() * brightness;
            assert!(close(color, expected), "{color:?} != {expected:?}");
        }
    }

    #[test]
    fn test_all_effects_off_reproduces_tinted_input() {
        let uniforms = CrtSettings::passthrough()
            .with_tint(Vec3::new(0.2, 0.9, 0.3))
            .with_brightness(0.7)
            .to_uniforms(3.25, Vec2::new(64.0, 48.0));
        for x in [0.1, 0.35, 0.9] {
            let uv = Vec2::new(x, 0.5);
            let color = shade_pixel(&uniforms, uv, UVec2::new(5, 5), &Gradient, None);
            let expected = Vec3::splat(x) * uniforms.tint() * 0.7;
            assert!(close(color, expected), "{color:?} != {expected:?}");
        }
    }

    #[test]
    fn test_zero_persistence_ignores_history() {
        let uniforms = CrtUniforms {
            phosphor_persistence: 0.0,
            ..default_uniforms()
        };
        let uv = Vec2::new(0.3, 0.6);
        let pixel = UVec2::new(240, 360);
        let without = shade_pixel(&uniforms, uv, pixel, &Gradient, None);
        let with = shade_pixel(&uniforms, uv, pixel, &Gradient, Some(Vec3::new(1.0, 0.0, 1.0)));
        assert_eq!(without, with);
    }

    #[test]
    fn test_persistence_blends_toward_history() {
        let uniforms = CrtSettings::passthrough()
            .with_persistence(0.75)
            .to_uniforms(0.0, Vec2::new(8.0, 8.0));
        let color = shade_pixel(
            &uniforms,
            Vec2::splat(0.5),
            UVec2::new(4, 4),
            &Solid(Vec3::ZERO),
            Some(Vec3::ONE),
        );
        assert!(close(color, Vec3::splat(0.75)));
    }

    #[test]
    fn test_scanline_period() {
        let count = 300.0;
        let period = 1.0 / count;
        for y in [0.101, 0.2537, 0.4412, 0.7] {
            let a = scanline_factor(y, count, 0.6);
            let b = scanline_factor(y + period, count, 0.6);
            assert!((a - b).abs() < 1e-3, "y={y}: {a} vs {b}");
        }
    }

    #[test]
    fn test_scanline_lit_and_dark_halves() {
        let count = 10.0;
        assert_eq!(scanline_factor(0.02, count, 0.5), 1.0);
        assert!((scanline_factor(0.075, count, 0.5) - 0.5).abs() < 1e-6);
        assert_eq!(scanline_factor(0.3, count, 0.0), 1.0);
    }

    #[test]
    fn test_vignette_center_and_corner() {
        assert_eq!(vignette_factor(Vec2::splat(0.5), 0.9), 1.0);
        assert!((vignette_factor(Vec2::ZERO, 0.9) - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_flicker_is_unity_at_start() {
        assert_eq!(flicker_factor(0.0, 0.5), 1.0);
        let later = flicker_factor(0.013, 0.5);
        assert!(later < 1.0 && later >= 0.5);
    }

    #[test]
    fn test_noise_hash_range_and_determinism() {
        let mut sum = 0.0;
        for i in 0..1000 {
            let value = noise_hash(i % 37, i / 37, 0x3f80_0000);
            assert!((0.0..1.0).contains(&value));
            sum += value;
        }
        let mean = sum / 1000.0;
        assert!((mean - 0.5).abs() < 0.05, "mean {mean}");
        assert_eq!(noise_hash(12, 34, 56), noise_hash(12, 34, 56));
        assert_ne!(noise_hash(12, 34, 56), noise_hash(12, 34, 57));
    }

    #[test]
    fn test_uniform_input_receives_no_glow() {
        let uniforms = CrtUniforms {
            glow_intensity: 2.0,
            ..default_uniforms()
        };
        let halo = glow(&Solid(Vec3::splat(0.9)), Vec2::splat(0.5), &uniforms);
        assert!(halo.max_element() < 1e-5);
    }

    #[test]
    fn test_glow_spreads_from_bright_neighbours() {
        struct Dot;
        impl SampleSource for Dot {
            fn sample(&self, uv: Vec2) -> Vec3 {
                if uv.x > 0.5 {
                    Vec3::ONE
                } else {
                    Vec3::ZERO
                }
            }
        }
        let uniforms = CrtUniforms {
            glow_intensity: 1.0,
            resolution: Vec2::new(100.0, 100.0),
            ..default_uniforms()
        };
        let halo = glow(&Dot, Vec2::new(0.49, 0.5), &uniforms);
        assert!(halo.x > 0.1);
    }

    #[test]
    fn test_sanitized_recovers_degenerate_input() {
        let uniforms = CrtUniforms {
            curvature: -1.0,
            scanline_count: 0.0,
            phosphor_persistence: 3.0,
            scanline_intensity: f32::NAN,
            resolution: Vec2::ZERO,
            ..default_uniforms()
        };
        let clean = uniforms.sanitized((320, 240));
        assert_eq!(clean.curvature, 0.0);
        assert_eq!(clean.scanline_count, 1.0);
        assert_eq!(clean.phosphor_persistence, 1.0);
        assert_eq!(clean.scanline_intensity, CrtSettings::default().scanline_intensity);
        assert_eq!(clean.resolution, Vec2::new(320.0, 240.0));
    }

    #[test]
    fn test_sanitized_keeps_valid_input() {
        let uniforms = default_uniforms();
        assert_eq!(uniforms.sanitized((1, 1)), uniforms);
    }
}
