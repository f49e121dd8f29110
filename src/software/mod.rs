//! CPU implementation of the frame passes
//!
//! Evaluates the same shading functions as the WGSL programs. The scene and
//! monitor passes rasterize on one thread; the CRT pass is split across rows
//! with rayon.

mod buffers;
mod raster;

pub use buffers::{ColorImage, DepthBuffer};
pub use raster::{draw_triangle, ClipVertex, RasterTarget};

use crate::backend::{BackendError, BackendResult, CullMode};
use crate::pipeline::crt::shade_pixel;
use crate::pipeline::monitor::{sample_screen, shade_casing};
use crate::pipeline::scene_renderer::shade_fragment;
use crate::pipeline::{validate_programs, FrameBackend, MeshHandle, MonitorDraw, SceneDraw};
use crate::resources::{Mesh, QuadMesh};
use crate::uniforms::{CrtUniforms, SceneUniforms};
use glam::{UVec2, Vec2, Vec3, Vec4};
use rayon::prelude::*;

/// Largest target edge the software renderer accepts
pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

enum SoftwareMesh {
    Scene(Mesh),
    Quad(QuadMesh),
}

/// Deterministic CPU renderer presenting into an in-memory framebuffer
pub struct SoftwareRenderer {
    meshes: Vec<SoftwareMesh>,
    framebuffer: ColorImage,
    depth: DepthBuffer,
    max_dimension: u32,
    frame_open: bool,
}

impl SoftwareRenderer {
    /// Renderer presenting into a `width` x `height` framebuffer
    pub fn new(width: u32, height: u32) -> BackendResult<Self> {
        Self::with_max_dimension(width, height, DEFAULT_MAX_DIMENSION)
    }

    pub fn with_max_dimension(width: u32, height: u32, max_dimension: u32) -> BackendResult<Self> {
        validate_programs()?;
        check_size("framebuffer", width, height, max_dimension)?;
        log::info!("Software renderer initialized ({}x{})", width, height);

        Ok(Self {
            meshes: Vec::new(),
            framebuffer: ColorImage::new(width, height),
            depth: DepthBuffer::new(width, height),
            max_dimension,
            frame_open: false,
        })
    }

    /// The last presented frame
    pub fn presented(&self) -> &ColorImage {
        &self.framebuffer
    }

    fn push_mesh(&mut self, mesh: SoftwareMesh) -> MeshHandle {
        self.meshes.push(mesh);
        MeshHandle(self.meshes.len() as u32 - 1)
    }
}

fn check_size(label: &str, width: u32, height: u32, max: u32) -> BackendResult<()> {
    if width == 0 || height == 0 || width > max || height > max {
        return Err(BackendError::TextureCreationFailed(format!(
            "{label}: {width}x{height} outside 1..={max}"
        )));
    }
    Ok(())
}

/// Vertex stage of the lit programs: clip position, world position, world
/// normal
fn lit_triangles<'a>(
    mesh: &'a Mesh,
    uniforms: &'a SceneUniforms,
) -> impl Iterator<Item = [ClipVertex<6>; 3]> + 'a {
    let view_projection = uniforms.projection_matrix * uniforms.view_matrix;
    let transform = move |position: Vec3, normal: Vec3| {
        let world = uniforms.model_matrix * position.extend(1.0);
        let normal = uniforms.normal_matrix.transform_vector3(normal);
        ClipVertex::new(
            view_projection * world,
            [world.x, world.y, world.z, normal.x, normal.y, normal.z],
        )
    };
    mesh.triangles().map(move |[a, b, c]| {
        [
            transform(a.position, a.normal),
            transform(b.position, b.normal),
            transform(c.position, c.normal),
        ]
    })
}

fn split_lit(varyings: [f32; 6]) -> (Vec3, Vec3) {
    (
        Vec3::new(varyings[0], varyings[1], varyings[2]),
        Vec3::new(varyings[3], varyings[4], varyings[5]),
    )
}

impl FrameBackend for SoftwareRenderer {
    type Target = ColorImage;

    fn create_target(&mut self, width: u32, height: u32, label: &str) -> BackendResult<ColorImage> {
        check_size(label, width, height, self.max_dimension)?;
        log::debug!("Allocated software target '{}' ({}x{})", label, width, height);
        Ok(ColorImage::new(width, height))
    }

    fn destroy_target(&mut self, _target: ColorImage) {}

    fn upload_mesh(&mut self, mesh: &Mesh) -> BackendResult<MeshHandle> {
        if mesh.indices.iter().any(|&i| i as usize >= mesh.vertices.len()) {
            return Err(BackendError::BufferCreationFailed(format!(
                "mesh '{}' indexes past its {} vertices",
                mesh.name,
                mesh.vertices.len()
            )));
        }
        Ok(self.push_mesh(SoftwareMesh::Scene(mesh.clone())))
    }

    fn upload_quad(&mut self, quad: &QuadMesh) -> BackendResult<MeshHandle> {
        if quad.indices.iter().any(|&i| i as usize >= quad.vertices.len()) {
            return Err(BackendError::BufferCreationFailed(
                "quad indexes past its vertices".to_string(),
            ));
        }
        Ok(self.push_mesh(SoftwareMesh::Quad(quad.clone())))
    }

    fn output_size(&self) -> (u32, u32) {
        self.framebuffer.size()
    }

    fn resize_output(&mut self, width: u32, height: u32) -> BackendResult<()> {
        check_size("framebuffer", width, height, self.max_dimension)?;
        if self.framebuffer.size() != (width, height) {
            self.framebuffer = ColorImage::new(width, height);
        }
        Ok(())
    }

    fn begin_frame(&mut self) -> BackendResult<()> {
        self.frame_open = true;
        Ok(())
    }

    fn draw_scene(
        &mut self,
        target: &mut ColorImage,
        clear_color: Vec4,
        draws: &[SceneDraw],
    ) -> BackendResult<()> {
        target.clear(clear_color);
        self.depth.reset(target.width(), target.height(), 1.0);
        let mut raster = RasterTarget {
            color: target,
            depth: &mut self.depth,
        };

        for draw in draws {
            let Some(SoftwareMesh::Scene(mesh)) = self.meshes.get(draw.mesh.0 as usize) else {
                log::debug!("Scene draw references unknown mesh {:?}", draw.mesh);
                continue;
            };
            let mut shade = |varyings: [f32; 6]| {
                let (world, normal) = split_lit(varyings);
                shade_fragment(&draw.uniforms, world, normal)
            };
            for triangle in lit_triangles(mesh, &draw.uniforms) {
                draw_triangle(&mut raster, &triangle, CullMode::Back, &mut shade);
            }
        }
        Ok(())
    }

    fn post_process(
        &mut self,
        scene: &ColorImage,
        previous: Option<&ColorImage>,
        output: &mut ColorImage,
        uniforms: &CrtUniforms,
    ) -> BackendResult<()> {
        let (width, height) = output.size();
        let previous = previous.filter(|p| p.size() == (width, height));
        let size = Vec2::new(width as f32, height as f32);

        output
            .pixels_mut()
            .par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, pixel) in row.iter_mut().enumerate() {
                    let coord = UVec2::new(x as u32, y as u32);
                    let uv = (coord.as_vec2() + Vec2::splat(0.5)) / size;
                    let history = previous.map(|p| p.rgb(coord.x, coord.y));
                    *pixel = shade_pixel(uniforms, uv, coord, scene, history).extend(1.0);
                }
            });
        Ok(())
    }

    fn composite(&mut self, screen: &ColorImage, monitor: &MonitorDraw) -> BackendResult<()> {
        let (width, height) = self.framebuffer.size();
        self.framebuffer.clear(monitor.clear_color);
        self.depth.reset(width, height, 1.0);

        let casing = match self.meshes.get(monitor.casing.0 as usize) {
            Some(SoftwareMesh::Scene(mesh)) => Some(mesh),
            _ => None,
        };
        let quad = match self.meshes.get(monitor.screen.0 as usize) {
            Some(SoftwareMesh::Quad(quad)) => Some(quad),
            _ => None,
        };
        let mut raster = RasterTarget {
            color: &mut self.framebuffer,
            depth: &mut self.depth,
        };

        if let Some(mesh) = casing {
            let uniforms = &monitor.casing_uniforms;
            let mut shade = |varyings: [f32; 6]| {
                let (world, normal) = split_lit(varyings);
                shade_casing(uniforms, &monitor.material, world, normal)
            };
            for triangle in lit_triangles(mesh, uniforms) {
                draw_triangle(&mut raster, &triangle, CullMode::Back, &mut shade);
            }
        }

        if let Some(quad) = quad {
            let mvp = monitor.screen_uniforms.model_view_projection();
            let mut shade = |[u, v]: [f32; 2]| sample_screen(screen, Vec2::new(u, v));
            for tri in quad.indices.chunks_exact(3) {
                let corner = |i: u32| {
                    let vertex = &quad.vertices[i as usize];
                    ClipVertex::new(
                        mvp * vertex.position.extend(0.0).extend(1.0),
                        vertex.tex_coord.to_array(),
                    )
                };
                let triangle = [corner(tri[0]), corner(tri[1]), corner(tri[2])];
                draw_triangle(&mut raster, &triangle, CullMode::None, &mut shade);
            }
        }

        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        if !self.frame_open {
            log::warn!("end_frame without begin_frame");
        }
        self.frame_open = false;
        Ok(())
    }

    fn abort_frame(&mut self) {
        self.frame_open = false;
    }
}
