//! Mesh data structures and generation
//!
//! All generated meshes wind their front faces counter-clockwise when seen
//! from the side the normal points to.

use crate::pipeline::scene_renderer::normal_matrix;
use crate::uniforms::{QuadVertex, SceneVertex};
use glam::{Mat4, Vec2, Vec3};

/// Indexed triangle list of scene vertices
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<SceneVertex>,
    pub indices: Vec<u32>,
    pub name: String,
}

impl Mesh {
    pub fn new(name: &str) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            name: name.to_string(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Iterate over triangles as vertex triples
    pub fn triangles(&self) -> impl Iterator<Item = [&SceneVertex; 3]> + '_ {
        self.indices.chunks_exact(3).map(|tri| {
            [
                &self.vertices[tri[0] as usize],
                &self.vertices[tri[1] as usize],
                &self.vertices[tri[2] as usize],
            ]
        })
    }

    /// Append `other` transformed by `transform`
    pub fn append(&mut self, other: &Mesh, transform: Mat4) {
        let base = self.vertices.len() as u32;
        let normals = normal_matrix(transform);
        self.vertices.extend(other.vertices.iter().map(|v| {
            SceneVertex::new(
                transform.transform_point3(v.position),
                normals.transform_vector3(v.normal).normalize_or_zero(),
                v.tex_coord,
            )
        }));
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Unit cube centered at origin
    pub fn cube() -> Self {
        let mut mesh = Self::cuboid(Vec3::ONE);
        mesh.name = "cube".to_string();
        mesh
    }

    /// Axis-aligned box centered at origin with edge lengths `size`
    pub fn cuboid(size: Vec3) -> Self {
        let mut mesh = Mesh::new("cuboid");
        let h = size * 0.5;

        let faces = [
            // Front
            (Vec3::Z, [(-1.0, -1.0, 1.0), (1.0, -1.0, 1.0), (1.0, 1.0, 1.0), (-1.0, 1.0, 1.0)]),
            // Back
            (-Vec3::Z, [(1.0, -1.0, -1.0), (-1.0, -1.0, -1.0), (-1.0, 1.0, -1.0), (1.0, 1.0, -1.0)]),
            // Right
            (Vec3::X, [(1.0, -1.0, 1.0), (1.0, -1.0, -1.0), (1.0, 1.0, -1.0), (1.0, 1.0, 1.0)]),
            // Left
            (-Vec3::X, [(-1.0, -1.0, -1.0), (-1.0, -1.0, 1.0), (-1.0, 1.0, 1.0), (-1.0, 1.0, -1.0)]),
            // Top
            (Vec3::Y, [(-1.0, 1.0, 1.0), (1.0, 1.0, 1.0), (1.0, 1.0, -1.0), (-1.0, 1.0, -1.0)]),
            // Bottom
            (-Vec3::Y, [(-1.0, -1.0, -1.0), (1.0, -1.0, -1.0), (1.0, -1.0, 1.0), (-1.0, -1.0, 1.0)]),
        ];
        let uvs = [
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
        ];

        for (normal, corners) in faces {
            let base = mesh.vertices.len() as u32;
            for (corner, uv) in corners.into_iter().zip(uvs) {
                let position = Vec3::new(corner.0, corner.1, corner.2) * h;
                mesh.vertices.push(SceneVertex::new(position, normal, uv));
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        mesh
    }

    /// UV sphere of diameter 1
    pub fn sphere(segments: u32, rings: u32) -> Self {
        let mut mesh = Mesh::new("sphere");
        let segments = segments.max(3);
        let rings = rings.max(2);

        let segment_angle = 2.0 * std::f32::consts::PI / segments as f32;
        let ring_angle = std::f32::consts::PI / rings as f32;

        for ring in 0..=rings {
            let phi = ring as f32 * ring_angle;
            let y = phi.cos();
            let ring_radius = phi.sin();

            for segment in 0..=segments {
                let theta = segment as f32 * segment_angle;
                let normal = Vec3::new(ring_radius * theta.cos(), y, ring_radius * theta.sin());
                let uv = Vec2::new(
                    segment as f32 / segments as f32,
                    ring as f32 / rings as f32,
                );
                mesh.vertices
                    .push(SceneVertex::new(normal * 0.5, normal.normalize_or_zero(), uv));
            }
        }

        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;

                mesh.indices.extend_from_slice(&[
                    current,
                    current + 1,
                    next,
                    current + 1,
                    next + 1,
                    next,
                ]);
            }
        }

        mesh
    }

    /// Plane on the XZ axis facing +Y
    pub fn plane(width: f32, depth: f32, subdivisions: u32) -> Self {
        let mut mesh = Mesh::new("plane");
        let subdivisions = subdivisions.max(1);

        let half_width = width / 2.0;
        let half_depth = depth / 2.0;
        let step_x = width / subdivisions as f32;
        let step_z = depth / subdivisions as f32;

        for z in 0..=subdivisions {
            for x in 0..=subdivisions {
                let px = -half_width + x as f32 * step_x;
                let pz = -half_depth + z as f32 * step_z;

                mesh.vertices.push(SceneVertex::new(
                    Vec3::new(px, 0.0, pz),
                    Vec3::Y,
                    Vec2::new(x as f32 / subdivisions as f32, z as f32 / subdivisions as f32),
                ));
            }
        }

        for z in 0..subdivisions {
            for x in 0..subdivisions {
                let current = z * (subdivisions + 1) + x;
                let next = current + subdivisions + 1;

                mesh.indices.extend_from_slice(&[
                    current,
                    next,
                    current + 1,
                    current + 1,
                    next,
                    next + 1,
                ]);
            }
        }

        mesh
    }

    /// Casing of a CRT monitor whose screen opening is `screen_size`, centered
    /// at the origin in the z = 0 plane and facing +Z.
    ///
    /// A bezel frame of width `bezel` protrudes `bezel * 0.5` in front of the
    /// screen plane; the body and the tapered tube housing extend `depth`
    /// behind it.
    pub fn monitor_casing(screen_size: Vec2, bezel: f32, depth: f32) -> Self {
        let mut mesh = Mesh::new("monitor_casing");
        let (w, h) = (screen_size.x, screen_size.y);
        let lip = bezel * 0.5;
        let outer = Vec2::new(w + 2.0 * bezel, h + 2.0 * bezel);

        let mut add_box = |center: Vec3, size: Vec3| {
            mesh.append(&Mesh::cuboid(size), Mat4::from_translation(center));
        };

        // Bezel frame
        let bar_y = h * 0.5 + bezel * 0.5;
        let bar_x = w * 0.5 + bezel * 0.5;
        add_box(Vec3::new(0.0, bar_y, lip * 0.5), Vec3::new(outer.x, bezel, lip));
        add_box(Vec3::new(0.0, -bar_y, lip * 0.5), Vec3::new(outer.x, bezel, lip));
        add_box(Vec3::new(-bar_x, 0.0, lip * 0.5), Vec3::new(bezel, h, lip));
        add_box(Vec3::new(bar_x, 0.0, lip * 0.5), Vec3::new(bezel, h, lip));

        // Body behind the screen plane
        add_box(Vec3::new(0.0, 0.0, -depth * 0.5), outer.extend(depth));

        // Tube housing
        let housing = (outer * 0.6).extend(depth * 0.6);
        add_box(Vec3::new(0.0, 0.0, -depth - housing.z * 0.5), housing);

        mesh
    }
}

/// Indexed quad of [`QuadVertex`]; texture coordinate (0, 0) is the top-left
/// corner.
#[derive(Debug, Clone)]
pub struct QuadMesh {
    pub vertices: Vec<QuadVertex>,
    pub indices: Vec<u32>,
}

impl QuadMesh {
    /// Quad covering clip space
    pub fn fullscreen() -> Self {
        Self::screen(Vec2::splat(2.0))
    }

    /// Quad of the given size centered at the origin in the XY plane
    pub fn screen(size: Vec2) -> Self {
        let h = size * 0.5;
        Self {
            vertices: vec![
                QuadVertex::new(Vec2::new(-h.x, -h.y), Vec2::new(0.0, 1.0)),
                QuadVertex::new(Vec2::new(h.x, -h.y), Vec2::new(1.0, 1.0)),
                QuadVertex::new(Vec2::new(h.x, h.y), Vec2::new(1.0, 0.0)),
                QuadVertex::new(Vec2::new(-h.x, h.y), Vec2::new(0.0, 0.0)),
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every non-degenerate triangle must wind counter-clockwise around its
    /// vertex normals
    fn assert_outward(mesh: &Mesh) {
        for [a, b, c] in mesh.triangles() {
            let face = (b.position - a.position).cross(c.position - a.position);
            if face.length() < 1e-7 {
                continue;
            }
            let normal = a.normal + b.normal + c.normal;
            assert!(
                face.dot(normal) > 0.0,
                "{}: triangle {:?} {:?} {:?} winds inward",
                mesh.name,
                a.position,
                b.position,
                c.position
            );
        }
    }

    #[test]
    fn test_cube() {
        let cube = Mesh::cube();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.index_count(), 36);
        assert_eq!(cube.triangle_count(), 12);
        assert_outward(&cube);
    }

    #[test]
    fn test_sphere() {
        let sphere = Mesh::sphere(16, 8);
        assert_eq!(sphere.vertex_count(), 17 * 9);
        assert_eq!(sphere.index_count(), 16 * 8 * 6);
        for v in &sphere.vertices {
            assert!((v.position.length() - 0.5).abs() < 1e-5);
        }
        assert_outward(&sphere);
    }

    #[test]
    fn test_plane() {
        let plane = Mesh::plane(4.0, 2.0, 2);
        assert_eq!(plane.vertex_count(), 9);
        assert_eq!(plane.triangle_count(), 8);
        assert_outward(&plane);
    }

    #[test]
    fn test_cuboid_extent() {
        let mesh = Mesh::cuboid(Vec3::new(2.0, 1.0, 0.5));
        let max = mesh
            .vertices
            .iter()
            .fold(Vec3::splat(f32::MIN), |m, v| m.max(v.position));
        assert_eq!(max, Vec3::new(1.0, 0.5, 0.25));
    }

    #[test]
    fn test_append_offsets_indices_and_rotates_normals() {
        let mut mesh = Mesh::cube();
        let rotation = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2);
        mesh.append(&Mesh::cube(), rotation);
        assert_eq!(mesh.vertex_count(), 48);
        assert_eq!(*mesh.indices.iter().max().unwrap(), 47);
        // +Z rotated a quarter turn about Y points along +X
        assert!((mesh.vertices[24].normal - Vec3::X).length() < 1e-5);
        assert_outward(&mesh);
    }

    #[test]
    fn test_monitor_casing_leaves_screen_open() {
        let screen = Vec2::new(1.6, 1.2);
        let casing = Mesh::monitor_casing(screen, 0.15, 1.0);
        assert_outward(&casing);

        // Nothing of the casing lies in front of the screen opening
        for [a, b, c] in casing.triangles() {
            let center = (a.position + b.position + c.position) / 3.0;
            let inside = center.x.abs() < screen.x * 0.5 - 1e-4
                && center.y.abs() < screen.y * 0.5 - 1e-4;
            assert!(!(inside && center.z > 1e-4), "casing covers the screen at {center:?}");
        }
    }

    #[test]
    fn test_quad_corners() {
        let quad = QuadMesh::fullscreen();
        assert_eq!(quad.vertices.len(), 4);
        let top_left = quad.vertices[3];
        assert_eq!(top_left.position, Vec2::new(-1.0, 1.0));
        assert_eq!(top_left.tex_coord, Vec2::ZERO);
        assert_eq!(quad.vertex_bytes().len(), 64);
    }
}
