//! Triangle rasterizer
//!
//! Follows the conventions of the GPU path: clip-space depth in [0, w],
//! counter-clockwise front faces in normalized device coordinates, pixel
//! centers at half-integers, top row first, less-than depth test.

use super::buffers::{ColorImage, DepthBuffer};
use crate::backend::CullMode;
use glam::{Vec2, Vec3, Vec4};

/// A vertex after the vertex stage: clip position plus `N` varyings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipVertex<const N: usize> {
    pub clip: Vec4,
    pub varyings: [f32; N],
}

impl<const N: usize> ClipVertex<N> {
    pub fn new(clip: Vec4, varyings: [f32; N]) -> Self {
        Self { clip, varyings }
    }

    fn lerp(&self, other: &Self, t: f32) -> Self {
        let mut varyings = self.varyings;
        for (v, o) in varyings.iter_mut().zip(other.varyings) {
            *v += (o - *v) * t;
        }
        Self {
            clip: self.clip.lerp(other.clip, t),
            varyings,
        }
    }
}

/// Clip a triangle against the near plane (z >= 0).
///
/// Returns the resulting convex polygon, empty when it is fully behind.
fn clip_near<const N: usize>(triangle: &[ClipVertex<N>; 3]) -> Vec<ClipVertex<N>> {
    let mut polygon = Vec::with_capacity(4);
    for i in 0..3 {
        let current = &triangle[i];
        let next = &triangle[(i + 1) % 3];
        let (dc, dn) = (current.clip.z, next.clip.z);

        if dc >= 0.0 {
            polygon.push(*current);
        }
        if (dc >= 0.0) != (dn >= 0.0) {
            let t = dc / (dc - dn);
            polygon.push(current.lerp(next, t));
        }
    }
    polygon
}

/// Vertex in framebuffer space
#[derive(Debug, Clone, Copy)]
struct ScreenVertex<const N: usize> {
    position: Vec2,
    depth: f32,
    inv_w: f32,
    varyings: [f32; N],
}

fn to_screen<const N: usize>(vertex: &ClipVertex<N>, size: Vec2) -> Option<ScreenVertex<N>> {
    let w = vertex.clip.w;
    if w <= 0.0 || !w.is_finite() {
        return None;
    }
    let ndc = vertex.clip.truncate() / w;
    Some(ScreenVertex {
        position: Vec2::new((ndc.x * 0.5 + 0.5) * size.x, (0.5 - ndc.y * 0.5) * size.y),
        depth: ndc.z,
        inv_w: 1.0 / w,
        varyings: vertex.varyings,
    })
}

/// Twice the signed area of (a, b, c); negative for counter-clockwise NDC
/// winding once y points down
fn edge(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Pixel and depth targets of a draw
pub struct RasterTarget<'a> {
    pub color: &'a mut ColorImage,
    pub depth: &'a mut DepthBuffer,
}

/// Rasterize one clip-space triangle, calling `shade` with the
/// perspective-correct varyings of every visible pixel.
///
/// Returns the number of pixels written.
pub fn draw_triangle<const N: usize>(
    target: &mut RasterTarget<'_>,
    triangle: &[ClipVertex<N>; 3],
    cull: CullMode,
    shade: &mut impl FnMut([f32; N]) -> Vec3,
) -> usize {
    let polygon = clip_near(triangle);
    if polygon.len() < 3 {
        return 0;
    }

    let size = Vec2::new(target.color.width() as f32, target.color.height() as f32);
    let Some(screen) = polygon
        .iter()
        .map(|v| to_screen(v, size))
        .collect::<Option<Vec<_>>>()
    else {
        return 0;
    };

    let mut written = 0;
    for i in 1..screen.len() - 1 {
        written += fill(target, [&screen[0], &screen[i], &screen[i + 1]], cull, shade);
    }
    written
}

fn fill<const N: usize>(
    target: &mut RasterTarget<'_>,
    [a, b, c]: [&ScreenVertex<N>; 3],
    cull: CullMode,
    shade: &mut impl FnMut([f32; N]) -> Vec3,
) -> usize {
    let area = edge(a.position, b.position, c.position);
    if area == 0.0 || !area.is_finite() {
        return 0;
    }
    if cull == CullMode::Back && area > 0.0 {
        return 0;
    }

    let (width, height) = target.color.size();
    let min = a.position.min(b.position).min(c.position).floor().max(Vec2::ZERO);
    let max = a
        .position
        .max(b.position)
        .max(c.position)
        .ceil()
        .min(Vec2::new(width as f32, height as f32));
    if min.x >= max.x || min.y >= max.y {
        return 0;
    }

    let mut written = 0;
    for y in min.y as u32..max.y as u32 {
        for x in min.x as u32..max.x as u32 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(b.position, c.position, p) / area;
            let w1 = edge(c.position, a.position, p) / area;
            let w2 = edge(a.position, b.position, p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let depth = w0 * a.depth + w1 * b.depth + w2 * c.depth;
            if !(0.0..=1.0).contains(&depth) || !target.depth.test_and_set(x, y, depth) {
                continue;
            }

            let p0 = w0 * a.inv_w;
            let p1 = w1 * b.inv_w;
            let p2 = w2 * c.inv_w;
            let norm = 1.0 / (p0 + p1 + p2);
            let mut varyings = [0.0; N];
            for (k, v) in varyings.iter_mut().enumerate() {
                *v = (p0 * a.varyings[k] + p1 * b.varyings[k] + p2 * c.varyings[k]) * norm;
            }

            target.color.set(x, y, shade(varyings).extend(1.0));
            written += 1;
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    fn target_pair(size: u32) -> (ColorImage, DepthBuffer) {
        (ColorImage::new(size, size), DepthBuffer::new(size, size))
    }

    fn vertex(x: f32, y: f32, z: f32) -> ClipVertex<1> {
        ClipVertex::new(Vec4::new(x, y, z, 1.0), [x])
    }

    #[test]
    fn test_full_screen_triangle_covers_every_pixel() {
        let (mut color, mut depth) = target_pair(8);
        let mut target = RasterTarget {
            color: &mut color,
            depth: &mut depth,
        };
        let tri = [vertex(-1.0, -1.0, 0.5), vertex(3.0, -1.0, 0.5), vertex(-1.0, 3.0, 0.5)];
        let written = draw_triangle(&mut target, &tri, CullMode::Back, &mut |_| Vec3::ONE);
        assert_eq!(written, 64);
        assert_eq!(color.rgb(7, 7), Vec3::ONE);
    }

    #[test]
    fn test_back_faces_are_culled() {
        let (mut color, mut depth) = target_pair(8);
        let mut target = RasterTarget {
            color: &mut color,
            depth: &mut depth,
        };
        // Clockwise in NDC
        let tri = [vertex(-1.0, -1.0, 0.5), vertex(-1.0, 3.0, 0.5), vertex(3.0, -1.0, 0.5)];
        assert_eq!(draw_triangle(&mut target, &tri, CullMode::Back, &mut |_| Vec3::ONE), 0);
        assert!(draw_triangle(&mut target, &tri, CullMode::None, &mut |_| Vec3::ONE) > 0);
    }

    #[test]
    fn test_nearer_triangle_wins() {
        let (mut color, mut depth) = target_pair(4);
        let mut target = RasterTarget {
            color: &mut color,
            depth: &mut depth,
        };
        let quad = |z: f32| [vertex(-1.0, -1.0, z), vertex(3.0, -1.0, z), vertex(-1.0, 3.0, z)];
        draw_triangle(&mut target, &quad(0.3), CullMode::Back, &mut |_| Vec3::X);
        draw_triangle(&mut target, &quad(0.6), CullMode::Back, &mut |_| Vec3::Y);
        assert_eq!(color.rgb(2, 2), Vec3::X);
    }

    #[test]
    fn test_top_row_is_positive_y() {
        let (mut color, mut depth) = target_pair(4);
        let mut target = RasterTarget {
            color: &mut color,
            depth: &mut depth,
        };
        // Upper half of NDC
        let tri = [vertex(-1.0, 0.0, 0.5), vertex(3.0, 0.0, 0.5), vertex(-1.0, 4.0, 0.5)];
        draw_triangle(&mut target, &tri, CullMode::Back, &mut |_| Vec3::ONE);
        assert_eq!(color.rgb(0, 0), Vec3::ONE);
        assert_eq!(color.rgb(0, 3), Vec3::ZERO);
    }

    #[test]
    fn test_triangle_behind_camera_is_dropped() {
        let (mut color, mut depth) = target_pair(4);
        let mut target = RasterTarget {
            color: &mut color,
            depth: &mut depth,
        };
        let tri = [vertex(-1.0, -1.0, -0.5), vertex(3.0, -1.0, -0.5), vertex(-1.0, 3.0, -0.5)];
        assert_eq!(draw_triangle(&mut target, &tri, CullMode::None, &mut |_| Vec3::ONE), 0);
    }

    #[test]
    fn test_near_plane_clipping_keeps_visible_part() {
        let (mut color, mut depth) = target_pair(8);
        let mut target = RasterTarget {
            color: &mut color,
            depth: &mut depth,
        };
        let tri = [vertex(-1.0, -1.0, -1.0), vertex(3.0, -1.0, 1.0), vertex(-1.0, 3.0, 1.0)];
        let written = draw_triangle(&mut target, &tri, CullMode::Back, &mut |_| Vec3::ONE);
        assert!(written > 0 && written < 64, "{written}");
    }

    #[test]
    fn test_varyings_are_perspective_correct() {
        // A floor quad receding from the camera: texture v at the screen
        // center is not the screen-space midpoint
        let projection = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        let near = Vec3::new(0.0, -1.0, -1.0);
        let far = Vec3::new(0.0, -1.0, -9.0);
        let make = |p: Vec3, v: f32| ClipVertex::new(projection * p.extend(1.0), [v]);
        let left = Vec3::new(-50.0, 0.0, 0.0);
        let right = Vec3::new(50.0, 0.0, 0.0);
        let tri = [make(near + left, 0.0), make(near + right, 0.0), make(far + right, 1.0)];

        let (mut color, mut depth) = target_pair(64);
        let mut target = RasterTarget {
            color: &mut color,
            depth: &mut depth,
        };
        let mut samples = Vec::new();
        draw_triangle(&mut target, &tri, CullMode::None, &mut |[v]| {
            samples.push(v);
            Vec3::ONE
        });
        assert!(!samples.is_empty());
        assert!(samples.iter().all(|v| (-1e-4..=1.0001).contains(v)));
    }
}
