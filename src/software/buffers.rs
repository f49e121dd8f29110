//! CPU color and depth images

use crate::backend::{BackendError, BackendResult};
use crate::pipeline::crt::SampleSource;
use glam::{Vec2, Vec3, Vec4};
use std::path::Path;

/// Linear RGBA image with `f32` channels, row-major, top row first
#[derive(Debug, Clone, PartialEq)]
pub struct ColorImage {
    width: u32,
    height: u32,
    pixels: Vec<Vec4>,
}

impl ColorImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Vec4::new(0.0, 0.0, 0.0, 1.0))
    }

    pub fn filled(width: u32, height: u32, color: Vec4) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width as usize * height as usize],
        }
    }

    /// Image whose pixel (x, y) is `f(x, y)`
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Vec4) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [Vec4] {
        &mut self.pixels
    }

    pub fn clear(&mut self, color: Vec4) {
        self.pixels.fill(color);
    }

    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn rgb(&self, x: u32, y: u32) -> Vec3 {
        self.get(x, y).truncate()
    }

    pub fn set(&mut self, x: u32, y: u32, color: Vec4) {
        let width = self.width;
        self.pixels[(y * width + x) as usize] = color;
    }

    fn texel(&self, x: i64, y: i64) -> Vec3 {
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        self.rgb(x, y)
    }

    /// Bilinear, clamp-to-edge lookup.
    ///
    /// Neighborhoods of equal texels return that texel exactly, whatever the
    /// weights.
    pub fn sample_bilinear(&self, uv: Vec2) -> Vec3 {
        if self.pixels.is_empty() {
            return Vec3::ZERO;
        }
        let x = uv.x * self.width as f32 - 0.5;
        let y = uv.y * self.height as f32 - 0.5;
        if !x.is_finite() || !y.is_finite() {
            return Vec3::ZERO;
        }

        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        if fx == 0.0 && fy == 0.0 {
            return self.texel(x0, y0);
        }

        let top = mix(self.texel(x0, y0), self.texel(x0 + 1, y0), fx);
        let bottom = mix(self.texel(x0, y0 + 1), self.texel(x0 + 1, y0 + 1), fx);
        mix(top, bottom, fy)
    }

    /// 8-bit RGBA copy, channels clamped to [0, 1]
    pub fn to_rgba_image(&self) -> image::RgbaImage {
        let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        image::RgbaImage::from_fn(self.width, self.height, |x, y| {
            let c = self.get(x, y);
            image::Rgba([to_u8(c.x), to_u8(c.y), to_u8(c.z), to_u8(c.w)])
        })
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> BackendResult<()> {
        let path = path.as_ref();
        self.to_rgba_image()
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| BackendError::ImageExport(format!("{}: {e}", path.display())))?;
        log::debug!("Wrote {}x{} frame to {}", self.width, self.height, path.display());
        Ok(())
    }
}

impl SampleSource for ColorImage {
    fn sample(&self, uv: Vec2) -> Vec3 {
        self.sample_bilinear(uv)
    }
}

/// Depth attachment cleared to the far plane
#[derive(Debug, Clone)]
pub struct DepthBuffer {
    width: u32,
    height: u32,
    depth: Vec<f32>,
}

impl DepthBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: vec![1.0; width as usize * height as usize],
        }
    }

    /// Resize if needed and clear to `value`
    pub fn reset(&mut self, width: u32, height: u32, value: f32) {
        self.width = width;
        self.height = height;
        self.depth.clear();
        self.depth.resize(width as usize * height as usize, value);
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.depth[(y * self.width + x) as usize]
    }

    /// Less-than depth test; writes `z` when it passes
    pub fn test_and_set(&mut self, x: u32, y: u32, z: f32) -> bool {
        let slot = &mut self.depth[(y * self.width + x) as usize];
        if z < *slot {
            *slot = z;
            true
        } else {
            false
        }
    }
}

fn mix(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> ColorImage {
        ColorImage::from_fn(4, 2, |x, y| {
            let v = ((x + y) % 2) as f32;
            Vec4::new(v, v, v, 1.0)
        })
    }

    #[test]
    fn test_texel_centers_are_exact() {
        let image = checker();
        for y in 0..2 {
            for x in 0..4 {
                let uv = Vec2::new((x as f32 + 0.5) / 4.0, (y as f32 + 0.5) / 2.0);
                assert_eq!(image.sample_bilinear(uv), image.rgb(x, y));
            }
        }
    }

    #[test]
    fn test_uniform_region_is_exact_off_center() {
        let color = Vec4::new(0.3, 0.6, 0.9, 1.0);
        let image = ColorImage::filled(7, 5, color);
        for uv in [Vec2::new(0.123, 0.877), Vec2::new(0.5, 0.5), Vec2::new(0.999, 0.01)] {
            assert_eq!(image.sample_bilinear(uv), color.truncate());
        }
    }

    #[test]
    fn test_bilinear_midpoint() {
        let image = checker();
        // Halfway between texel (0,0) = 0 and (1,0) = 1
        let value = image.sample_bilinear(Vec2::new(0.25, 0.25));
        assert!((value.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_clamp_to_edge() {
        let image = checker();
        assert_eq!(image.sample_bilinear(Vec2::new(-1.0, -1.0)), image.rgb(0, 0));
        assert_eq!(image.sample_bilinear(Vec2::new(2.0, 0.9)), image.rgb(3, 1));
    }

    #[test]
    fn test_to_rgba_clamps() {
        let image = ColorImage::filled(1, 1, Vec4::new(2.0, -1.0, 0.5, 1.0));
        let rgba = image.to_rgba_image();
        assert_eq!(rgba.get_pixel(0, 0).0, [255, 0, 128, 255]);
    }

    #[test]
    fn test_depth_less() {
        let mut depth = DepthBuffer::new(2, 2);
        assert!(depth.test_and_set(1, 1, 0.5));
        assert!(!depth.test_and_set(1, 1, 0.5));
        assert!(depth.test_and_set(1, 1, 0.25));
        assert!(!depth.test_and_set(0, 0, 1.0));
        assert_eq!(depth.get(1, 1), 0.25);
    }
}
