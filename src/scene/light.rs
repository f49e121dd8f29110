//! Room light and lighting parameters

use glam::Vec3;

/// Distance at which a directional light is placed when encoded as a point
const DIRECTIONAL_DISTANCE: f32 = 1.0e4;

/// The single light of a scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Point { position: Vec3, color: Vec3 },
    /// `direction` is the direction the light travels
    Directional { direction: Vec3, color: Vec3 },
}

impl Default for Light {
    fn default() -> Self {
        Light::Point {
            position: Vec3::new(0.0, 5.0, 5.0),
            color: Vec3::ONE,
        }
    }
}

impl Light {
    pub fn point(position: Vec3, color: Vec3) -> Self {
        Light::Point { position, color }
    }

    pub fn directional(direction: Vec3, color: Vec3) -> Self {
        Light::Directional {
            direction: direction.normalize_or_zero(),
            color,
        }
    }

    /// Position written to `light_position`.
    ///
    /// A directional light sits far along the reversed light direction, so the
    /// light vector is practically constant across the scene.
    pub fn shading_position(&self) -> Vec3 {
        match *self {
            Light::Point { position, .. } => position,
            Light::Directional { direction, .. } => -direction * DIRECTIONAL_DISTANCE,
        }
    }

    pub fn color(&self) -> Vec3 {
        match *self {
            Light::Point { color, .. } | Light::Directional { color, .. } => color,
        }
    }
}

/// Light plus the per-term intensities of the lighting model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingParams {
    pub light: Light,
    pub ambient_intensity: f32,
    pub diffuse_intensity: f32,
    pub specular_intensity: f32,
    pub specular_power: f32,
}

impl Default for LightingParams {
    fn default() -> Self {
        Self {
            light: Light::default(),
            ambient_intensity: 0.1,
            diffuse_intensity: 0.8,
            specular_intensity: 0.5,
            specular_power: 32.0,
        }
    }
}

impl LightingParams {
    pub fn with_light(mut self, light: Light) -> Self {
        self.light = light;
        self
    }

    pub fn with_ambient(mut self, intensity: f32) -> Self {
        self.ambient_intensity = intensity;
        self
    }

    pub fn with_diffuse(mut self, intensity: f32) -> Self {
        self.diffuse_intensity = intensity;
        self
    }

    pub fn with_specular(mut self, intensity: f32, power: f32) -> Self {
        self.specular_intensity = intensity;
        self.specular_power = power;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directional_light_is_far_away() {
        let light = Light::directional(Vec3::new(0.0, -1.0, -1.0), Vec3::ONE);
        let position = light.shading_position();
        let a = (position - Vec3::new(-2.0, 0.0, 0.0)).normalize();
        let b = (position - Vec3::new(2.0, 1.0, 3.0)).normalize();
        assert!(a.dot(b) > 0.9999);
        assert!(a.dot(Vec3::new(0.0, 1.0, 1.0).normalize()) > 0.999);
    }

    #[test]
    fn test_point_light_position() {
        let light = Light::point(Vec3::new(1.0, 2.0, 3.0), Vec3::X);
        assert_eq!(light.shading_position(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(light.color(), Vec3::X);
    }
}
