//! Casing material

use crate::uniforms::MaterialUniforms;
use glam::Vec3;

/// Roughness/metallic surface description of the monitor casing
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color: Vec3,
    pub metallic: f32,
    pub roughness: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: Vec3::ONE,
            metallic: 0.0,
            roughness: 0.5,
        }
    }
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_base_color(mut self, color: Vec3) -> Self {
        self.base_color = color;
        self
    }

    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }

    /// GPU record, with every parameter clamped to [0, 1]
    pub fn uniforms(&self) -> MaterialUniforms {
        let unit = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        MaterialUniforms {
            base_color: Vec3::new(
                unit(self.base_color.x),
                unit(self.base_color.y),
                unit(self.base_color.z),
            ),
            roughness: unit(self.roughness),
            metallic: unit(self.metallic),
            padding1: 0.0,
            padding2: 0.0,
            padding3: 0.0,
        }
    }

    // Preset materials

    pub fn plastic(color: Vec3) -> Self {
        Self::new("plastic")
            .with_base_color(color)
            .with_metallic(0.0)
            .with_roughness(0.4)
    }

    /// Yellowed beige of an old terminal
    pub fn retro_plastic() -> Self {
        let mut material = Self::plastic(Vec3::new(0.82, 0.78, 0.66)).with_roughness(0.55);
        material.name = "retro_plastic".to_string();
        material
    }

    pub fn metal(color: Vec3, roughness: f32) -> Self {
        Self::new("metal")
            .with_base_color(color)
            .with_metallic(1.0)
            .with_roughness(roughness)
    }

    pub fn brushed_aluminum() -> Self {
        Self::metal(Vec3::new(0.91, 0.92, 0.92), 0.35)
    }

    pub fn rubber(color: Vec3) -> Self {
        Self::new("rubber")
            .with_base_color(color)
            .with_metallic(0.0)
            .with_roughness(0.9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniforms_clamp_parameters() {
        let material = Material::new("odd")
            .with_base_color(Vec3::new(1.5, -0.2, 0.5))
            .with_metallic(2.0)
            .with_roughness(f32::NAN);
        let uniforms = material.uniforms();
        assert_eq!(uniforms.base_color, Vec3::new(1.0, 0.0, 0.5));
        assert_eq!(uniforms.metallic, 1.0);
        assert_eq!(uniforms.roughness, 0.0);
        assert_eq!(uniforms.padding1, 0.0);
    }

    #[test]
    fn test_presets() {
        assert_eq!(Material::brushed_aluminum().metallic, 1.0);
        assert_eq!(Material::rubber(Vec3::ZERO).roughness, 0.9);
        let retro = Material::retro_plastic();
        assert_eq!(retro.name, "retro_plastic");
        assert_eq!(retro.metallic, 0.0);
        assert_eq!(retro.roughness, 0.55);
    }
}
