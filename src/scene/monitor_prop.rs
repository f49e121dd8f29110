//! The monitor the scene is shown on

use super::{build_scene_uniforms, Camera, LightingParams, Transform};
use crate::backend::BackendResult;
use crate::pipeline::{FrameBackend, MeshHandle, MonitorDraw};
use crate::resources::{Material, Mesh, QuadMesh};
use crate::uniforms::MaterialUniforms;
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Distance of the screen quad in front of the casing's screen plane
const SCREEN_OFFSET: f32 = 0.01;

/// Casing and screen geometry plus the casing material.
///
/// Material uniforms are rebuilt only when the material changes.
#[derive(Debug, Clone)]
pub struct MonitorProp {
    pub transform: Transform,
    pub casing: MeshHandle,
    pub screen: MeshHandle,
    material: Material,
    material_uniforms: MaterialUniforms,
}

impl MonitorProp {
    pub fn new(casing: MeshHandle, screen: MeshHandle, material: Material) -> Self {
        let material_uniforms = material.uniforms();
        Self {
            transform: Transform::default(),
            casing,
            screen,
            material,
            material_uniforms,
        }
    }

    /// Build the casing and screen meshes for a screen of `screen_size` and
    /// upload them to `backend`
    pub fn upload<B: FrameBackend>(
        backend: &mut B,
        screen_size: Vec2,
        material: Material,
    ) -> BackendResult<Self> {
        let bezel = screen_size.min_element() * 0.12;
        let depth = screen_size.max_element() * 0.7;
        let casing = backend.upload_mesh(&Mesh::monitor_casing(screen_size, bezel, depth))?;
        let screen = backend.upload_quad(&QuadMesh::screen(screen_size))?;
        Ok(Self::new(casing, screen, material))
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn set_material(&mut self, material: Material) {
        self.material_uniforms = material.uniforms();
        self.material = material;
    }

    pub fn material_uniforms(&self) -> &MaterialUniforms {
        &self.material_uniforms
    }

    pub fn screen_matrix(&self) -> Mat4 {
        self.transform.matrix() * Mat4::from_translation(Vec3::new(0.0, 0.0, SCREEN_OFFSET))
    }

    /// Everything the monitor pass needs to draw this prop from `viewer`
    pub fn draw(
        &self,
        viewer: &Camera,
        aspect: f32,
        room: &LightingParams,
        clear_color: Vec4,
    ) -> MonitorDraw {
        MonitorDraw {
            casing: self.casing,
            casing_uniforms: build_scene_uniforms(self.transform.matrix(), viewer, aspect, room),
            material: self.material_uniforms,
            screen: self.screen,
            screen_uniforms: build_scene_uniforms(self.screen_matrix(), viewer, aspect, room),
            clear_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_material_refreshes_uniforms() {
        let mut prop = MonitorProp::new(MeshHandle(0), MeshHandle(1), Material::retro_plastic());
        assert_eq!(prop.material_uniforms().roughness, 0.55);

        prop.set_material(Material::brushed_aluminum());
        assert_eq!(prop.material_uniforms().metallic, 1.0);
        assert_eq!(prop.material().name, "metal");
    }

    #[test]
    fn test_screen_sits_in_front_of_casing() {
        let prop = MonitorProp::new(MeshHandle(0), MeshHandle(1), Material::default())
            .with_transform(Transform::from_position(Vec3::new(0.0, 1.0, 0.0)));
        let viewer = Camera::new(Vec3::new(0.0, 1.0, 3.0), Vec3::new(0.0, 1.0, 0.0));
        let draw = prop.draw(&viewer, 1.0, &LightingParams::default(), Vec4::ZERO);

        let center = draw.screen_uniforms.model_matrix.transform_point3(Vec3::ZERO);
        assert!((center - Vec3::new(0.0, 1.0, SCREEN_OFFSET)).length() < 1e-6);
        assert_eq!(draw.casing, MeshHandle(0));
        assert_eq!(draw.screen, MeshHandle(1));
    }
}
