//! Scene state: what gets drawn into the offscreen target, and the monitor
//! prop that displays it

mod camera;
mod light;
mod monitor_prop;
mod transform;

pub use camera::*;
pub use light::*;
pub use monitor_prop::*;
pub use transform::*;

use crate::pipeline::scene_renderer::normal_matrix;
use crate::pipeline::{MeshHandle, SceneDraw};
use crate::uniforms::SceneUniforms;
use glam::{Mat4, Vec3, Vec4};

/// A renderable object in the scene
#[derive(Debug, Clone)]
pub struct RenderObject {
    pub mesh: MeshHandle,
    pub transform: Transform,
}

impl RenderObject {
    pub fn new(mesh: MeshHandle) -> Self {
        Self {
            mesh,
            transform: Transform::default(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.transform.scale = scale;
        self
    }
}

/// Content shown on the monitor
#[derive(Debug, Clone)]
pub struct Scene {
    pub camera: Camera,
    pub lighting: LightingParams,
    pub objects: Vec<RenderObject>,
    pub clear_color: Vec4,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            camera: Camera::default(),
            lighting: LightingParams::default(),
            objects: Vec::new(),
            clear_color: Vec4::new(0.02, 0.02, 0.03, 1.0),
        }
    }

    pub fn add_object(&mut self, object: RenderObject) -> usize {
        let id = self.objects.len();
        self.objects.push(object);
        id
    }

    /// One draw per object for a target with the given aspect ratio
    pub fn draws(&self, aspect: f32) -> Vec<SceneDraw> {
        self.objects
            .iter()
            .map(|object| SceneDraw {
                mesh: object.mesh,
                uniforms: build_scene_uniforms(
                    object.transform.matrix(),
                    &self.camera,
                    aspect,
                    &self.lighting,
                ),
            })
            .collect()
    }
}

/// Per-draw uniforms from a model matrix and the current camera and light
pub fn build_scene_uniforms(
    model: Mat4,
    camera: &Camera,
    aspect: f32,
    lighting: &LightingParams,
) -> SceneUniforms {
    SceneUniforms {
        model_matrix: model,
        view_matrix: camera.view_matrix(),
        projection_matrix: camera.projection_matrix_with_aspect(aspect),
        normal_matrix: normal_matrix(model),
        light_position: lighting.light.shading_position(),
        ambient_intensity: lighting.ambient_intensity,
        light_color: lighting.light.color(),
        diffuse_intensity: lighting.diffuse_intensity,
        camera_position: camera.position,
        specular_intensity: lighting.specular_intensity,
        specular_power: lighting.specular_power,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_scene_uniforms() {
        let camera = Camera::new(Vec3::new(0.0, 1.0, 4.0), Vec3::ZERO);
        let lighting = LightingParams::default()
            .with_light(Light::point(Vec3::new(2.0, 3.0, 1.0), Vec3::new(1.0, 0.9, 0.8)))
            .with_specular(0.25, 64.0);
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));

        let uniforms = build_scene_uniforms(model, &camera, 1.5, &lighting);
        assert_eq!(uniforms.model_matrix, model);
        assert_eq!(uniforms.normal_matrix, normal_matrix(model));
        assert_eq!(uniforms.camera_position, camera.position);
        assert_eq!(uniforms.light_position, Vec3::new(2.0, 3.0, 1.0));
        assert_eq!(uniforms.light_color, Vec3::new(1.0, 0.9, 0.8));
        assert_eq!(uniforms.specular_power, 64.0);
        assert_eq!(uniforms.padding1, 0.0);
        assert_eq!(
            uniforms.projection_matrix,
            camera.projection_matrix_with_aspect(1.5)
        );
    }

    #[test]
    fn test_scene_draws_follow_objects() {
        let mut scene = Scene::new();
        scene.add_object(RenderObject::new(MeshHandle(0)));
        scene.add_object(RenderObject::new(MeshHandle(1)).with_position(Vec3::X));
        let draws = scene.draws(4.0 / 3.0);
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[1].mesh, MeshHandle(1));
        assert_eq!(draws[1].uniforms.model_matrix, Mat4::from_translation(Vec3::X));
    }
}
