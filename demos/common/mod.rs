//! Demo world shared by the windowed and snapshot demos

use crt_monitor::resources::{Material, Mesh};
use crt_monitor::scene::{
    Camera, Light, LightingParams, MonitorProp, RenderObject, Scene, Transform,
};
use crt_monitor::{BackendResult, FrameBackend, FrameInputs};
use glam::{Quat, Vec2, Vec3, Vec4};

/// A spinning cube and an orbiting sphere above a floor, shown on a beige
/// monitor in a dim room
pub struct DemoWorld {
    pub scene: Scene,
    pub monitor: MonitorProp,
    pub viewer: Camera,
    pub room: LightingParams,
    pub room_color: Vec4,
    cube: usize,
    sphere: usize,
}

impl DemoWorld {
    pub fn build<B: FrameBackend>(backend: &mut B) -> BackendResult<Self> {
        let cube_mesh = backend.upload_mesh(&Mesh::cube())?;
        let sphere_mesh = backend.upload_mesh(&Mesh::sphere(24, 16))?;
        let floor_mesh = backend.upload_mesh(&Mesh::plane(8.0, 8.0, 4))?;

        let mut scene = Scene::new();
        scene.camera = Camera::new(Vec3::new(0.0, 1.5, 4.0), Vec3::new(0.0, 0.3, 0.0));
        scene.lighting = LightingParams::default()
            .with_light(Light::point(Vec3::new(2.0, 4.0, 3.0), Vec3::new(1.0, 0.95, 0.9)))
            .with_specular(0.6, 48.0);

        let cube = scene.add_object(RenderObject::new(cube_mesh).with_position(Vec3::new(0.0, 0.5, 0.0)));
        let sphere = scene.add_object(
            RenderObject::new(sphere_mesh)
                .with_position(Vec3::new(1.2, 0.4, 0.0))
                .with_scale(Vec3::splat(0.4)),
        );
        scene.add_object(RenderObject::new(floor_mesh));

        let monitor = MonitorProp::upload(backend, Vec2::new(1.2, 0.9), Material::retro_plastic())?
            .with_transform(Transform::from_position_rotation(
                Vec3::new(0.0, 0.0, 0.0),
                Quat::from_rotation_y(-0.25),
            ));

        let viewer = Camera::new(Vec3::new(0.6, 0.3, 2.2), Vec3::new(0.0, 0.0, 0.0));
        let room = LightingParams::default()
            .with_light(Light::point(Vec3::new(-1.5, 2.5, 2.5), Vec3::new(1.0, 0.9, 0.75)))
            .with_ambient(0.15);

        Ok(Self {
            scene,
            monitor,
            viewer,
            room,
            room_color: Vec4::new(0.05, 0.045, 0.04, 1.0),
            cube,
            sphere,
        })
    }

    /// Animate the scene to `time` seconds
    pub fn update(&mut self, time: f32) {
        let cube = &mut self.scene.objects[self.cube].transform;
        cube.rotation = Quat::from_rotation_y(time * 0.8) * Quat::from_rotation_x(time * 0.3);

        let sphere = &mut self.scene.objects[self.sphere].transform;
        sphere.position = Vec3::new((time * 0.6).cos() * 1.2, 0.4, (time * 0.6).sin() * 1.2);
    }

    pub fn inputs(&self) -> FrameInputs<'_> {
        FrameInputs {
            scene: &self.scene,
            monitor: &self.monitor,
            viewer: &self.viewer,
            room: &self.room,
            clear_color: self.room_color,
        }
    }
}
