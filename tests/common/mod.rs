//! Shared fixtures for the pipeline integration tests.
//!
//! Everything runs on the software backend, so the tests need no GPU.

#![allow(dead_code)]

use crt_monitor::resources::Material;
use crt_monitor::scene::{Camera, LightingParams, MonitorProp, Scene};
use crt_monitor::{
    ColorImage, CrtSettings, FrameBackend, FrameInputs, FrameOrchestrator, SoftwareRenderer,
};
use glam::{Vec2, Vec3, Vec4};
use std::time::Duration;

/// One 60 Hz frame
pub const FRAME: Duration = Duration::from_micros(16_667);

/// Framebuffer size of the presented image
pub const OUTPUT_SIZE: (u32, u32) = (32, 32);

pub const ROOM_COLOR: Vec4 = Vec4::new(0.2, 0.1, 0.3, 1.0);

/// An empty scene (so the scene target is its clear color) on a monitor
/// viewed head-on
pub struct Fixture {
    pub scene: Scene,
    pub monitor: MonitorProp,
    pub viewer: Camera,
    pub room: LightingParams,
}

impl Fixture {
    pub fn inputs(&self) -> FrameInputs<'_> {
        FrameInputs {
            scene: &self.scene,
            monitor: &self.monitor,
            viewer: &self.viewer,
            room: &self.room,
            clear_color: ROOM_COLOR,
        }
    }

    /// Make the scene target a constant color
    pub fn set_scene_color(&mut self, color: Vec3) {
        self.scene.clear_color = color.extend(1.0);
    }
}

/// White scene on a monitor whose meshes live in `backend`
pub fn fixture<B: FrameBackend>(backend: &mut B) -> Fixture {
    let monitor =
        MonitorProp::upload(backend, Vec2::new(1.2, 0.9), Material::retro_plastic()).unwrap();

    let mut scene = Scene::new();
    scene.clear_color = Vec4::ONE;

    Fixture {
        scene,
        monitor,
        viewer: Camera::new(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO),
        room: LightingParams::default(),
    }
}

pub fn orchestrator(
    settings: CrtSettings,
    offscreen: (u32, u32),
) -> (FrameOrchestrator<SoftwareRenderer>, Fixture) {
    let mut renderer = SoftwareRenderer::new(OUTPUT_SIZE.0, OUTPUT_SIZE.1).unwrap();
    let fixture = fixture(&mut renderer);
    (FrameOrchestrator::new(renderer, settings, offscreen), fixture)
}

/// Settings with every time-varying or spatial effect off
pub fn steady_settings() -> CrtSettings {
    CrtSettings::passthrough()
}

/// Color of the center pixel of the last CRT output
pub fn crt_center(orchestrator: &FrameOrchestrator<SoftwareRenderer>) -> Vec3 {
    let output: &ColorImage = orchestrator
        .history()
        .previous()
        .expect("a frame has been presented");
    output.rgb(output.width() / 2, output.height() / 2)
}

pub fn assert_close(actual: Vec3, expected: Vec3, tolerance: f32) {
    assert!(
        (actual - expected).abs().max_element() <= tolerance,
        "expected {expected:?}, got {actual:?}"
    );
}
