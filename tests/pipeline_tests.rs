//! End-to-end frame tests on the software backend.
//!
//! The scene is left empty so the scene target holds exactly its clear color,
//! which makes the CRT output predictable pixel by pixel.
//!
//! ```bash
//! cargo test --test pipeline_tests
//! ```

mod common;

use rstest::rstest;

use common::{
    assert_close, crt_center, fixture, orchestrator, steady_settings, Fixture, FRAME,
    OUTPUT_SIZE, ROOM_COLOR,
};
use crt_monitor::pipeline::{MonitorDraw, SceneDraw};
use crt_monitor::resources::{Mesh, QuadMesh};
use crt_monitor::scene::RenderObject;
use crt_monitor::uniforms::CrtUniforms;
use crt_monitor::{
    BackendError, BackendResult, ColorImage, CrtSettings, FrameBackend, FrameOrchestrator,
    FrameStatus, MeshHandle, SoftwareRenderer,
};
use glam::{Vec3, Vec4};
use std::time::Duration;

// ============================================================================
// Phosphor Persistence
// ============================================================================

#[rstest]
#[case::quarter(0.25)]
#[case::half(0.5)]
#[case::slow(0.8)]
fn test_persistence_converges_with_ratio_p(#[case] p: f32) {
    let (mut orchestrator, mut fixture) =
        orchestrator(steady_settings().with_persistence(p), (16, 12));

    // Prime the history with white, then hold a constant gray
    fixture.set_scene_color(Vec3::ONE);
    orchestrator.render_frame(&fixture.inputs(), FRAME).unwrap();
    assert_close(crt_center(&orchestrator), Vec3::ONE, 1e-6);

    let target = Vec3::splat(0.2);
    fixture.set_scene_color(target);
    let mut distance = (crt_center(&orchestrator) - target).x;
    for _ in 0..6 {
        orchestrator.render_frame(&fixture.inputs(), FRAME).unwrap();
        let next = (crt_center(&orchestrator) - target).x;
        assert!(
            (next / distance - p).abs() < 1e-4,
            "ratio {} instead of {p}",
            next / distance
        );
        distance = next;
    }
}

#[test]
fn test_zero_persistence_reproduces_each_frame_exactly() {
    let (mut orchestrator, mut fixture) = orchestrator(steady_settings(), (16, 12));
    for color in [Vec3::ONE, Vec3::ZERO, Vec3::new(0.3, 0.6, 0.9), Vec3::ONE] {
        fixture.set_scene_color(color);
        orchestrator.render_frame(&fixture.inputs(), FRAME).unwrap();
        assert_eq!(crt_center(&orchestrator), color);
    }
}

#[test]
fn test_history_swaps_every_presented_frame() {
    let (mut orchestrator, mut fixture) = orchestrator(steady_settings(), (8, 8));
    assert!(orchestrator.history().previous().is_none());

    fixture.set_scene_color(Vec3::ONE);
    orchestrator.render_frame(&fixture.inputs(), FRAME).unwrap();
    fixture.set_scene_color(Vec3::ZERO);
    orchestrator.render_frame(&fixture.inputs(), FRAME).unwrap();

    // The buffer written first is the one written next
    let current = orchestrator.history().current().unwrap();
    assert_eq!(current.rgb(4, 4), Vec3::ONE);
    assert_eq!(crt_center(&orchestrator), Vec3::ZERO);
    assert_eq!(orchestrator.frame_index(), 2);
}

// ============================================================================
// Resource Availability
// ============================================================================

#[rstest]
#[case::zero_width((0, 24))]
#[case::zero_height((32, 0))]
#[case::oversized((100_000, 4))]
fn test_invalid_target_skips_then_resumes(#[case] size: (u32, u32)) {
    let (mut orchestrator, fixture) = orchestrator(steady_settings(), size);

    let status = orchestrator.render_frame(&fixture.inputs(), FRAME).unwrap();
    assert!(matches!(status, FrameStatus::Skipped(_)), "{status:?}");
    assert_eq!(orchestrator.frame_index(), 0);
    assert_eq!(orchestrator.time(), 0.0);
    assert!(orchestrator.history().previous().is_none());

    orchestrator.resize_offscreen(16, 12);
    let status = orchestrator.render_frame(&fixture.inputs(), FRAME).unwrap();
    assert_eq!(status, FrameStatus::Presented);
    assert_eq!(orchestrator.frame_index(), 1);
    assert!((orchestrator.time() - FRAME.as_secs_f64()).abs() < 1e-9);
}

#[test]
fn test_resize_discards_history() {
    let (mut orchestrator, mut fixture) =
        orchestrator(steady_settings().with_persistence(0.5), (16, 12));
    fixture.set_scene_color(Vec3::ONE);
    orchestrator.render_frame(&fixture.inputs(), FRAME).unwrap();

    orchestrator.resize_offscreen(20, 10);
    fixture.set_scene_color(Vec3::ZERO);
    orchestrator.render_frame(&fixture.inputs(), FRAME).unwrap();

    // No history after a resize, so nothing of the white frame remains
    assert_eq!(crt_center(&orchestrator), Vec3::ZERO);
    assert_eq!(orchestrator.history().previous().unwrap().size(), (20, 10));
}

#[test]
fn test_time_accumulates_elapsed() {
    let (mut orchestrator, fixture) = orchestrator(steady_settings(), (8, 8));
    for _ in 0..3 {
        orchestrator
            .render_frame(&fixture.inputs(), Duration::from_millis(250))
            .unwrap();
    }
    assert!((orchestrator.time() - 0.75).abs() < 1e-9);
}

// ============================================================================
// CRT Output
// ============================================================================

#[rstest]
#[case::full(1.0)]
#[case::dimmed(0.8)]
fn test_white_center_is_brightness_times_tint(#[case] brightness: f32) {
    let settings = CrtSettings::default()
        .with_curvature(0.02)
        .with_scanlines(300.0, 0.3)
        .with_flicker(0.0)
        .with_noise(0.0)
        .with_persistence(0.0)
        .with_brightness(brightness);
    let tint = settings.green_tint;
    let (mut orchestrator, fixture) = orchestrator(settings, (800, 600));

    orchestrator.render_frame(&fixture.inputs(), FRAME).unwrap();
    assert_close(crt_center(&orchestrator), tint * brightness, 1e-5);
}

#[test]
fn test_strong_curvature_blackens_corners() {
    let settings = steady_settings().with_curvature(0.5);
    let (mut orchestrator, fixture) = orchestrator(settings, (32, 24));

    orchestrator.render_frame(&fixture.inputs(), FRAME).unwrap();
    let output = orchestrator.history().previous().unwrap();
    assert_eq!(output.rgb(0, 0), Vec3::ZERO);
    assert_eq!(output.rgb(31, 23), Vec3::ZERO);
    assert_eq!(output.rgb(16, 12), Vec3::ONE);
}

// ============================================================================
// Monitor Composite
// ============================================================================

#[test]
fn test_presented_frame_shows_screen_inside_room() {
    let (mut orchestrator, fixture) = orchestrator(steady_settings(), (16, 12));
    orchestrator.render_frame(&fixture.inputs(), FRAME).unwrap();

    let presented = orchestrator.backend().presented();
    assert_eq!(presented.size(), OUTPUT_SIZE);
    // The screen faces the viewer and is unlit: the white scene shows as is
    assert_close(presented.rgb(16, 16), Vec3::ONE, 1e-5);
    // Corners look past the casing into the room
    assert_eq!(presented.get(0, 0), ROOM_COLOR);
}

#[test]
fn test_lit_scene_reaches_the_screen() {
    let (mut orchestrator, mut fixture) = orchestrator(steady_settings(), (32, 24));
    let cube = orchestrator.backend_mut().upload_mesh(&Mesh::cube()).unwrap();
    fixture.scene.add_object(RenderObject::new(cube).with_scale(Vec3::splat(1.5)));
    fixture.set_scene_color(Vec3::ZERO);

    orchestrator.render_frame(&fixture.inputs(), FRAME).unwrap();

    // The cube covers the middle of the scene target, the clear color the rest
    let output = orchestrator.history().previous().unwrap();
    assert!(output.rgb(16, 12).max_element() > 0.0);
    assert_eq!(output.rgb(0, 0), Vec3::ZERO);
}

#[test]
fn test_identical_inputs_render_identical_frames() {
    let settings = CrtSettings::default()
        .with_noise(0.2)
        .with_flicker(0.3)
        .with_persistence(0.4);
    let render = || {
        let (mut orchestrator, fixture) = orchestrator(settings.clone(), (24, 18));
        for _ in 0..3 {
            orchestrator.render_frame(&fixture.inputs(), FRAME).unwrap();
        }
        let crt = orchestrator.history().previous().unwrap().clone();
        (crt, orchestrator.backend().presented().clone())
    };

    let (crt_a, presented_a) = render();
    let (crt_b, presented_b) = render();
    assert_eq!(crt_a, crt_b);
    assert_eq!(presented_a, presented_b);
}

// ============================================================================
// Frame Bracketing
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Scene,
    Crt,
    Composite,
}

/// Software backend that fails one pass once and tracks frame brackets
struct FailingBackend {
    inner: SoftwareRenderer,
    fail_at: Option<(Stage, BackendError)>,
    open: bool,
    begins: u32,
    ends: u32,
    aborts: u32,
}

impl FailingBackend {
    fn new(stage: Stage, error: BackendError) -> Self {
        Self {
            inner: SoftwareRenderer::new(OUTPUT_SIZE.0, OUTPUT_SIZE.1).unwrap(),
            fail_at: Some((stage, error)),
            open: false,
            begins: 0,
            ends: 0,
            aborts: 0,
        }
    }

    fn fail(&mut self, stage: Stage) -> BackendResult<()> {
        match self.fail_at.take() {
            Some((at, error)) if at == stage => Err(error),
            other => {
                self.fail_at = other;
                Ok(())
            }
        }
    }
}

impl FrameBackend for FailingBackend {
    type Target = ColorImage;

    fn create_target(&mut self, width: u32, height: u32, label: &str) -> BackendResult<ColorImage> {
        self.inner.create_target(width, height, label)
    }

    fn destroy_target(&mut self, target: ColorImage) {
        self.inner.destroy_target(target);
    }

    fn upload_mesh(&mut self, mesh: &Mesh) -> BackendResult<MeshHandle> {
        self.inner.upload_mesh(mesh)
    }

    fn upload_quad(&mut self, quad: &QuadMesh) -> BackendResult<MeshHandle> {
        self.inner.upload_quad(quad)
    }

    fn output_size(&self) -> (u32, u32) {
        self.inner.output_size()
    }

    fn resize_output(&mut self, width: u32, height: u32) -> BackendResult<()> {
        self.inner.resize_output(width, height)
    }

    fn begin_frame(&mut self) -> BackendResult<()> {
        // A swapchain image cannot be acquired twice
        assert!(!self.open, "frame begun while the previous one is open");
        self.open = true;
        self.begins += 1;
        self.inner.begin_frame()
    }

    fn draw_scene(
        &mut self,
        target: &mut ColorImage,
        clear_color: Vec4,
        draws: &[SceneDraw],
    ) -> BackendResult<()> {
        self.fail(Stage::Scene)?;
        self.inner.draw_scene(target, clear_color, draws)
    }

    fn post_process(
        &mut self,
        scene: &ColorImage,
        previous: Option<&ColorImage>,
        output: &mut ColorImage,
        uniforms: &CrtUniforms,
    ) -> BackendResult<()> {
        self.fail(Stage::Crt)?;
        self.inner.post_process(scene, previous, output, uniforms)
    }

    fn composite(&mut self, screen: &ColorImage, monitor: &MonitorDraw) -> BackendResult<()> {
        self.fail(Stage::Composite)?;
        self.inner.composite(screen, monitor)
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.open = false;
        self.ends += 1;
        self.inner.end_frame()
    }

    fn abort_frame(&mut self) {
        self.open = false;
        self.aborts += 1;
        self.inner.abort_frame();
    }
}

fn failing_orchestrator(
    stage: Stage,
    error: BackendError,
) -> (FrameOrchestrator<FailingBackend>, Fixture) {
    let mut backend = FailingBackend::new(stage, error);
    let fixture = fixture(&mut backend);
    (FrameOrchestrator::new(backend, steady_settings(), (16, 12)), fixture)
}

#[rstest]
#[case::scene(Stage::Scene)]
#[case::crt(Stage::Crt)]
#[case::composite(Stage::Composite)]
fn test_failed_pass_closes_frame_and_next_frame_presents(#[case] stage: Stage) {
    let (mut orchestrator, fixture) = failing_orchestrator(stage, BackendError::OutOfMemory);

    let status = orchestrator.render_frame(&fixture.inputs(), FRAME).unwrap();
    assert!(matches!(status, FrameStatus::Skipped(_)), "{status:?}");
    let backend = orchestrator.backend();
    assert!(!backend.open);
    assert_eq!((backend.begins, backend.ends, backend.aborts), (1, 0, 1));
    assert_eq!(orchestrator.frame_index(), 0);

    let status = orchestrator.render_frame(&fixture.inputs(), FRAME).unwrap();
    assert_eq!(status, FrameStatus::Presented);
    let backend = orchestrator.backend();
    assert_eq!((backend.begins, backend.ends, backend.aborts), (2, 1, 1));
    assert_eq!(orchestrator.frame_index(), 1);
}

#[test]
fn test_fatal_pass_error_still_closes_frame() {
    let (mut orchestrator, fixture) = failing_orchestrator(
        Stage::Composite,
        BackendError::PipelineCreationFailed("composite".into()),
    );

    let result = orchestrator.render_frame(&fixture.inputs(), FRAME);
    assert!(matches!(result, Err(BackendError::PipelineCreationFailed(_))));
    assert!(!orchestrator.backend().open);
    assert_eq!(orchestrator.backend().aborts, 1);
    assert!(orchestrator.history().previous().is_none());
}
