//! Per-frame sequencing of the scene, CRT and monitor passes

use crate::backend::BackendResult;
use crate::pipeline::{CrtSettings, FrameBackend};
use crate::scene::{Camera, LightingParams, MonitorProp, Scene};
use glam::{Vec2, Vec4};
use std::time::Duration;

/// Two post-process outputs: the one being written this frame and the one
/// written last frame
#[derive(Debug)]
pub struct HistoryBuffer<T> {
    current: Option<T>,
    previous: Option<T>,
    /// Whether `previous` holds a frame that was actually presented
    primed: bool,
}

impl<T> Default for HistoryBuffer<T> {
    fn default() -> Self {
        Self {
            current: None,
            previous: None,
            primed: false,
        }
    }
}

impl<T> HistoryBuffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_allocated(&self) -> bool {
        self.current.is_some() && self.previous.is_some()
    }

    pub fn allocate(&mut self, current: T, previous: T) {
        self.current = Some(current);
        self.previous = Some(previous);
        self.primed = false;
    }

    /// The frame written last time, `None` before the first presented frame
    pub fn previous(&self) -> Option<&T> {
        if self.primed {
            self.previous.as_ref()
        } else {
            None
        }
    }

    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// Previous (if primed) and current, borrowed together
    pub fn split(&mut self) -> (Option<&T>, Option<&mut T>) {
        let previous = if self.primed {
            self.previous.as_ref()
        } else {
            None
        };
        (previous, self.current.as_mut())
    }

    /// The just-written frame becomes the previous one
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
        self.primed = self.previous.is_some();
    }

    /// Forget both frames, returning them for destruction
    pub fn take(&mut self) -> Vec<T> {
        self.primed = false;
        self.current.take().into_iter().chain(self.previous.take()).collect()
    }
}

/// Per-frame external state
pub struct FrameInputs<'a> {
    pub scene: &'a Scene,
    pub monitor: &'a MonitorProp,
    /// Camera looking at the monitor
    pub viewer: &'a Camera,
    /// Light of the room the monitor stands in
    pub room: &'a LightingParams,
    pub clear_color: Vec4,
}

/// Outcome of [`FrameOrchestrator::render_frame`]
#[derive(Debug, Clone, PartialEq)]
pub enum FrameStatus {
    Presented,
    /// Nothing was presented; the frame is retried on the next call
    Skipped(String),
}

/// Owns the offscreen targets and drives one backend through the frame
pub struct FrameOrchestrator<B: FrameBackend> {
    backend: B,
    settings: CrtSettings,
    offscreen_size: (u32, u32),
    scene_target: Option<B::Target>,
    history: HistoryBuffer<B::Target>,
    time: f64,
    frame_index: u64,
}

impl<B: FrameBackend> FrameOrchestrator<B> {
    pub fn new(backend: B, settings: CrtSettings, offscreen_size: (u32, u32)) -> Self {
        Self {
            backend,
            settings,
            offscreen_size,
            scene_target: None,
            history: HistoryBuffer::new(),
            time: 0.0,
            frame_index: 0,
        }
    }

    /// Seconds of animation time accumulated over all presented frames
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of presented frames
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn settings(&self) -> &CrtSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut CrtSettings {
        &mut self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn history(&self) -> &HistoryBuffer<B::Target> {
        &self.history
    }

    pub fn offscreen_size(&self) -> (u32, u32) {
        self.offscreen_size
    }

    /// Change the scene target size. Targets and history are dropped and
    /// reallocated on the next frame.
    pub fn resize_offscreen(&mut self, width: u32, height: u32) {
        if (width, height) == self.offscreen_size && self.scene_target.is_some() {
            return;
        }
        log::debug!("Offscreen target resized to {}x{}", width, height);
        self.offscreen_size = (width, height);
        self.release_targets();
    }

    fn release_targets(&mut self) {
        if let Some(target) = self.scene_target.take() {
            self.backend.destroy_target(target);
        }
        for target in self.history.take() {
            self.backend.destroy_target(target);
        }
    }

    fn ensure_targets(&mut self) -> BackendResult<()> {
        let (width, height) = self.offscreen_size;
        if self.scene_target.is_none() {
            self.scene_target = Some(self.backend.create_target(width, height, "Scene Target")?);
        }
        if !self.history.is_allocated() {
            let current = self.backend.create_target(width, height, "CRT Output A")?;
            let previous = match self.backend.create_target(width, height, "CRT Output B") {
                Ok(target) => target,
                Err(e) => {
                    self.backend.destroy_target(current);
                    return Err(e);
                }
            };
            self.history.allocate(current, previous);
        }
        Ok(())
    }

    /// Render and present one frame, `elapsed` after the previous one.
    ///
    /// Transient failures skip the frame without advancing time; any other
    /// error is returned.
    pub fn render_frame(
        &mut self,
        inputs: &FrameInputs<'_>,
        elapsed: Duration,
    ) -> BackendResult<FrameStatus> {
        match self.try_render(inputs, elapsed) {
            Ok(()) => Ok(FrameStatus::Presented),
            Err(e) if e.is_transient() => {
                log::warn!("Frame {} skipped: {}", self.frame_index, e);
                Ok(FrameStatus::Skipped(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn try_render(&mut self, inputs: &FrameInputs<'_>, elapsed: Duration) -> BackendResult<()> {
        self.ensure_targets()?;
        let time = self.time + elapsed.as_secs_f64();

        self.backend.begin_frame()?;
        if let Err(e) = self.encode_passes(inputs, time) {
            self.backend.abort_frame();
            return Err(e);
        }
        self.backend.end_frame()?;

        self.history.swap();
        self.time = time;
        self.frame_index += 1;
        Ok(())
    }

    /// Record the scene, CRT and monitor passes into the open frame
    fn encode_passes(&mut self, inputs: &FrameInputs<'_>, time: f64) -> BackendResult<()> {
        let (width, height) = self.offscreen_size;
        let scene_aspect = width as f32 / height as f32;
        let (out_w, out_h) = self.backend.output_size();
        let output_aspect = out_w as f32 / out_h.max(1) as f32;

        let Some(scene_target) = self.scene_target.as_mut() else {
            return Ok(());
        };

        // Scene pass
        let draws = inputs.scene.draws(scene_aspect);
        self.backend
            .draw_scene(scene_target, inputs.scene.clear_color, &draws)?;

        // CRT pass
        let uniforms = self
            .settings
            .to_uniforms(time as f32, Vec2::new(width as f32, height as f32))
            .sanitized((width, height));
        let (previous, current) = self.history.split();
        let Some(current) = current else {
            return Ok(());
        };
        self.backend
            .post_process(scene_target, previous, current, &uniforms)?;

        // Monitor pass
        let monitor = inputs
            .monitor
            .draw(inputs.viewer, output_aspect, inputs.room, inputs.clear_color);
        self.backend.composite(current, &monitor)
    }
}

impl<B: FrameBackend> Drop for FrameOrchestrator<B> {
    fn drop(&mut self) {
        self.release_targets();
    }
}
