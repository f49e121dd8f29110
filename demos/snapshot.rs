//! Headless demo: renders frames with the software backend and writes PNGs
//!
//! Run with:
//!   cargo run --release --example snapshot -- --frames 30 --every 10 --out frames
//!   cargo run --release --example snapshot -- --passthrough --frames 1

mod common;

use clap::Parser;
use common::DemoWorld;
use crt_monitor::{
    BackendResult, CrtSettings, FrameOrchestrator, FrameStatus, SoftwareRenderer,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(about = "Render CRT monitor frames to PNG without a GPU")]
struct Args {
    /// Presented framebuffer width
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Presented framebuffer height
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Scene target width
    #[arg(long, default_value_t = 400)]
    scene_width: u32,

    /// Scene target height
    #[arg(long, default_value_t = 300)]
    scene_height: u32,

    /// Number of frames to render
    #[arg(long, default_value_t = 10)]
    frames: u32,

    /// Write every n-th frame; the last frame is always written
    #[arg(long, default_value_t = 0)]
    every: u32,

    /// Simulated frame rate
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Output directory
    #[arg(long, default_value = "snapshots")]
    out: PathBuf,

    /// Disable every CRT effect
    #[arg(long)]
    passthrough: bool,

    /// Barrel distortion strength
    #[arg(long)]
    curvature: Option<f32>,

    /// Phosphor persistence in [0, 1)
    #[arg(long)]
    persistence: Option<f32>,
}

impl Args {
    fn settings(&self) -> CrtSettings {
        let mut settings = if self.passthrough {
            CrtSettings::passthrough()
        } else {
            CrtSettings::default()
        };
        if let Some(curvature) = self.curvature {
            settings = settings.with_curvature(curvature);
        }
        if let Some(persistence) = self.persistence {
            settings = settings.with_persistence(persistence);
        }
        settings
    }
}

fn run(args: &Args) -> BackendResult<()> {
    std::fs::create_dir_all(&args.out)
        .map_err(|e| crt_monitor::BackendError::ImageExport(e.to_string()))?;

    let mut renderer = SoftwareRenderer::new(args.width, args.height)?;
    let mut world = DemoWorld::build(&mut renderer)?;
    let mut orchestrator = FrameOrchestrator::new(
        renderer,
        args.settings(),
        (args.scene_width, args.scene_height),
    );

    let frame_time = Duration::from_secs_f64(1.0 / args.fps.max(1.0));
    for frame in 0..args.frames {
        world.update(orchestrator.time() as f32);
        match orchestrator.render_frame(&world.inputs(), frame_time)? {
            FrameStatus::Presented => {}
            FrameStatus::Skipped(reason) => {
                log::warn!("Frame {} skipped: {}", frame, reason);
                continue;
            }
        }

        let last = frame + 1 == args.frames;
        let periodic = args.every > 0 && frame % args.every == 0;
        if last || periodic {
            let path = args.out.join(format!("frame_{frame:04}.png"));
            orchestrator.backend().presented().save_png(&path)?;
            log::info!("Wrote {}", path.display());
        }
    }
    Ok(())
}

fn main() {
    crt_monitor::init_logging();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
