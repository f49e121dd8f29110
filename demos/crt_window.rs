//! Windowed demo: an animated scene on a CRT monitor, rendered with wgpu
//!
//! Run with:
//!   cargo run --example crt_window
//!   RUST_LOG=debug cargo run --example crt_window

mod common;

use common::DemoWorld;
use crt_monitor::{window, Engine, FrameStatus, RendererConfig};

struct App {
    engine: Engine,
    world: DemoWorld,
    frames: u32,
}

fn main() {
    crt_monitor::init_logging();

    let config = RendererConfig::default().with_title("CRT Monitor");
    log::info!(
        "Starting with a {}x{} scene target",
        config.offscreen_width,
        config.offscreen_height
    );

    let setup_config = config.clone();
    let result = window::run(
        &config.title,
        config.width,
        config.height,
        move |window| -> crt_monitor::BackendResult<App> {
            let mut engine = Engine::new(window.window_arc(), &setup_config)?;
            let world = DemoWorld::build(engine.renderer_mut())?;
            Ok(App {
                engine,
                world,
                frames: 0,
            })
        },
        |window, app| {
            if window.was_resized() {
                let (width, height) = window.dimensions();
                if let Err(e) = app.engine.resize(width, height) {
                    log::error!("Resize failed: {}", e);
                    return false;
                }
                window.clear_resize_flag();
            }

            let time = app.engine.orchestrator().time() as f32;
            app.world.update(time);

            match app.engine.render(&app.world.inputs()) {
                Ok(FrameStatus::Presented) => {
                    app.frames += 1;
                    if app.frames % 600 == 0 {
                        log::info!("{} frames, t = {:.1}s", app.frames, time);
                    }
                    true
                }
                Ok(FrameStatus::Skipped(_)) => true,
                Err(e) => {
                    log::error!("Render failed: {}", e);
                    false
                }
            }
        },
    );

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
