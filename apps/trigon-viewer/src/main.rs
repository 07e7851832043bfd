//! Trigon demo viewer.
//!
//! Opens a window and draws the demo grid of triangles until the window is
//! closed.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p trigon-viewer -- [OPTIONS]
//! ```
//!
//! Settings come from `trigon.toml` in the working directory when it exists
//! (`[window]` and `[engine]` sections); command-line options override it.
//! Compiled shaders are expected under `shaders/bin/` unless the config
//! points elsewhere.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Overrides the log filter chosen by `--verbosity`

mod config;
mod fps;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use trigon_core::{logging, Scene, Verbosity};
use trigon_gpu::RenderWindow;
use trigon_platform::PlatformWindow;
use trigon_render::{FrameStatus, RenderEngine};

use crate::config::{Overrides, ViewerConfig};
use crate::fps::FpsCounter;

#[derive(Parser, Debug)]
#[command(version, about = "Draws a grid of triangles with the Trigon renderer")]
struct Args {
    /// Config file; defaults are used when it does not exist.
    #[arg(short, long, default_value = "trigon.toml")]
    config: PathBuf,

    /// quiet, normal, verbose or trace.
    #[arg(short, long)]
    verbosity: Option<Verbosity>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Enable the validation layer.
    #[arg(long, conflicts_with = "no_validation")]
    validation: bool,

    /// Disable the validation layer.
    #[arg(long)]
    no_validation: bool,

    /// Present with FIFO instead of mailbox.
    #[arg(long)]
    vsync: bool,

    /// Exit after this many frames.
    #[arg(long)]
    frames: Option<u64>,
}

impl Args {
    const fn overrides(&self) -> Overrides {
        let validation = if self.validation {
            Some(true)
        } else if self.no_validation {
            Some(false)
        } else {
            None
        };
        Overrides {
            verbosity: self.verbosity,
            width: self.width,
            height: self.height,
            validation,
            vsync: self.vsync,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ViewerConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    config.apply(&args.overrides());

    logging::init(config.engine.verbosity);
    info!("{} starting...", config.window.title);

    let title = config.window.title.clone();
    let minimized_poll = config.engine.minimized_poll_interval();
    let (width, height) = (config.window.width, config.window.height);
    let window = PlatformWindow::new(config.window).context("Failed to open window")?;
    let mut engine = RenderEngine::initialize(width, height, window, config.engine)
        .context("Failed to initialize renderer")?;

    let scene = Scene::demo();
    if let Some(extent) = engine.extent() {
        info!(
            "Drawing {} triangles at {}x{}",
            scene.len(),
            extent.width,
            extent.height
        );
    }

    let mut fps = FpsCounter::new(Duration::from_secs(1), Instant::now());
    let mut frame_count = 0u64;
    loop {
        engine.window_mut().pump_events();
        if engine.window().close_requested() {
            break;
        }
        if engine.window().is_minimized() {
            std::thread::sleep(minimized_poll);
            continue;
        }

        if let FrameStatus::Dropped { stage } = engine.render(&scene)? {
            warn!("Frame dropped at {stage:?}");
        }
        frame_count += 1;

        if let Some(rate) = fps.tick(Instant::now()) {
            engine.window().set_title(&format!("{title} - {rate:.0} FPS"));
        }
        if args.frames.is_some_and(|limit| frame_count >= limit) {
            info!("Frame limit reached");
            break;
        }
    }

    let stats = engine.stats();
    info!(
        "{frame_count} frames: {} presented, {} dropped, {} swapchain rebuilds",
        stats.presented, stats.dropped, stats.recreations
    );
    if let Some((min, max)) = fps.range() {
        info!("FPS range: {min:.1} - {max:.1}");
    }

    engine.shutdown();
    Ok(())
}
