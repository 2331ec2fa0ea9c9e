//! `lumen` - render a demo scene with the CPU path tracer.
//!
//! Logs go to stderr so the PPM written to stdout stays clean:
//!
//! ```text
//! lumen --scene cover --samples 50 -j 8 > cover.ppm
//! lumen --config settings.json --output spheres.png --scene spheres
//! ```

mod scenes;

use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lumen_renderer::{FailurePolicy, RenderSettings};

use crate::scenes::SceneKind;

#[derive(Parser, Debug)]
#[command(name = "lumen", version, about = "Offline CPU path tracer")]
struct Cli {
    /// JSON render settings; the scene's own camera is used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Demo scene to render
    #[arg(short, long, value_enum, default_value_t = SceneKind::Cover)]
    scene: SceneKind,

    /// Seed for the random scene layout
    #[arg(long, default_value_t = 0)]
    scene_seed: u64,

    /// Output image (.ppm or .png); plain PPM on stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Image width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Samples per pixel
    #[arg(long)]
    samples: Option<u32>,

    /// Maximum bounces per path
    #[arg(long)]
    max_depth: Option<u32>,

    /// Worker threads (0 = all cores)
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Sampling seed for reproducible renders
    #[arg(long)]
    seed: Option<u64>,

    /// Give up on unfinished rows after this many seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// Paint rows of failed workers instead of aborting the render
    #[arg(long)]
    fallback: bool,

    /// Print the effective settings as JSON and exit
    #[arg(long)]
    print_settings: bool,
}

impl Cli {
    /// Merge the settings file, the scene camera and command line overrides.
    fn settings(&self, scene_camera: lumen_renderer::CameraConfig) -> Result<RenderSettings> {
        let mut settings = match &self.config {
            Some(path) => RenderSettings::load(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => RenderSettings {
                camera: scene_camera,
                ..RenderSettings::default()
            },
        };

        if let Some(width) = self.width {
            settings.camera.image_width = width;
        }
        if let Some(samples) = self.samples {
            settings.camera.samples_per_pixel = samples;
        }
        if let Some(depth) = self.max_depth {
            settings.camera.max_depth = depth;
        }
        if let Some(workers) = self.workers {
            settings.workers = workers;
        }
        if self.seed.is_some() {
            settings.seed = self.seed;
        }
        if self.timeout.is_some() {
            settings.timeout_secs = self.timeout;
        }
        if self.fallback {
            settings.failure_policy = FailurePolicy::Fallback;
        }

        Ok(settings)
    }
}

fn main() -> Result<()> {
    // Info by default, RUST_LOG still wins
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    let (world, scene_camera) = scenes::build(cli.scene, cli.scene_seed);
    let settings = cli.settings(scene_camera)?;

    if cli.print_settings {
        println!("{}", settings.to_json_pretty()?);
        return Ok(());
    }

    log::info!("Starting Lumen ({:?} scene)", cli.scene);

    let output = settings.render(&world).context("Render failed")?;
    let report = &output.report;
    log::info!(
        "{} workers, seed {}, {:.2?}",
        report.workers,
        report.seed,
        report.elapsed
    );
    if !report.is_complete() {
        for failure in &report.failures {
            log::warn!(
                "Rows {:?} filled with fallback color ({})",
                failure.unfinished_rows(),
                failure.reason
            );
        }
    }

    match &cli.output {
        Some(path) => output
            .image
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let mut writer = BufWriter::new(io::stdout().lock());
            output
                .image
                .write_ppm(&mut writer)
                .context("Failed to write PPM to stdout")?;
        }
    }

    Ok(())
}
