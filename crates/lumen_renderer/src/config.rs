//! Render settings, loadable from JSON.
//!
//! ```json
//! {
//!   "camera": { "image_width": 400, "aspect_ratio": 1.7777, "samples_per_pixel": 50 },
//!   "workers": 8,
//!   "seed": 42,
//!   "timeout_secs": 600,
//!   "failure_policy": "fallback"
//! }
//! ```
//!
//! Every field is optional and falls back to its default.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult, RenderResult};
use crate::integrator::Sky;
use crate::scheduler::{FailurePolicy, RenderOutput, Scheduler};
use crate::{Camera, CameraConfig, Color, Hittable};

/// Everything needed to render a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub camera: CameraConfig,
    pub sky: Sky,
    /// Worker thread count; 0 picks the available parallelism
    pub workers: usize,
    /// Base random seed; `None` draws a fresh one per render
    pub seed: Option<u64>,
    /// Per-render liveness deadline in seconds
    pub timeout_secs: Option<f64>,
    pub failure_policy: FailurePolicy,
    /// Color painted over rows a failed worker did not finish
    pub fallback_color: Color,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            sky: Sky::default(),
            workers: 0,
            seed: None,
            timeout_secs: None,
            failure_policy: FailurePolicy::Abort,
            fallback_color: Color::new(1.0, 0.0, 1.0),
        }
    }
}

impl RenderSettings {
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded render settings from {}", path.display());
        Ok(settings)
    }

    pub fn to_json_pretty(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Worker count for an image `image_height` rows tall.
    ///
    /// An explicit count is used as-is (and validated by the scheduler);
    /// 0 means one worker per available core, capped at one per row.
    pub fn resolved_workers(&self, image_height: u32) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        cores.min(image_height.max(1) as usize)
    }

    /// Configured seed, or a fresh random one.
    pub fn resolved_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            let seed: u64 = rand::random();
            log::info!("Using random seed {seed}");
            seed
        })
    }

    /// Deadline as a `Duration`; negative or non-finite values disable it.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Build the scheduler for an image `image_height` rows tall.
    pub fn scheduler(&self, image_height: u32) -> Scheduler {
        Scheduler::new(self.resolved_workers(image_height), self.resolved_seed())
            .with_timeout(self.timeout())
            .with_failure_policy(self.failure_policy, self.fallback_color)
    }

    /// Validate the camera and render `world`.
    pub fn render(&self, world: &dyn Hittable) -> RenderResult<RenderOutput> {
        let camera = Camera::new(self.camera.clone())?;
        self.scheduler(camera.image_height())
            .render(&camera, world, &self.sky)
    }
}
