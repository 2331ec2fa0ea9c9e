//! Scanline work scheduling.
//!
//! The image rows are split into N contiguous bands, one per worker. Each
//! worker runs on its own thread of a dedicated rayon pool with its own
//! seeded generator and an exclusive `&mut` band of the shared
//! [`PixelBuffer`]. The coordinator reads the buffer only after the pool
//! scope has joined every worker.

use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::buffer::{PixelBuffer, RowBand};
use crate::error::{RenderError, RenderResult};
use crate::integrator::Sky;
use crate::renderer::render_row;
use crate::{Camera, Color, Hittable};

/// What to do when a worker panics or misses the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole render with [`RenderError::WorkerFailed`].
    #[default]
    Abort,
    /// Paint the unfinished rows with the fallback color and carry on.
    Fallback,
}

/// Why a worker stopped before finishing its band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerFailure {
    Panicked(String),
    TimedOut,
}

impl std::fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerFailure::Panicked(msg) => write!(f, "panicked: {msg}"),
            WorkerFailure::TimedOut => write!(f, "deadline exceeded"),
        }
    }
}

/// A band that did not finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandFailure {
    /// Rows assigned to the worker
    pub rows: Range<u32>,
    /// First row that was not fully rendered
    pub first_unfinished_row: u32,
    pub reason: WorkerFailure,
}

impl BandFailure {
    /// Rows whose pixels were not produced by the worker.
    pub fn unfinished_rows(&self) -> Range<u32> {
        self.first_unfinished_row..self.rows.end
    }
}

/// Summary of a completed render.
#[derive(Debug, Clone)]
pub struct RenderReport {
    pub workers: usize,
    pub seed: u64,
    pub bands: Vec<Range<u32>>,
    pub elapsed: Duration,
    /// Bands filled with the fallback color (only under [`FailurePolicy::Fallback`])
    pub failures: Vec<BandFailure>,
}

impl RenderReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Rendered image plus how it was produced.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub image: PixelBuffer,
    pub report: RenderReport,
}

/// Split `[0, height)` into `workers` contiguous, disjoint row ranges.
///
/// Every range gets `height / workers` rows; the last one also takes the
/// remainder. Requires `1 <= workers <= height`.
pub fn partition_rows(height: u32, workers: usize) -> RenderResult<Vec<Range<u32>>> {
    if workers == 0 || workers > height as usize {
        return Err(RenderError::InvalidWorkerCount { workers, height });
    }

    let n = workers as u32;
    let rows_per_worker = height / n;

    Ok((0..n)
        .map(|p| {
            let start = p * rows_per_worker;
            let end = if p == n - 1 { height } else { start + rows_per_worker };
            start..end
        })
        .collect())
}

/// Seed for worker `index`, derived from the render seed.
///
/// Distinct per band so neighbouring bands don't share sample patterns.
fn worker_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Worker-pool renderer over disjoint scanline bands.
#[derive(Debug, Clone)]
pub struct Scheduler {
    workers: usize,
    seed: u64,
    timeout: Option<Duration>,
    policy: FailurePolicy,
    fallback_color: Color,
}

impl Scheduler {
    /// Create a scheduler with `workers` threads and a fixed seed.
    pub fn new(workers: usize, seed: u64) -> Self {
        Self {
            workers,
            seed,
            timeout: None,
            policy: FailurePolicy::Abort,
            fallback_color: Color::new(1.0, 0.0, 1.0),
        }
    }

    /// Stop workers that are still busy `timeout` after dispatch.
    ///
    /// Checked before each scanline, so a single slow scanline can overrun.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy, fallback_color: Color) -> Self {
        self.policy = policy;
        self.fallback_color = fallback_color;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Render the full frame.
    ///
    /// Blocks until every worker has finished (or failed) its band.
    pub fn render(
        &self,
        camera: &Camera,
        world: &dyn Hittable,
        sky: &Sky,
    ) -> RenderResult<RenderOutput> {
        let width = camera.image_width();
        let height = camera.image_height();
        let ranges = partition_rows(height, self.workers)?;

        log::info!(
            "Rendering {}x{} @ {} spp, depth {}, {} workers",
            width,
            height,
            camera.samples_per_pixel(),
            camera.max_depth(),
            self.workers
        );
        log::debug!("Row bands: {:?}", ranges);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("lumen-worker-{i}"))
            .build()?;

        let mut image = PixelBuffer::new(width, height);
        let mut outcomes: Vec<Option<BandFailure>> = vec![None; ranges.len()];
        let start = Instant::now();
        // A deadline past the end of `Instant` is no deadline
        let deadline = self.timeout.and_then(|t| start.checked_add(t));

        let work: Vec<_> = image
            .bands_mut(&ranges)
            .into_iter()
            .zip(outcomes.iter_mut())
            .enumerate()
            .collect();

        // Scope exit is the completion barrier
        pool.scope(|s| {
            for (index, (mut band, outcome)) in work {
                let seed = worker_seed(self.seed, index);
                s.spawn(move |_| {
                    *outcome = self.run_worker(&mut band, camera, world, sky, seed, deadline);
                });
            }
        });

        let elapsed = start.elapsed();
        let failures: Vec<BandFailure> = outcomes.into_iter().flatten().collect();

        for failure in &failures {
            log::warn!(
                "Worker for rows {:?} stopped at row {}: {}",
                failure.rows,
                failure.first_unfinished_row,
                failure.reason
            );
        }

        if self.policy == FailurePolicy::Abort {
            if let Some(failure) = failures.into_iter().next() {
                log::error!("Render aborted after {:.2?}", elapsed);
                return Err(RenderError::WorkerFailed {
                    rows: failure.rows,
                    reason: failure.reason.to_string(),
                });
            }
            log::info!("Rendered in {:.2?}", elapsed);
            return Ok(RenderOutput {
                image,
                report: self.report(ranges, elapsed, Vec::new()),
            });
        }

        if failures.is_empty() {
            log::info!("Rendered in {:.2?}", elapsed);
        } else {
            log::warn!(
                "Rendered in {:.2?} with {} incomplete band(s) filled with fallback color",
                elapsed,
                failures.len()
            );
        }

        Ok(RenderOutput {
            image,
            report: self.report(ranges, elapsed, failures),
        })
    }

    fn report(
        &self,
        bands: Vec<Range<u32>>,
        elapsed: Duration,
        failures: Vec<BandFailure>,
    ) -> RenderReport {
        RenderReport {
            workers: self.workers,
            seed: self.seed,
            bands,
            elapsed,
            failures,
        }
    }

    /// Render one band to completion, catching panics and honouring the
    /// deadline. Returns the failure, if any.
    fn run_worker(
        &self,
        band: &mut RowBand<'_>,
        camera: &Camera,
        world: &dyn Hittable,
        sky: &Sky,
        seed: u64,
        deadline: Option<Instant>,
    ) -> Option<BandFailure> {
        let rows = band.rows();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut next_row = rows.start;

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            for row in rows.clone() {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return Err(WorkerFailure::TimedOut);
                }
                render_row(camera, world, sky, row, band.row_mut(row), &mut rng);
                next_row = row + 1;
            }
            Ok(())
        }));

        let reason = match result {
            Ok(Ok(())) => {
                log::debug!("Rows {:?} done", rows);
                return None;
            }
            Ok(Err(reason)) => reason,
            Err(payload) => WorkerFailure::Panicked(panic_message(payload.as_ref())),
        };

        if self.policy == FailurePolicy::Fallback {
            band.fill_from(next_row, self.fallback_color);
        }

        Some(BandFailure {
            rows,
            first_unfinished_row: next_row,
            reason,
        })
    }
}
