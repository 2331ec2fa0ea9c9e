//! Path tracing integrator.
//!
//! Traces a camera ray through the scene, multiplying in each surface's
//! attenuation until the ray escapes to the sky, is absorbed, or runs out
//! of bounces. The bounce recursion is unrolled into a loop that carries the
//! running attenuation product, so stack usage does not grow with depth.

use lumen_math::{Interval, Ray};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::{Color, Hittable};

/// Minimum hit distance for secondary rays.
///
/// Scattered rays start exactly on a surface; rounding error would otherwise
/// let them re-hit the surface they left ("shadow acne").
pub const RAY_EPSILON: f32 = 0.001;

/// Background seen by rays that escape the scene.
///
/// Blends linearly from `bottom` (straight down) to `top` (straight up)
/// using the vertical component of the ray direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sky {
    pub bottom: Color,
    pub top: Color,
}

impl Default for Sky {
    fn default() -> Self {
        Self {
            bottom: Color::new(1.0, 1.0, 1.0),
            top: Color::new(0.5, 0.7, 1.0),
        }
    }
}

impl Sky {
    /// Uniform background.
    pub fn solid(color: Color) -> Self {
        Self {
            bottom: color,
            top: color,
        }
    }

    /// Sky radiance along `ray`.
    pub fn color(&self, ray: &Ray) -> Color {
        let unit_direction = ray.unit_direction();
        let a = 0.5 * (unit_direction.y + 1.0);
        (1.0 - a) * self.bottom + a * self.top
    }
}

/// Compute the color seen by a ray with a budget of `depth` bounces.
///
/// A budget of zero gathers no light at all.
pub fn ray_color(
    ray: &Ray,
    world: &dyn Hittable,
    depth: u32,
    sky: &Sky,
    rng: &mut dyn RngCore,
) -> Color {
    let mut ray = *ray;
    let mut throughput = Color::ONE;

    for _ in 0..depth {
        let Some(rec) = world.hit(&ray, Interval::from_min(RAY_EPSILON)) else {
            return throughput * sky.color(&ray);
        };

        match rec.material.scatter(&ray, &rec, rng) {
            Some(result) => {
                throughput *= result.attenuation;
                ray = result.scattered;
            }
            None => return Color::ZERO,
        }
    }

    // Bounce budget exhausted
    Color::ZERO
}
