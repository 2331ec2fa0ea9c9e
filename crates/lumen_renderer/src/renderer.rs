//! Per-pixel and per-scanline sample accumulation.

use rand::RngCore;

use crate::integrator::{ray_color, Sky};
use crate::{Camera, Color, Hittable};

/// Render a single pixel with multi-sampling.
///
/// Sums `samples_per_pixel` jittered samples and scales the sum by the
/// camera's precomputed `1 / samples_per_pixel`.
pub fn render_pixel(
    camera: &Camera,
    world: &dyn Hittable,
    sky: &Sky,
    col: u32,
    row: u32,
    rng: &mut dyn RngCore,
) -> Color {
    let mut pixel_color = Color::ZERO;

    for _ in 0..camera.samples_per_pixel() {
        let ray = camera.get_ray(col, row, rng);
        pixel_color += ray_color(&ray, world, camera.max_depth(), sky, rng);
    }

    pixel_color * camera.pixel_samples_scale()
}

/// Render scanline `row` into `pixels`, one slot per column.
///
/// Each slot is written exactly once, after all of its samples are summed.
///
/// # Panics
///
/// Panics if `pixels` is not exactly one image row wide.
pub fn render_row(
    camera: &Camera,
    world: &dyn Hittable,
    sky: &Sky,
    row: u32,
    pixels: &mut [Color],
    rng: &mut dyn RngCore,
) {
    assert_eq!(
        pixels.len(),
        camera.image_width() as usize,
        "scanline buffer does not match image width"
    );

    for (col, slot) in pixels.iter_mut().enumerate() {
        *slot = render_pixel(camera, world, sky, col as u32, row, rng);
    }
}
