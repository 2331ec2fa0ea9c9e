//! Lumen renderer - CPU path tracing.
//!
//! A Monte Carlo path tracer that splits the image into scanline bands
//! rendered by independent worker threads into one shared pixel buffer.
//!
//! # Example
//!
//! ```no_run
//! use lumen_renderer::{Color, HittableList, Lambertian, RenderSettings, Sphere, Vec3};
//!
//! let mut world = HittableList::new();
//! world.add(Sphere::new(Vec3::new(0.0, 0.0, -1.0), 0.5, Lambertian::new(Color::splat(0.5))));
//!
//! let output = RenderSettings::default().render(&world)?;
//! output.image.save("out.png")?;
//! # Ok::<(), lumen_renderer::RenderError>(())
//! ```

mod buffer;
mod camera;
mod config;
mod error;
mod hittable;
mod integrator;
mod material;
mod renderer;
mod scheduler;
mod sphere;

pub mod sampling;

pub use buffer::{color_to_rgb, linear_to_gamma, PixelBuffer, RowBand};
pub use camera::{Camera, CameraConfig};
pub use config::RenderSettings;
pub use error::{
    CameraError, CameraResult, ConfigError, ConfigResult, RenderError, RenderResult,
};
pub use hittable::{HitRecord, Hittable, HittableList};
pub use integrator::{ray_color, Sky, RAY_EPSILON};
pub use material::{Color, Dielectric, Lambertian, Material, Metal, ScatterResult};
pub use renderer::{render_pixel, render_row};
pub use scheduler::{
    partition_rows, BandFailure, FailurePolicy, RenderOutput, RenderReport, Scheduler,
    WorkerFailure,
};
pub use sphere::Sphere;

/// Re-export Vec3 and common math types from lumen_math
pub use lumen_math::{Interval, Ray, Vec3};
