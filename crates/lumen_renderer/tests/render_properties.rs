//! End-to-end behaviour of the camera, integrator and scheduler together.

use std::time::Duration;

use lumen_renderer::{
    partition_rows, ray_color, render_pixel, render_row, Camera, CameraConfig, Color,
    Dielectric, FailurePolicy, HitRecord, Hittable, HittableList, Interval, Lambertian,
    Material, Metal, Ray, RenderError, ScatterResult, Scheduler, Sky, Sphere, Vec3,
    WorkerFailure,
};
use rand::rngs::mock::StepRng;
use rand::RngCore;

/// Generator whose every float is 0.5, i.e. zero pixel jitter.
fn midpoint_rng() -> StepRng {
    StepRng::new(0x8000_0000, 0)
}

fn demo_world() -> HittableList {
    let mut world = HittableList::new();
    world.add(Sphere::new(
        Vec3::new(0.0, -100.5, -1.0),
        100.0,
        Lambertian::new(Color::new(0.8, 0.8, 0.0)),
    ));
    world.add(Sphere::new(
        Vec3::new(0.0, 0.0, -1.2),
        0.5,
        Lambertian::new(Color::new(0.1, 0.2, 0.5)),
    ));
    world.add(Sphere::new(Vec3::new(-1.0, 0.0, -1.0), 0.5, Dielectric::new(1.5)));
    world.add(Sphere::new(
        Vec3::new(1.0, 0.0, -1.0),
        0.5,
        Metal::new(Color::new(0.8, 0.6, 0.2), 0.3),
    ));
    world
}

fn demo_camera(samples: u32, depth: u32) -> Camera {
    Camera::new(
        CameraConfig::default()
            .with_resolution(24, 2.0)
            .with_quality(samples, depth)
            .with_position(Vec3::new(-2.0, 2.0, 1.0), Vec3::new(0.0, 0.0, -1.0), Vec3::Y)
            .with_lens(40.0, 2.0, 3.4),
    )
    .unwrap()
}

fn ppm_bytes(image: &lumen_renderer::PixelBuffer) -> Vec<u8> {
    let mut out = Vec::new();
    image.write_ppm(&mut out).unwrap();
    out
}

#[test]
fn fixed_seed_renders_are_identical() {
    let world = demo_world();
    let camera = demo_camera(4, 6);
    let sky = Sky::default();

    let first = Scheduler::new(3, 42).render(&camera, &world, &sky).unwrap();
    let second = Scheduler::new(3, 42).render(&camera, &world, &sky).unwrap();
    assert_eq!(first.image, second.image);
    assert_eq!(ppm_bytes(&first.image), ppm_bytes(&second.image));

    let other_seed = Scheduler::new(3, 43).render(&camera, &world, &sky).unwrap();
    assert_ne!(first.image, other_seed.image);
}

#[test]
fn zero_depth_gathers_no_light() {
    let world = demo_world();
    let camera = demo_camera(2, 0);

    let output = Scheduler::new(2, 1).render(&camera, &world, &Sky::default()).unwrap();
    assert!(output.image.pixels().iter().all(|&c| c == Color::ZERO));
}

#[test]
fn single_bounce_empty_scene_is_sky_of_primary_ray() {
    let world = HittableList::new();
    let sky = Sky::default();
    let camera = Camera::new(CameraConfig::default().with_resolution(16, 2.0).with_quality(1, 1))
        .unwrap();
    let mut rng = midpoint_rng();

    for row in 0..camera.image_height() {
        let mut pixels = vec![Color::ZERO; camera.image_width() as usize];
        render_row(&camera, &world, &sky, row, &mut pixels, &mut rng);

        for (col, &color) in pixels.iter().enumerate() {
            let center = camera.pixel_center(col as u32, row);
            let primary = Ray::new(camera.center(), center - camera.center());
            assert_eq!(color, sky.color(&primary), "pixel ({col}, {row})");
        }
    }
}

#[test]
fn partitions_match_documented_splits() {
    assert_eq!(partition_rows(100, 1).unwrap(), vec![0..100]);
    assert_eq!(partition_rows(100, 3).unwrap(), vec![0..33, 33..66, 66..100]);
    assert_eq!(partition_rows(1, 1).unwrap(), vec![0..1]);
}

#[test]
fn vertical_rays_see_pure_gradient_ends() {
    let sky = Sky::default();
    let world = HittableList::new();
    let mut rng = midpoint_rng();

    let up = Ray::new(Vec3::ZERO, Vec3::Y);
    let down = Ray::new(Vec3::ZERO, Vec3::NEG_Y);
    assert_eq!(ray_color(&up, &world, 5, &sky, &mut rng), Color::new(0.5, 0.7, 1.0));
    assert_eq!(ray_color(&down, &world, 5, &sky, &mut rng), Color::new(1.0, 1.0, 1.0));
}

#[test]
fn one_sample_equals_one_pixel_center_evaluation() {
    let mut world = HittableList::new();
    // Deterministic materials only, so both evaluations see the same path
    world.add(Sphere::new(
        Vec3::new(0.0, 0.0, -3.0),
        1.0,
        Metal::new(Color::new(0.9, 0.5, 0.3), 0.0),
    ));
    world.add(Sphere::new(
        Vec3::new(0.0, 0.0, 3.0),
        1.0,
        Metal::new(Color::new(0.2, 0.9, 0.9), 0.0),
    ));
    let sky = Sky::default();
    let camera = Camera::new(CameraConfig::default().with_resolution(9, 1.0).with_quality(1, 10))
        .unwrap();

    for (col, row) in [(4, 4), (0, 0), (8, 3)] {
        let pixel = render_pixel(&camera, &world, &sky, col, row, &mut midpoint_rng());

        let center = camera.pixel_center(col, row);
        let ray = Ray::new(camera.center(), center - camera.center());
        let direct = ray_color(&ray, &world, camera.max_depth(), &sky, &mut midpoint_rng());

        assert_eq!(pixel, direct, "pixel ({col}, {row})");
    }
}

/// Scatters straight through with a fixed attenuation.
struct Filter(Color);

impl Material for Filter {
    fn scatter(
        &self,
        ray_in: &Ray,
        rec: &HitRecord,
        _rng: &mut dyn RngCore,
    ) -> Option<ScatterResult> {
        Some(ScatterResult {
            attenuation: self.0,
            scattered: Ray::new(rec.p, ray_in.direction()),
        })
    }
}

/// Horizontal planes at y = 1, 2, ... each with its own filter. A ray
/// starting at height k travelling upward hits plane k + 1.
struct Floors(Vec<Filter>);

impl Hittable for Floors {
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'_>> {
        let dir = ray.direction();
        if dir.y <= 0.0 {
            return None;
        }
        let level = ray.origin().y.round();
        if level < 0.0 || level as usize >= self.0.len() {
            return None;
        }
        let t = (level + 1.0 - ray.origin().y) / dir.y;
        if !ray_t.surrounds(t) {
            return None;
        }
        Some(HitRecord::new(ray, t, Vec3::NEG_Y, &self.0[level as usize]))
    }
}

#[test]
fn attenuation_multiplies_along_path() {
    let world = Floors(vec![Filter(Color::splat(0.5)), Filter(Color::splat(0.4))]);
    let sky = Sky::default();
    let mut rng = midpoint_rng();
    let up = Ray::new(Vec3::ZERO, Vec3::Y);

    let color = ray_color(&up, &world, 3, &sky, &mut rng);
    let expected = sky.top * 0.2;
    assert!((color - expected).length() < 1e-6, "{color:?} != {expected:?}");

    // Two bounces use up a budget of two before reaching the sky
    assert_eq!(ray_color(&up, &world, 2, &sky, &mut rng), Color::ZERO);
}

#[test]
fn image_height_follows_aspect_ratio() {
    let camera = Camera::new(CameraConfig::default().with_resolution(100, 2.0)).unwrap();
    assert_eq!(camera.image_height(), 50);

    let camera = Camera::new(CameraConfig::default().with_resolution(1, 100.0)).unwrap();
    assert_eq!(camera.image_height(), 1);
}

#[test]
fn every_pixel_is_written() {
    let world = HittableList::new();
    let sky = Sky::solid(Color::new(0.3, 0.6, 0.9));
    let camera = Camera::new(CameraConfig::default().with_resolution(13, 1.3).with_quality(2, 1))
        .unwrap();

    let output = Scheduler::new(3, 5).render(&camera, &world, &sky).unwrap();
    assert_eq!(output.report.bands, vec![0..3, 3..6, 6..10]);
    for &c in output.image.pixels() {
        assert!((c - sky.top).length() < 1e-5, "unwritten or wrong pixel {c:?}");
    }
}

#[test]
fn too_many_workers_is_rejected() {
    let camera = Camera::new(CameraConfig::default().with_resolution(4, 2.0)).unwrap();
    let err = Scheduler::new(3, 0)
        .render(&camera, &HittableList::new(), &Sky::default())
        .unwrap_err();
    assert!(matches!(err, RenderError::InvalidWorkerCount { workers: 3, height: 2 }));
}

/// Panics on any downward ray, so only the lower half of the frame fails.
struct BrokenBelowHorizon;

impl Hittable for BrokenBelowHorizon {
    fn hit(&self, ray: &Ray, _ray_t: Interval) -> Option<HitRecord<'_>> {
        if ray.direction().y < 0.0 {
            panic!("geometry exploded");
        }
        None
    }
}

fn horizon_camera() -> Camera {
    Camera::new(CameraConfig::default().with_resolution(4, 1.0).with_quality(2, 2)).unwrap()
}

#[test]
fn panicking_worker_aborts_render() {
    let err = Scheduler::new(2, 9)
        .render(&horizon_camera(), &BrokenBelowHorizon, &Sky::default())
        .unwrap_err();

    match err {
        RenderError::WorkerFailed { rows, reason } => {
            assert_eq!(rows, 2..4);
            assert!(reason.contains("geometry exploded"), "{reason}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn panicking_worker_falls_back() {
    let fallback = Color::new(1.0, 0.0, 1.0);
    let output = Scheduler::new(2, 9)
        .with_failure_policy(FailurePolicy::Fallback, fallback)
        .render(&horizon_camera(), &BrokenBelowHorizon, &Sky::default())
        .unwrap();

    assert!(!output.report.is_complete());
    assert_eq!(output.report.failures.len(), 1);
    let failure = &output.report.failures[0];
    assert_eq!(failure.rows, 2..4);
    assert_eq!(failure.first_unfinished_row, 2);
    assert!(matches!(failure.reason, WorkerFailure::Panicked(_)));

    for row in 0..2 {
        assert!(output.image.row(row).iter().all(|&c| c != fallback));
    }
    for row in 2..4 {
        assert!(output.image.row(row).iter().all(|&c| c == fallback));
    }
}

#[test]
fn expired_deadline_fills_every_band() {
    let fallback = Color::new(0.0, 1.0, 0.0);
    let camera = demo_camera(1, 1);
    let output = Scheduler::new(4, 1)
        .with_timeout(Some(Duration::ZERO))
        .with_failure_policy(FailurePolicy::Fallback, fallback)
        .render(&camera, &demo_world(), &Sky::default())
        .unwrap();

    assert_eq!(output.report.failures.len(), 4);
    for failure in &output.report.failures {
        assert_eq!(failure.reason, WorkerFailure::TimedOut);
        assert_eq!(failure.unfinished_rows(), failure.rows);
    }
    assert!(output.image.pixels().iter().all(|&c| c == fallback));
}

#[test]
fn expired_deadline_aborts_by_default() {
    let err = Scheduler::new(1, 1)
        .with_timeout(Some(Duration::ZERO))
        .render(&demo_camera(1, 1), &demo_world(), &Sky::default())
        .unwrap_err();
    assert!(matches!(err, RenderError::WorkerFailed { .. }));
}
