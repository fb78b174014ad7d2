//! Bucket-based tile rendering.
//!
//! Divides the image into tiles (buckets) that can be rendered
//! independently and in parallel using rayon.

use crate::renderer::render_pixel;
use crate::{Camera, ImageBuffer, Integrator, RenderConfig, Scene};
use lux_math::Color;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

/// A rectangular region of the image to render.
#[derive(Debug, Clone, Copy)]
pub struct Bucket {
    /// X coordinate of bucket's top-left corner
    pub x: u32,
    /// Y coordinate of bucket's top-left corner
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Index of this bucket in the render order
    pub index: usize,
}

impl Bucket {
    pub fn new(x: u32, y: u32, width: u32, height: u32, index: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            index,
        }
    }

    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }
}

/// Default bucket size in pixels.
pub const DEFAULT_BUCKET_SIZE: u32 = 32;

/// Generate buckets for an image, sorted in spiral order from center.
pub fn generate_buckets(width: u32, height: u32, bucket_size: u32) -> Vec<Bucket> {
    let bucket_size = bucket_size.max(1);
    let mut buckets = Vec::new();
    let mut index = 0;

    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            let bw = bucket_size.min(width - x);
            let bh = bucket_size.min(height - y);
            buckets.push(Bucket::new(x, y, bw, bh, index));
            index += 1;
            x += bucket_size;
        }
        y += bucket_size;
    }

    sort_spiral(&mut buckets, width, height);

    for (i, bucket) in buckets.iter_mut().enumerate() {
        bucket.index = i;
    }

    buckets
}

/// Sort buckets by distance from image center (spiral order).
fn sort_spiral(buckets: &mut [Bucket], width: u32, height: u32) {
    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;

    let distance = |b: &Bucket| {
        let x = b.x as f32 + b.width as f32 / 2.0;
        let y = b.y as f32 + b.height as f32 / 2.0;
        (x - center_x).powi(2) + (y - center_y).powi(2)
    };
    buckets.sort_by(|a, b| distance(a).total_cmp(&distance(b)));
}

/// Render a single bucket to a vector of colors.
///
/// Returns pixels in row-major order within the bucket.
pub fn render_bucket(
    bucket: &Bucket,
    camera: &Camera,
    scene: &Scene,
    integrator: &dyn Integrator,
    config: &RenderConfig,
) -> Vec<Color> {
    let mut pixels = Vec::with_capacity(bucket.pixel_count() as usize);

    for local_y in 0..bucket.height {
        for local_x in 0..bucket.width {
            let global_x = bucket.x + local_x;
            let global_y = bucket.y + local_y;
            pixels.push(render_pixel(camera, scene, integrator, global_x, global_y, config));
        }
    }

    pixels
}

/// Result of rendering a bucket.
#[derive(Debug, Clone)]
pub struct BucketResult {
    pub bucket: Bucket,
    /// Pixel colors in row-major order
    pub pixels: Vec<Color>,
}

impl BucketResult {
    pub fn new(bucket: Bucket, pixels: Vec<Color>) -> Self {
        Self { bucket, pixels }
    }

    /// Copy the bucket's pixels into their place in `image`.
    pub fn write_to(&self, image: &mut ImageBuffer) {
        let b = &self.bucket;
        for local_y in 0..b.height {
            for local_x in 0..b.width {
                let color = self.pixels[(local_y * b.width + local_x) as usize];
                image.set(b.x + local_x, b.y + local_y, color);
            }
        }
    }
}

/// Render the whole image in parallel.
///
/// Buckets not yet started when `cancel` is raised are skipped and stay
/// black; buckets already in flight finish.
pub fn render(
    camera: &Camera,
    scene: &Scene,
    integrator: &dyn Integrator,
    config: &RenderConfig,
    cancel: &AtomicBool,
) -> ImageBuffer {
    let width = camera.image_width;
    let height = camera.image_height;
    let buckets = generate_buckets(width, height, config.bucket_size);
    let total = buckets.len();
    let completed = AtomicUsize::new(0);
    let start = Instant::now();

    log::info!(
        "Rendering {}x{} at {} spp in {} buckets",
        width,
        height,
        config.samples_per_pixel,
        total
    );

    let results: Vec<BucketResult> = buckets
        .par_iter()
        .filter_map(|bucket| {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            let pixels = render_bucket(bucket, camera, scene, integrator, config);
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % 16 == 0 || done == total {
                log::debug!("{}/{} buckets done", done, total);
            }
            Some(BucketResult::new(*bucket, pixels))
        })
        .collect();

    let mut image = ImageBuffer::new(width, height);
    for result in &results {
        result.write_to(&mut image);
    }

    if results.len() < total {
        log::warn!("Render cancelled after {}/{} buckets", results.len(), total);
    } else {
        log::info!("Render finished in {:.2}s", start.elapsed().as_secs_f32());
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConstantTexture, Diffuse, EnvironmentMap, Instance, PathTracer, SceneBuilder, Sphere};
    use lux_math::Vec3;
    use std::sync::Arc;

    #[test]
    fn test_generate_buckets_exact_fit() {
        let buckets = generate_buckets(128, 128, 64);
        assert_eq!(buckets.len(), 4); // 2x2 grid

        let total_pixels: u32 = buckets.iter().map(|b| b.pixel_count()).sum();
        assert_eq!(total_pixels, 128 * 128);
    }

    #[test]
    fn test_generate_buckets_partial_fit() {
        let buckets = generate_buckets(100, 100, 64);
        assert_eq!(buckets.len(), 4); // 2x2 grid with partial buckets

        let total_pixels: u32 = buckets.iter().map(|b| b.pixel_count()).sum();
        assert_eq!(total_pixels, 100 * 100);
    }

    #[test]
    fn test_spiral_order() {
        let buckets = generate_buckets(192, 192, 64);
        assert_eq!(buckets.len(), 9); // 3x3 grid

        // First bucket should be the center one
        let first = &buckets[0];
        assert_eq!(first.x, 64);
        assert_eq!(first.y, 64);
    }

    fn small_scene() -> Scene {
        let mut builder = SceneBuilder::new();
        builder
            .add_instance(
                Instance::new(Arc::new(Sphere::new()))
                    .with_bsdf(Arc::new(Diffuse::new(Arc::new(ConstantTexture::new(Color::splat(0.5)))))),
            )
            .set_environment(Arc::new(EnvironmentMap::new(Arc::new(ConstantTexture::new(Color::ONE)))));
        builder.build().unwrap()
    }

    fn small_camera() -> Camera {
        let mut camera = Camera::new()
            .with_resolution(20, 12)
            .with_position(Vec3::new(0.0, 0.0, 4.0), Vec3::ZERO, Vec3::Y);
        camera.initialize();
        camera
    }

    #[test]
    fn test_parallel_render_matches_serial_pixels() {
        let scene = small_scene();
        let camera = small_camera();
        let integrator = PathTracer::default();
        let config = RenderConfig {
            samples_per_pixel: 2,
            seed: 7,
            bucket_size: 8,
        };

        let image = render(&camera, &scene, &integrator, &config, &AtomicBool::new(false));
        for (x, y) in [(0, 0), (10, 6), (19, 11), (8, 8)] {
            let expected = render_pixel(&camera, &scene, &integrator, x, y, &config);
            assert_eq!(image.get(x, y), expected);
        }
        // Corners see the sky, the center sees the sphere
        assert_eq!(image.get(0, 0), Color::ONE);
        assert!(image.get(10, 6).x < 1.0);
    }

    #[test]
    fn test_cancelled_render_is_black() {
        let scene = small_scene();
        let camera = small_camera();
        let image = render(
            &camera,
            &scene,
            &PathTracer::default(),
            &RenderConfig::default(),
            &AtomicBool::new(true),
        );
        assert!(image.pixels.iter().all(|c| *c == Color::ZERO));
    }
}
