//! Warps from the unit square to sampling domains, with their densities.

use crate::{safe_sqrt, Vec2, Vec3, EPSILON};
use std::f32::consts::{FRAC_1_PI, FRAC_PI_2, FRAC_PI_4, PI};

/// Shirley-Chiu concentric mapping onto the unit disk.
pub fn square_to_uniform_disk_concentric(sample: Vec2) -> Vec2 {
    let offset = sample * 2.0 - Vec2::ONE;
    if offset.x == 0.0 && offset.y == 0.0 {
        return Vec2::ZERO;
    }

    let (r, theta) = if offset.x.abs() > offset.y.abs() {
        (offset.x, FRAC_PI_4 * (offset.y / offset.x))
    } else {
        (offset.y, FRAC_PI_2 - FRAC_PI_4 * (offset.x / offset.y))
    };
    Vec2::new(theta.cos(), theta.sin()) * r
}

/// Cosine-weighted direction on the `+z` hemisphere (Malley's method).
pub fn square_to_cosine_hemisphere(sample: Vec2) -> Vec3 {
    let d = square_to_uniform_disk_concentric(sample);
    let z = safe_sqrt(1.0 - d.length_squared());
    Vec3::new(d.x, d.y, z)
}

pub fn cosine_hemisphere_pdf(w: Vec3) -> f32 {
    w.z.max(0.0) * FRAC_1_PI
}

pub fn square_to_uniform_sphere(sample: Vec2) -> Vec3 {
    let z = 1.0 - 2.0 * sample.y;
    let r = safe_sqrt(1.0 - z * z);
    let phi = 2.0 * PI * sample.x;
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn uniform_sphere_pdf() -> f32 {
    0.25 * FRAC_1_PI
}

/// Uniform direction inside the cone around `+z` with half-angle `acos(cos_max)`.
pub fn square_to_uniform_sphere_cone(sample: Vec2, cos_max: f32) -> Vec3 {
    let z = 1.0 - sample.y * (1.0 - cos_max);
    let r = safe_sqrt(1.0 - z * z);
    let phi = 2.0 * PI * sample.x;
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn uniform_sphere_cone_pdf(cos_max: f32) -> f32 {
    1.0 / (2.0 * PI * (1.0 - cos_max))
}

/// Uniform barycentric coordinates `(b1, b2)`; the first vertex weight is `1 - b1 - b2`.
pub fn square_to_uniform_triangle(sample: Vec2) -> Vec2 {
    let su = safe_sqrt(sample.x);
    Vec2::new(1.0 - su, sample.y * su)
}

/// Converts an area density at a point seen at `distance` with surface cosine `cos`
/// into a solid-angle density. Grazing configurations report an infinite density.
pub fn pdf_to_solid_angle(pdf_area: f32, distance: f32, cos: f32) -> f32 {
    let cos = cos.abs();
    if cos <= EPSILON {
        return f32::INFINITY;
    }
    (pdf_area * distance * distance / cos).max(EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn next_2d(rng: &mut StdRng) -> Vec2 {
        Vec2::new(rng.gen(), rng.gen())
    }

    #[test]
    fn test_disk_stays_inside() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let d = square_to_uniform_disk_concentric(next_2d(&mut rng));
            assert!(d.length() <= 1.0 + 1e-5);
        }
    }

    #[test]
    fn test_cosine_hemisphere_mean_cos() {
        // E[cos] under cos/pi is 2/3
        let mut rng = StdRng::seed_from_u64(3);
        let n = 20000;
        let mut sum = 0.0;
        for _ in 0..n {
            let w = square_to_cosine_hemisphere(next_2d(&mut rng));
            assert!(w.z >= 0.0);
            assert!((w.length() - 1.0).abs() < 1e-4);
            sum += w.z;
        }
        assert!((sum / n as f32 - 2.0 / 3.0).abs() < 0.01);
    }

    #[test]
    fn test_cone_respects_angle() {
        let mut rng = StdRng::seed_from_u64(11);
        let cos_max = 0.9;
        for _ in 0..1000 {
            let w = square_to_uniform_sphere_cone(next_2d(&mut rng), cos_max);
            assert!(w.z >= cos_max - 1e-5);
        }
        // Full sphere cone matches the uniform sphere density
        assert!((uniform_sphere_cone_pdf(-1.0) - uniform_sphere_pdf()).abs() < 1e-6);
    }

    #[test]
    fn test_triangle_barycentrics_valid() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..1000 {
            let b = square_to_uniform_triangle(next_2d(&mut rng));
            assert!(b.x >= 0.0 && b.y >= 0.0 && b.x + b.y <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn test_pdf_to_solid_angle() {
        assert_eq!(pdf_to_solid_angle(1.0, 2.0, 0.0), f32::INFINITY);
        assert!((pdf_to_solid_angle(0.5, 2.0, -0.5) - 4.0).abs() < 1e-5);
    }
}
