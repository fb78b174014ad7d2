//! BSDF interface and the smooth surface models.
//!
//! All directions are expressed in the local shading frame, where the normal
//! is `+z`. Returned values already include the `|cos θi|` foreshortening
//! term, and sample weights are pre-divided by their density.

use crate::{Sampler, Texture};
use lux_math::{warp, Color, Frame, Vec2, Vec3};
use std::f32::consts::FRAC_1_PI;
use std::sync::Arc;

/// BSDF value for a pair of directions together with the density with which
/// `sample` would have produced `wi`.
#[derive(Debug, Clone, Copy)]
pub struct BsdfEval {
    pub value: Color,
    pub pdf: f32,
}

impl BsdfEval {
    pub fn invalid() -> Self {
        Self {
            value: Color::ZERO,
            pdf: 0.0,
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.value == Color::ZERO
    }
}

/// A sampled continuation direction.
#[derive(Debug, Clone, Copy)]
pub struct BsdfSample {
    pub wi: Vec3,
    /// `value / pdf`
    pub weight: Color,
    /// Solid-angle density, `f32::INFINITY` for specular events.
    pub pdf: f32,
}

impl BsdfSample {
    pub fn is_delta(&self) -> bool {
        self.pdf == f32::INFINITY
    }
}

/// Trait for surface scattering models.
pub trait Bsdf: Send + Sync {
    fn evaluate(&self, uv: Vec2, wo: Vec3, wi: Vec3) -> BsdfEval;

    /// Importance-samples `wi`. Returns `None` when the path should be
    /// absorbed.
    fn sample(&self, uv: Vec2, wo: Vec3, rng: &mut Sampler) -> Option<BsdfSample>;

    /// Hemispherical reflectance estimate used for albedo output.
    fn albedo(&self, uv: Vec2) -> Color;
}

// =============================================================================
// Helper functions
// =============================================================================

/// Mirrors `w` about `n` (both pointing away from the surface).
#[inline]
pub fn reflect(w: Vec3, n: Vec3) -> Vec3 {
    2.0 * w.dot(n) * n - w
}

/// Refracts `wo` through the interface with normal `n` and relative index
/// `eta` (inside over outside). Both `wo` and the result point away from the
/// surface. Returns the refracted direction and the index ratio actually
/// crossed, or `None` on total internal reflection.
pub fn refract(wo: Vec3, n: Vec3, eta: f32) -> Option<(Vec3, f32)> {
    let mut cos_i = wo.dot(n);
    let (mut eta, mut n) = (eta, n);
    if cos_i < 0.0 {
        eta = 1.0 / eta;
        cos_i = -cos_i;
        n = -n;
    }

    let sin2_i = (1.0 - cos_i * cos_i).max(0.0);
    let sin2_t = sin2_i / (eta * eta);
    if sin2_t >= 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    let wi = -wo / eta + (cos_i / eta - cos_t) * n;
    Some((wi, eta))
}

/// Unpolarized Fresnel reflectance of a dielectric interface.
///
/// `cos_i` is measured against the normal on the outside; a negative value
/// means the light arrives from the inside. Total internal reflection yields 1.
pub fn fresnel_dielectric(cos_i: f32, eta: f32) -> f32 {
    let mut cos_i = cos_i.clamp(-1.0, 1.0);
    let mut eta = eta;
    if cos_i < 0.0 {
        eta = 1.0 / eta;
        cos_i = -cos_i;
    }

    let sin2_t = (1.0 - cos_i * cos_i) / (eta * eta);
    if sin2_t >= 1.0 {
        return 1.0;
    }
    let cos_t = (1.0 - sin2_t).max(0.0).sqrt();

    let r_parallel = (eta * cos_i - cos_t) / (eta * cos_i + cos_t);
    let r_perpendicular = (cos_i - eta * cos_t) / (cos_i + eta * cos_t);
    0.5 * (r_parallel * r_parallel + r_perpendicular * r_perpendicular)
}

/// Schlick's approximation of Fresnel reflectance.
#[inline]
pub fn schlick(f0: f32, cos: f32) -> f32 {
    f0 + (1.0 - f0) * (1.0 - cos.abs().min(1.0)).powi(5)
}

// =============================================================================
// Diffuse
// =============================================================================

/// Lambertian reflector.
#[derive(Clone)]
pub struct Diffuse {
    albedo: Arc<dyn Texture>,
}

impl Diffuse {
    pub fn new(albedo: Arc<dyn Texture>) -> Self {
        Self { albedo }
    }
}

impl Bsdf for Diffuse {
    fn evaluate(&self, uv: Vec2, wo: Vec3, wi: Vec3) -> BsdfEval {
        if !Frame::same_hemisphere(wo, wi) {
            return BsdfEval::invalid();
        }
        let cos_i = Frame::abs_cos_theta(wi);
        BsdfEval {
            value: self.albedo.evaluate(uv) * FRAC_1_PI * cos_i,
            pdf: cos_i * FRAC_1_PI,
        }
    }

    fn sample(&self, uv: Vec2, wo: Vec3, rng: &mut Sampler) -> Option<BsdfSample> {
        let mut wi = warp::square_to_cosine_hemisphere(rng.next_2d());
        // Scatter back to the side the light came from
        if Frame::cos_theta(wo) < 0.0 {
            wi.z = -wi.z;
        }
        let pdf = Frame::abs_cos_theta(wi) * FRAC_1_PI;
        if !(pdf > 0.0) {
            return None;
        }
        Some(BsdfSample {
            wi,
            weight: self.albedo.evaluate(uv),
            pdf,
        })
    }

    fn albedo(&self, uv: Vec2) -> Color {
        self.albedo.evaluate(uv)
    }
}

// =============================================================================
// Dielectric
// =============================================================================

/// Perfectly smooth glass-like interface.
#[derive(Clone)]
pub struct Dielectric {
    ior: Arc<dyn Texture>,
    reflectance: Arc<dyn Texture>,
    transmittance: Arc<dyn Texture>,
}

impl Dielectric {
    pub fn new(ior: Arc<dyn Texture>, reflectance: Arc<dyn Texture>, transmittance: Arc<dyn Texture>) -> Self {
        Self {
            ior,
            reflectance,
            transmittance,
        }
    }
}

impl Bsdf for Dielectric {
    fn evaluate(&self, _uv: Vec2, _wo: Vec3, _wi: Vec3) -> BsdfEval {
        // Delta distribution: no pair of directions has a finite density
        BsdfEval::invalid()
    }

    fn sample(&self, uv: Vec2, wo: Vec3, rng: &mut Sampler) -> Option<BsdfSample> {
        let ior = self.ior.scalar(uv);
        let f = fresnel_dielectric(Frame::cos_theta(wo), ior);

        if rng.next_1d() < f {
            return Some(BsdfSample {
                wi: reflect(wo, Vec3::Z),
                weight: self.reflectance.evaluate(uv),
                pdf: f32::INFINITY,
            });
        }

        let (wi, eta) = refract(wo, Vec3::Z, ior)?;
        Some(BsdfSample {
            wi,
            weight: self.transmittance.evaluate(uv) / (eta * eta),
            pdf: f32::INFINITY,
        })
    }

    fn albedo(&self, uv: Vec2) -> Color {
        let f = fresnel_dielectric(1.0, self.ior.scalar(uv));
        self.reflectance.evaluate(uv) * f + self.transmittance.evaluate(uv) * (1.0 - f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConstantTexture;
    use lux_math::ColorExt;

    fn constant(v: f32) -> Arc<dyn Texture> {
        Arc::new(ConstantTexture::scalar_value(v))
    }

    #[test]
    fn test_reflect_twice_is_identity() {
        let mut rng = Sampler::new(4);
        for _ in 0..50 {
            let w = warp::square_to_uniform_sphere(rng.next_2d());
            let n = warp::square_to_uniform_sphere(rng.next_2d());
            assert!((reflect(reflect(w, n), n) - w).length() < 1e-5);
        }
    }

    #[test]
    fn test_fresnel_limits() {
        let r0 = ((1.5f32 - 1.0) / 2.5).powi(2);
        assert!((fresnel_dielectric(1.0, 1.5) - r0).abs() < 1e-5);
        assert!((fresnel_dielectric(0.0, 1.5) - 1.0).abs() < 1e-4);
        // Beyond the critical angle from inside
        assert_eq!(fresnel_dielectric(-0.1, 1.5), 1.0);
        assert!((fresnel_dielectric(1.0, 1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_fresnel_reciprocal_across_interface() {
        // Reflectance is the same seen from both sides of the interface,
        // so R + T = 1 holds for either direction
        for i in 1..10 {
            let cos_i = i as f32 / 10.0;
            let wo = Vec3::new((1.0 - cos_i * cos_i).sqrt(), 0.0, cos_i);
            let (wt, _) = refract(wo, Vec3::Z, 1.5).unwrap();
            let outside = fresnel_dielectric(cos_i, 1.5);
            let inside = fresnel_dielectric(wt.z, 1.5);
            assert!((outside - inside).abs() < 1e-4, "{} vs {}", outside, inside);
            assert!((0.0..=1.0).contains(&outside));
        }
    }

    #[test]
    fn test_refract_obeys_snell() {
        let wo = Vec3::new(0.6, 0.0, 0.8);
        let (wi, eta) = refract(wo, Vec3::Z, 1.5).unwrap();
        assert_eq!(eta, 1.5);
        assert!(wi.z < 0.0);
        assert!((wi.length() - 1.0).abs() < 1e-5);
        assert!((wo.x - 1.5 * -wi.x).abs() < 1e-5);
        // Total internal reflection from inside at a grazing angle
        assert!(refract(Vec3::new(0.9, 0.0, -0.2).normalize(), Vec3::Z, 1.5).is_none());
    }

    #[test]
    fn test_diffuse_sample_matches_evaluate() {
        let bsdf = Diffuse::new(constant(0.7));
        let mut rng = Sampler::new(8);
        let uv = Vec2::ZERO;
        for wo in [Vec3::new(0.3, 0.2, 0.9).normalize(), Vec3::new(0.1, -0.4, -0.5).normalize()] {
            for _ in 0..100 {
                let s = bsdf.sample(uv, wo, &mut rng).unwrap();
                assert!(Frame::same_hemisphere(wo, s.wi));
                let eval = bsdf.evaluate(uv, wo, s.wi);
                assert!((eval.pdf - s.pdf).abs() < 1e-4);
                assert!((eval.value / eval.pdf - s.weight).length() < 1e-4);
            }
        }
    }

    #[test]
    fn test_diffuse_albedo_at_most_one() {
        // Monte Carlo estimate of reflected energy with uniform hemisphere sampling
        let bsdf = Diffuse::new(constant(1.0));
        let mut rng = Sampler::new(12);
        let wo = Vec3::new(0.0, 0.6, 0.8);
        let n = 20000;
        let mut sum = Color::ZERO;
        for _ in 0..n {
            let mut wi = warp::square_to_uniform_sphere(rng.next_2d());
            wi.z = wi.z.abs();
            sum += bsdf.evaluate(Vec2::ZERO, wo, wi).value / (0.5 * FRAC_1_PI);
        }
        let albedo = (sum / n as f32).mean();
        assert!(albedo <= 1.02 && albedo > 0.95, "albedo {}", albedo);
    }

    #[test]
    fn test_dielectric_energy_and_branches() {
        let bsdf = Dielectric::new(constant(1.5), constant(1.0), constant(1.0));
        let mut rng = Sampler::new(31);
        let wo = Vec3::new(0.5, 0.0, 0.75).normalize();
        let f = fresnel_dielectric(wo.z, 1.5);

        let n = 20000;
        let mut reflected = 0;
        let mut energy = 0.0;
        for _ in 0..n {
            let s = bsdf.sample(Vec2::ZERO, wo, &mut rng).unwrap();
            assert!(s.is_delta());
            if s.wi.z > 0.0 {
                reflected += 1;
                assert!((s.wi - Vec3::new(-wo.x, -wo.y, wo.z)).length() < 1e-5);
                energy += s.weight.x;
            } else {
                // Undo the radiance compression to count transported power
                energy += s.weight.x * 1.5 * 1.5;
            }
        }
        assert!((reflected as f32 / n as f32 - f).abs() < 0.01);
        assert!((energy / n as f32 - 1.0).abs() < 1e-3);
        assert!(bsdf.evaluate(Vec2::ZERO, wo, -wo).is_invalid());
    }
}
