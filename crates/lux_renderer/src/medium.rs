//! Participating media.
//!
//! A medium fills the interior of a closed boundary instance. The volume path
//! tracer samples free-flight distances against it, attenuates shadow rays
//! through it and scatters according to its phase function.

use crate::Sampler;
use lux_math::{sqr, Frame, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_1_PI, PI};

/// Interface for homogeneous-style media with scalar coefficients.
pub trait Medium: Send + Sync {
    /// Extinction coefficient.
    fn sigma_t(&self) -> f32;

    /// Scattering coefficient.
    fn sigma_s(&self) -> f32;

    /// Probability of scattering (rather than absorption) at a collision.
    fn scattering_albedo(&self) -> f32 {
        let sigma_t = self.sigma_t();
        if sigma_t > 0.0 {
            self.sigma_s() / sigma_t
        } else {
            0.0
        }
    }

    /// Samples a free-flight distance. Infinite for a non-attenuating medium.
    fn sample_distance(&self, rng: &mut Sampler) -> f32;

    /// Fraction of light surviving a straight segment of length `distance`.
    fn eval_transmittance(&self, distance: f32) -> f32;

    /// Phase function for light arriving along `-wo` and leaving along `wi`
    /// (`wo` points back towards the previous vertex).
    fn phase(&self, wo: Vec3, wi: Vec3) -> f32;

    /// Importance-samples the phase function. Returns the direction and its
    /// density, which equals the phase value.
    fn sample_direction(&self, wo: Vec3, rng: &mut Sampler) -> (Vec3, f32);
}

/// Henyey-Greenstein phase function at the angle between the propagation
/// directions.
pub fn henyey_greenstein(cos_theta: f32, g: f32) -> f32 {
    let denom = 1.0 + sqr(g) - 2.0 * g * cos_theta;
    0.25 * FRAC_1_PI * (1.0 - sqr(g)) / (denom * denom.max(0.0).sqrt())
}

/// Constant-density medium.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HomogeneousMedium {
    pub sigma_a: f32,
    pub sigma_s: f32,
    pub density: f32,
    /// Henyey-Greenstein asymmetry in `(-1, 1)`.
    pub g: f32,
}

impl Default for HomogeneousMedium {
    fn default() -> Self {
        Self {
            sigma_a: 0.5,
            sigma_s: 0.5,
            density: 1.0,
            g: 0.0,
        }
    }
}

impl HomogeneousMedium {
    pub fn new(sigma_a: f32, sigma_s: f32) -> Self {
        Self {
            sigma_a,
            sigma_s,
            ..Default::default()
        }
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn with_asymmetry(mut self, g: f32) -> Self {
        if !(-1.0..=1.0).contains(&g) {
            log::warn!("Henyey-Greenstein asymmetry {} out of range, clamping", g);
        }
        self.g = g.clamp(-0.999, 0.999);
        self
    }
}

impl Medium for HomogeneousMedium {
    fn sigma_t(&self) -> f32 {
        (self.sigma_a + self.sigma_s) * self.density
    }

    fn sigma_s(&self) -> f32 {
        self.sigma_s * self.density
    }

    fn sample_distance(&self, rng: &mut Sampler) -> f32 {
        let sigma_t = self.sigma_t();
        if !(sigma_t > 0.0) {
            return f32::INFINITY;
        }
        -(1.0 - rng.next_1d()).ln() / sigma_t
    }

    fn eval_transmittance(&self, distance: f32) -> f32 {
        let sigma_t = self.sigma_t();
        if sigma_t == 0.0 {
            return 1.0;
        }
        (-sigma_t * distance).exp()
    }

    fn phase(&self, wo: Vec3, wi: Vec3) -> f32 {
        henyey_greenstein(-wo.dot(wi), self.g)
    }

    fn sample_direction(&self, wo: Vec3, rng: &mut Sampler) -> (Vec3, f32) {
        let u = rng.next_2d();
        let g = self.g;
        let cos_theta = if g.abs() < 1e-3 {
            1.0 - 2.0 * u.x
        } else {
            let s = (1.0 - sqr(g)) / (1.0 - g + 2.0 * g * u.x);
            ((1.0 + sqr(g) - sqr(s)) / (2.0 * g)).clamp(-1.0, 1.0)
        };
        let sin_theta = (1.0 - sqr(cos_theta)).max(0.0).sqrt();
        let phi = 2.0 * PI * u.y;

        // Around the propagation direction
        let axis = Frame::from_normal(-wo);
        let wi = axis
            .to_world(Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta))
            .normalize();
        (wi, henyey_greenstein(cos_theta, g))
    }
}
