//! Unidirectional path tracer with next-event estimation.

use crate::integrator::{estimate_direct, sanitize, weighted_background, weighted_emission};
use crate::{Integrator, Sampler, Scene};
use lux_math::{Color, ColorExt, Ray};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PathTracerConfig {
    /// Number of scattering events; 1 gives direct lighting only.
    pub max_depth: u32,
    /// Combine light and BSDF sampling with the balance heuristic. When off,
    /// emitters that are sampled as lights are only counted through NEE.
    pub mis: bool,
    /// Depth after which Russian roulette may terminate paths.
    pub rr_depth: u32,
}

impl Default for PathTracerConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            mis: true,
            rr_depth: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PathTracer {
    pub config: PathTracerConfig,
}

impl PathTracer {
    pub fn new(config: PathTracerConfig) -> Self {
        Self { config }
    }
}

/// Russian roulette on the path throughput. Returns false when the path
/// dies; survivors are reweighted by the survival probability.
pub(crate) fn russian_roulette(throughput: &mut Color, rng: &mut Sampler) -> bool {
    let survival = throughput.mean().clamp(0.0, 1.0);
    if rng.next_1d() >= survival {
        return false;
    }
    *throughput /= survival;
    true
}

impl Integrator for PathTracer {
    fn li(&self, ray: &Ray, scene: &Scene, rng: &mut Sampler) -> Color {
        let config = &self.config;
        let mut ray = *ray;
        let mut radiance = Color::ZERO;
        let mut throughput = Color::ONE;
        // Density of the bounce that produced `ray`; infinite for the camera
        // ray and after delta scattering
        let mut bsdf_pdf = f32::INFINITY;
        let mut depth = 0;

        loop {
            let its = scene.intersect(&ray);
            if !its.is_hit() {
                radiance += throughput * weighted_background(scene, ray.direction, bsdf_pdf, config.mis);
                break;
            }

            radiance += throughput * weighted_emission(&its, scene, ray.origin, bsdf_pdf, config.mis);

            if depth >= config.max_depth {
                break;
            }

            radiance += throughput * estimate_direct(&its, scene, rng, config.mis);

            let Some(sample) = its.sample_bsdf(rng) else {
                break;
            };
            if sample.weight.is_black() {
                break;
            }
            throughput *= sample.weight;
            bsdf_pdf = sample.pdf;
            ray = its.spawn_ray(sample.wi);
            depth += 1;

            if depth > config.rr_depth && !russian_roulette(&mut throughput, rng) {
                break;
            }
        }

        sanitize(radiance)
    }
}
