//! Radiance estimators and the helpers they share.

use crate::{Intersection, Sampler, Scene};
use lux_math::{Color, ColorExt, Ray, Vec3, EPSILON};
use serde::{Deserialize, Serialize};

/// Estimates the radiance arriving along a camera ray.
pub trait Integrator: Send + Sync {
    /// Result is finite and non-negative for well-formed scenes.
    fn li(&self, ray: &Ray, scene: &Scene, rng: &mut Sampler) -> Color;
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Balance heuristic weight of a strategy with density `pdf_a` against one
/// with density `pdf_b`. Delta events (`pdf_a` infinite) take the full weight.
pub fn balance_heuristic(pdf_a: f32, pdf_b: f32) -> f32 {
    if pdf_a == f32::INFINITY {
        return 1.0;
    }
    let sum = pdf_a + pdf_b;
    if !(sum > 0.0) || !sum.is_finite() {
        return 0.0;
    }
    pdf_a / sum
}

/// Replaces non-finite or negative estimates with black.
pub fn sanitize(color: Color) -> Color {
    if color.is_finite() && color.min_element() >= 0.0 {
        color
    } else {
        log::warn!("Discarding invalid radiance estimate {:?}", color);
        Color::ZERO
    }
}

/// Shadow ray towards a light sample. Finite distances are shortened so the
/// light's own surface does not count as an occluder.
pub(crate) fn shadow_ray(its: &Intersection<'_>, wi: Vec3, distance: f32) -> (Ray, f32) {
    let max_distance = if distance.is_finite() {
        distance * (1.0 - EPSILON)
    } else {
        f32::INFINITY
    };
    (its.spawn_ray(wi), max_distance)
}

/// Next-event estimate at a surface hit, already divided by the light
/// selection probability. `mis` weights it against BSDF sampling.
pub(crate) fn estimate_direct(its: &Intersection<'_>, scene: &Scene, rng: &mut Sampler, mis: bool) -> Color {
    let Some(selection) = scene.sample_light(rng) else {
        return Color::ZERO;
    };
    let sample = selection.light.sample_direct(its.position(), rng);
    if sample.is_invalid() {
        return Color::ZERO;
    }

    let bsdf = its.evaluate_bsdf(sample.wi);
    if bsdf.is_invalid() {
        return Color::ZERO;
    }

    let (ray, max_distance) = shadow_ray(its, sample.wi, sample.distance);
    if scene.is_occluded(&ray, max_distance) {
        return Color::ZERO;
    }

    let weight = if mis && selection.light.can_be_intersected() {
        balance_heuristic(selection.probability * sample.pdf, bsdf.pdf)
    } else {
        1.0
    };
    sample.weight * bsdf.value * (weight / selection.probability)
}

/// MIS weight for emission found by BSDF sampling, given the density of the
/// bounce that reached it and the density light sampling would have had.
pub(crate) fn emission_weight(bsdf_pdf: f32, light_pdf: f32, mis: bool) -> f32 {
    if bsdf_pdf == f32::INFINITY {
        1.0
    } else if mis {
        balance_heuristic(bsdf_pdf, light_pdf)
    } else {
        0.0
    }
}

/// Emission seen at `its` after a bounce at `vertex` with density `bsdf_pdf`,
/// MIS-weighted when the emitter is also sampled as a light. `bsdf_pdf` is
/// infinite for camera rays and delta bounces.
pub(crate) fn weighted_emission(
    its: &Intersection<'_>,
    scene: &Scene,
    vertex: Vec3,
    bsdf_pdf: f32,
    mis: bool,
) -> Color {
    let emission = its.evaluate_emission();
    if emission.is_black() {
        return emission;
    }
    match its.instance {
        Some(instance) if instance.is_light() => {
            let light_pdf = scene.light_selection_probability() * its.light_pdf_from(vertex);
            emission * emission_weight(bsdf_pdf, light_pdf, mis)
        }
        _ => emission,
    }
}

/// Background radiance for an escaped ray, weighted like [`weighted_emission`].
pub(crate) fn weighted_background(scene: &Scene, direction: Vec3, bsdf_pdf: f32, mis: bool) -> Color {
    let background = scene.evaluate_background(direction);
    if background.value.is_black() {
        return Color::ZERO;
    }
    let light_pdf = scene.light_selection_probability() * background.pdf;
    background.value * emission_weight(bsdf_pdf, light_pdf, mis)
}

// ============================================================================
// Direct lighting
// ============================================================================

/// Emission plus single-bounce illumination, combining light and BSDF
/// sampling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectIntegrator {
    pub mis: bool,
}

impl Default for DirectIntegrator {
    fn default() -> Self {
        Self { mis: true }
    }
}

impl DirectIntegrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mis(mut self, mis: bool) -> Self {
        self.mis = mis;
        self
    }
}

impl Integrator for DirectIntegrator {
    fn li(&self, ray: &Ray, scene: &Scene, rng: &mut Sampler) -> Color {
        let its = scene.intersect(ray);
        if !its.is_hit() {
            return sanitize(weighted_background(scene, ray.direction, f32::INFINITY, self.mis));
        }

        let mut radiance = weighted_emission(&its, scene, ray.origin, f32::INFINITY, self.mis);
        radiance += estimate_direct(&its, scene, rng, self.mis);

        if let Some(sample) = its.sample_bsdf(rng) {
            let next_ray = its.spawn_ray(sample.wi);
            let next = scene.intersect(&next_ray);
            let incident = if next.is_hit() {
                weighted_emission(&next, scene, next_ray.origin, sample.pdf, self.mis)
            } else {
                weighted_background(scene, next_ray.direction, sample.pdf, self.mis)
            };
            radiance += sample.weight * incident;
        }

        sanitize(radiance)
    }
}

// ============================================================================
// Debug integrators
// ============================================================================

/// First-hit BSDF albedo.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlbedoIntegrator;

impl Integrator for AlbedoIntegrator {
    fn li(&self, ray: &Ray, scene: &Scene, _rng: &mut Sampler) -> Color {
        let its = scene.intersect(ray);
        match its.instance.and_then(|instance| instance.bsdf()) {
            Some(bsdf) => bsdf.albedo(its.surf.uv),
            None => Color::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalsConfig {
    /// Map normals from `[-1, 1]` to `[0, 1]`.
    pub remap: bool,
}

impl Default for NormalsConfig {
    fn default() -> Self {
        Self { remap: true }
    }
}

/// First-hit geometry normal.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalsIntegrator {
    pub config: NormalsConfig,
}

impl NormalsIntegrator {
    pub fn new(config: NormalsConfig) -> Self {
        Self { config }
    }
}

impl Integrator for NormalsIntegrator {
    fn li(&self, ray: &Ray, scene: &Scene, _rng: &mut Sampler) -> Color {
        let its = scene.intersect(ray);
        let normal = if its.is_hit() {
            its.surf.geometry_normal
        } else {
            Vec3::ZERO
        };
        if self.config.remap {
            (normal + Vec3::ONE) * 0.5
        } else {
            normal
        }
    }
}
