//! Light sources that can be sampled for next-event estimation.

use crate::{EmissionEval, Instance, Sampler};
use lux_math::{warp, Color, ColorExt, Vec3};
use std::f32::consts::FRAC_1_PI;
use std::sync::Arc;

/// A sampled direction towards a light.
#[derive(Debug, Clone, Copy)]
pub struct DirectLightSample {
    /// Unit direction from the shading point towards the light.
    pub wi: Vec3,
    /// Incident radiance divided by `pdf`.
    pub weight: Color,
    /// Distance to the light for the shadow test, `f32::INFINITY` for
    /// lights at infinity.
    pub distance: f32,
    /// Solid-angle density, `f32::INFINITY` for delta lights.
    pub pdf: f32,
}

impl DirectLightSample {
    pub fn invalid() -> Self {
        Self {
            wi: Vec3::Z,
            weight: Color::ZERO,
            distance: 0.0,
            pdf: 0.0,
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.weight.is_black()
    }

    /// Delta lights cannot be hit by scattered rays, so their samples take
    /// the full MIS weight.
    pub fn is_delta(&self) -> bool {
        self.pdf == f32::INFINITY
    }
}

pub trait Light: Send + Sync {
    /// Samples incident illumination at `origin`, which also serves as the
    /// reference point for shapes that sample their visible region.
    fn sample_direct(&self, origin: Vec3, rng: &mut Sampler) -> DirectLightSample;

    /// Whether scattered rays can reach this light, making MIS applicable.
    fn can_be_intersected(&self) -> bool;
}

/// A light at infinity that is seen by rays escaping the scene.
pub trait BackgroundLight: Light {
    /// Radiance arriving from `direction` and the solid-angle density with
    /// which `sample_direct` would have chosen it.
    fn evaluate(&self, direction: Vec3) -> EmissionEval;
}

/// Isotropic point emitter.
#[derive(Debug, Clone, Copy)]
pub struct PointLight {
    pub position: Vec3,
    pub power: Color,
}

impl PointLight {
    pub fn new(position: Vec3, power: Color) -> Self {
        Self { position, power }
    }
}

impl Light for PointLight {
    fn sample_direct(&self, origin: Vec3, _rng: &mut Sampler) -> DirectLightSample {
        let to_light = self.position - origin;
        let dist2 = to_light.length_squared();
        if !(dist2 > 0.0) {
            return DirectLightSample::invalid();
        }
        let distance = dist2.sqrt();
        DirectLightSample {
            wi: to_light / distance,
            weight: self.power * (0.25 * FRAC_1_PI) / dist2,
            distance,
            pdf: f32::INFINITY,
        }
    }

    fn can_be_intersected(&self) -> bool {
        false
    }
}

/// Parallel light arriving from `direction`.
#[derive(Debug, Clone, Copy)]
pub struct DirectionalLight {
    /// Direction towards the light.
    pub direction: Vec3,
    pub intensity: Color,
}

impl DirectionalLight {
    pub fn new(direction: Vec3, intensity: Color) -> Self {
        Self {
            direction: direction.normalize(),
            intensity,
        }
    }
}

impl Light for DirectionalLight {
    fn sample_direct(&self, _origin: Vec3, _rng: &mut Sampler) -> DirectLightSample {
        DirectLightSample {
            wi: self.direction,
            weight: self.intensity,
            distance: f32::INFINITY,
            pdf: f32::INFINITY,
        }
    }

    fn can_be_intersected(&self) -> bool {
        false
    }
}

/// Emissive instance sampled by area.
pub struct AreaLight {
    instance: Arc<Instance>,
}

impl AreaLight {
    pub fn new(instance: Arc<Instance>) -> Self {
        Self { instance }
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }
}

impl Light for AreaLight {
    fn sample_direct(&self, origin: Vec3, rng: &mut Sampler) -> DirectLightSample {
        let Some(emission) = self.instance.emission() else {
            return DirectLightSample::invalid();
        };
        let sample = self.instance.sample_area(rng, Some(origin));

        let to_light = sample.position - origin;
        let distance = to_light.length();
        if !(distance > 0.0) {
            return DirectLightSample::invalid();
        }
        let wi = to_light / distance;

        let pdf = warp::pdf_to_solid_angle(sample.pdf, distance, sample.geometry_normal.dot(wi));
        if !pdf.is_finite() {
            return DirectLightSample::invalid();
        }

        let wo = sample.frame.to_local(-wi);
        let radiance = emission.evaluate(sample.uv, wo).value;
        DirectLightSample {
            wi,
            weight: radiance / pdf,
            distance,
            pdf,
        }
    }

    fn can_be_intersected(&self) -> bool {
        true
    }
}
