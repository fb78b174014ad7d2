use crate::{BsdfEval, BsdfSample, Instance, Sampler, SurfaceEvent};
use lux_math::{warp, Color, Ray, Vec3};

/// Nearest hit found so far along a ray.
///
/// Starts out as a miss with `t` set to the search limit; shapes shrink `t`
/// as they find closer hits.
#[derive(Clone, Copy)]
pub struct Intersection<'a> {
    pub t: f32,
    /// Direction back towards the ray origin (unit length).
    pub wo: Vec3,
    pub surf: SurfaceEvent,
    pub instance: Option<&'a Instance>,
}

impl<'a> Intersection<'a> {
    pub fn new(wo: Vec3, t_max: f32) -> Self {
        Self {
            t: t_max,
            wo,
            surf: SurfaceEvent::default(),
            instance: None,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.instance.is_some()
    }

    pub fn position(&self) -> Vec3 {
        self.surf.position
    }

    /// Radiance emitted from the hit towards `wo`.
    pub fn evaluate_emission(&self) -> Color {
        match self.instance.and_then(Instance::emission) {
            Some(emission) => {
                emission
                    .evaluate(self.surf.uv, self.surf.frame.to_local(self.wo))
                    .value
            }
            None => Color::ZERO,
        }
    }

    /// Solid-angle density with which area-light sampling from `reference`
    /// would have produced this hit. `reference` must lie on the ray that
    /// found the hit, but may precede its origin.
    pub fn light_pdf_from(&self, reference: Vec3) -> f32 {
        let Some(instance) = self.instance else {
            return 0.0;
        };
        let surf = &self.surf;
        let area_pdf = instance.pdf_area(surf.position, surf.geometry_normal, Some(reference));
        let distance = surf.position.distance(reference);
        warp::pdf_to_solid_angle(area_pdf, distance, surf.geometry_normal.dot(self.wo))
    }

    /// BSDF towards world direction `wi`; invalid when the hit has no BSDF.
    pub fn evaluate_bsdf(&self, wi: Vec3) -> BsdfEval {
        match self.instance.and_then(Instance::bsdf) {
            Some(bsdf) => {
                let frame = &self.surf.frame;
                bsdf.evaluate(self.surf.uv, frame.to_local(self.wo), frame.to_local(wi))
            }
            None => BsdfEval::invalid(),
        }
    }

    /// Samples a world-space continuation direction.
    pub fn sample_bsdf(&self, rng: &mut Sampler) -> Option<BsdfSample> {
        let bsdf = self.instance.and_then(Instance::bsdf)?;
        let frame = &self.surf.frame;
        let sample = bsdf.sample(self.surf.uv, frame.to_local(self.wo), rng)?;
        Some(BsdfSample {
            wi: frame.to_world(sample.wi).normalize(),
            ..sample
        })
    }

    /// Ray leaving the hit point. Self-intersection is avoided by the
    /// `EPSILON` lower bound on accepted hits.
    pub fn spawn_ray(&self, direction: Vec3) -> Ray {
        Ray::new(self.surf.position, direction)
    }
}
