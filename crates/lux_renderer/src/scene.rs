//! Scene aggregate: instances, lights and the optional background.
//!
//! Built once through [`SceneBuilder`] and read-only afterwards, so it can be
//! shared across render threads.

use crate::bvh::{Bvh, Primitives};
use crate::{AreaLight, BackgroundLight, EmissionEval, EnvironmentMap, Instance, Intersection, Light, Sampler};
use lux_math::{Aabb, Ray, Vec3};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while assembling a scene.
#[derive(Error, Debug, PartialEq)]
pub enum SceneError {
    #[error("Area light on instance {0} has no emission")]
    LightWithoutEmission(usize),

    #[error("Instance {0} has non-finite bounds")]
    InvalidBounds(usize),
}

pub type SceneResult<T> = Result<T, SceneError>;

/// A light chosen for next-event estimation.
#[derive(Clone, Copy)]
pub struct LightSelection<'a> {
    pub light: &'a dyn Light,
    pub probability: f32,
}

#[derive(Default)]
pub struct SceneBuilder {
    instances: Vec<Arc<Instance>>,
    lights: Vec<Arc<dyn Light>>,
    background: Option<Arc<dyn BackgroundLight>>,
    errors: Vec<SceneError>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_instance(&mut self, instance: Instance) -> &mut Self {
        self.instances.push(Arc::new(instance));
        self
    }

    /// Adds an emissive instance and registers it for light sampling.
    pub fn add_area_light(&mut self, mut instance: Instance) -> &mut Self {
        if instance.emission().is_none() {
            self.errors.push(SceneError::LightWithoutEmission(self.instances.len()));
        }
        instance.mark_as_light();
        let instance = Arc::new(instance);
        self.lights.push(Arc::new(AreaLight::new(instance.clone())));
        self.instances.push(instance);
        self
    }

    /// Adds a light that has no geometry (point, directional).
    pub fn add_light(&mut self, light: Arc<dyn Light>) -> &mut Self {
        self.lights.push(light);
        self
    }

    /// Sets the environment seen by escaping rays; it is also sampled as a light.
    pub fn set_environment(&mut self, environment: Arc<EnvironmentMap>) -> &mut Self {
        if self.background.is_some() {
            log::warn!("Replacing previously set environment map");
            self.lights.retain(|light| !is_background(light, &self.background));
        }
        self.lights.push(environment.clone());
        self.background = Some(environment);
        self
    }

    pub fn build(self) -> SceneResult<Scene> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }

        let mut bounded = Vec::new();
        let mut unbounded = Vec::new();
        for (index, instance) in self.instances.iter().enumerate() {
            let bbox = instance.bounding_box();
            if bbox.min().is_nan() || bbox.max().is_nan() {
                return Err(SceneError::InvalidBounds(index));
            }
            if bbox.is_unbounded() {
                unbounded.push(index);
            } else {
                bounded.push(index);
            }
        }

        let bvh = Bvh::build(&InstanceSet {
            instances: &self.instances,
            indices: &bounded,
        });

        log::info!(
            "Built scene: {} instances ({} unbounded), {} lights, background: {}",
            self.instances.len(),
            unbounded.len(),
            self.lights.len(),
            self.background.is_some()
        );

        Ok(Scene {
            instances: self.instances,
            bounded,
            unbounded,
            bvh,
            lights: self.lights,
            background: self.background,
        })
    }
}

fn is_background(light: &Arc<dyn Light>, background: &Option<Arc<dyn BackgroundLight>>) -> bool {
    background.as_ref().is_some_and(|bg| {
        std::ptr::addr_eq(Arc::as_ptr(light), Arc::as_ptr(bg))
    })
}

/// Bounded instances as seen by the BVH builder.
struct InstanceSet<'a> {
    instances: &'a [Arc<Instance>],
    indices: &'a [usize],
}

impl Primitives for InstanceSet<'_> {
    fn primitive_count(&self) -> usize {
        self.indices.len()
    }

    fn primitive_bounds(&self, index: usize) -> Aabb {
        self.instances[self.indices[index]].bounding_box()
    }

    fn primitive_centroid(&self, index: usize) -> Vec3 {
        self.instances[self.indices[index]].centroid()
    }
}

pub struct Scene {
    instances: Vec<Arc<Instance>>,
    /// Instances indexed by the BVH
    bounded: Vec<usize>,
    /// Instances tested linearly (infinite bounds)
    unbounded: Vec<usize>,
    bvh: Bvh,
    lights: Vec<Arc<dyn Light>>,
    background: Option<Arc<dyn BackgroundLight>>,
}

impl Scene {
    /// Nearest hit along a ray with unit direction.
    pub fn intersect(&self, ray: &Ray) -> Intersection<'_> {
        self.intersect_with(ray, f32::INFINITY)
    }

    /// Nearest hit closer than `t_max`.
    pub fn intersect_with(&self, ray: &Ray, t_max: f32) -> Intersection<'_> {
        let mut its = Intersection::new(-ray.direction, t_max);
        self.bvh.intersect(ray, &mut its, |index, ray, its| {
            self.instances[self.bounded[index]].intersect(ray, its)
        });
        for &index in &self.unbounded {
            self.instances[index].intersect(ray, &mut its);
        }
        its
    }

    /// Whether anything blocks the ray before `max_distance`. Callers shorten
    /// the distance slightly to avoid hitting the light itself.
    pub fn is_occluded(&self, ray: &Ray, max_distance: f32) -> bool {
        self.intersect_with(ray, max_distance).is_hit()
    }

    pub fn has_lights(&self) -> bool {
        !self.lights.is_empty()
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Probability with which [`Scene::sample_light`] picks any given light.
    pub fn light_selection_probability(&self) -> f32 {
        if self.lights.is_empty() {
            0.0
        } else {
            1.0 / self.lights.len() as f32
        }
    }

    /// Picks a light uniformly.
    pub fn sample_light(&self, rng: &mut Sampler) -> Option<LightSelection<'_>> {
        if self.lights.is_empty() {
            return None;
        }
        let count = self.lights.len();
        let index = ((rng.next_1d() * count as f32) as usize).min(count - 1);
        Some(LightSelection {
            light: self.lights[index].as_ref(),
            probability: self.light_selection_probability(),
        })
    }

    pub fn background(&self) -> Option<&dyn BackgroundLight> {
        self.background.as_deref()
    }

    /// Radiance of the background in `direction`, black without one.
    pub fn evaluate_background(&self, direction: Vec3) -> EmissionEval {
        match &self.background {
            Some(background) => background.evaluate(direction),
            None => EmissionEval::invalid(),
        }
    }

    pub fn bounding_box(&self) -> Aabb {
        self.bvh.bounding_box()
    }
}
