//! Environment map light surrounding the scene.
//!
//! Directions map to a latitude/longitude image with `+y` up: the top image
//! row is the zenith and `u` runs clockwise around the `y` axis starting at
//! `-x`.

use crate::{BackgroundLight, DirectLightSample, EmissionEval, Light, Sampler, Texture};
use lux_math::{safe_acos, warp, ColorExt, Distribution2D, Transform, Vec2, Vec3};
use std::f32::consts::PI;
use std::sync::Arc;

pub struct EnvironmentMap {
    texture: Arc<dyn Texture>,
    /// Rotation of the map. Only rotations keep the sampling density valid.
    transform: Option<Transform>,
    distribution: Option<Distribution2D>,
}

impl EnvironmentMap {
    pub fn new(texture: Arc<dyn Texture>) -> Self {
        Self {
            texture,
            transform: None,
            distribution: None,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Samples directions proportionally to luminance, tabulated on a
    /// `width x height` grid over the map.
    pub fn with_importance_sampling(mut self, width: usize, height: usize) -> Self {
        if width == 0 || height == 0 {
            log::warn!("Ignoring {}x{} environment sampling grid", width, height);
            return self;
        }

        let mut func = Vec::with_capacity(width * height);
        for row in 0..height {
            let t = (row as f32 + 0.5) / height as f32;
            let sin_theta = (t * PI).sin();
            for col in 0..width {
                let u = (col as f32 + 0.5) / width as f32;
                let luminance = self.texture.evaluate(Vec2::new(u, 1.0 - t)).luminance();
                func.push(luminance.max(0.0) * sin_theta);
            }
        }

        log::info!("Environment map importance sampling: {}x{} grid", width, height);
        self.distribution = Some(Distribution2D::new(&func, width, height));
        self
    }

    /// Map coordinates `(u, t)` of a local direction, `t = θ / π` from the zenith.
    fn direction_to_map(dir: Vec3) -> Vec2 {
        let phi = dir.z.atan2(dir.x);
        let theta = safe_acos(dir.y);
        Vec2::new((PI - phi) / (2.0 * PI), theta / PI)
    }

    fn map_to_direction(map: Vec2) -> Vec3 {
        let theta = map.y * PI;
        let phi = PI * (1.0 - 2.0 * map.x);
        let sin_theta = theta.sin();
        Vec3::new(sin_theta * phi.cos(), theta.cos(), sin_theta * phi.sin())
    }

    fn to_local(&self, direction: Vec3) -> Vec3 {
        match &self.transform {
            Some(transform) => transform.inverse_vector(direction).normalize(),
            None => direction.normalize(),
        }
    }

    fn to_world(&self, direction: Vec3) -> Vec3 {
        match &self.transform {
            Some(transform) => transform.apply_vector(direction).normalize(),
            None => direction,
        }
    }

    /// Solid-angle density of `sample_direct` for a local direction.
    fn pdf_local(&self, local: Vec3, map: Vec2) -> f32 {
        let Some(distribution) = &self.distribution else {
            return warp::uniform_sphere_pdf();
        };
        let sin_theta = (1.0 - local.y * local.y).max(0.0).sqrt();
        if sin_theta <= 0.0 {
            return 0.0;
        }
        distribution.pdf(map) / (2.0 * PI * PI * sin_theta)
    }

    fn radiance(&self, map: Vec2) -> lux_math::Color {
        self.texture.evaluate(Vec2::new(map.x, 1.0 - map.y))
    }
}

impl Light for EnvironmentMap {
    fn sample_direct(&self, _origin: Vec3, rng: &mut Sampler) -> DirectLightSample {
        let (local, map, pdf) = match &self.distribution {
            Some(distribution) => {
                let (map, pdf_map) = distribution.sample_continuous(rng.next_2d());
                let local = Self::map_to_direction(map);
                let sin_theta = (map.y * PI).sin();
                if !(sin_theta > 0.0) || !(pdf_map > 0.0) {
                    return DirectLightSample::invalid();
                }
                (local, map, pdf_map / (2.0 * PI * PI * sin_theta))
            }
            None => {
                let local = warp::square_to_uniform_sphere(rng.next_2d());
                (local, Self::direction_to_map(local), warp::uniform_sphere_pdf())
            }
        };

        DirectLightSample {
            wi: self.to_world(local),
            weight: self.radiance(map) / pdf,
            distance: f32::INFINITY,
            pdf,
        }
    }

    fn can_be_intersected(&self) -> bool {
        true
    }
}

impl BackgroundLight for EnvironmentMap {
    fn evaluate(&self, direction: Vec3) -> EmissionEval {
        let local = self.to_local(direction);
        let map = Self::direction_to_map(local);
        EmissionEval {
            value: self.radiance(map),
            pdf: self.pdf_local(local, map),
        }
    }
}
