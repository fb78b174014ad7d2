//! Path tracer for scenes with homogeneous participating media.
//!
//! Media fill the interior of their boundary instances. The tracer follows a
//! single current medium: crossing a boundary towards its inside enters the
//! boundary's medium, crossing it outwards returns to vacuum. Boundaries
//! without a BSDF are invisible interfaces that rays pass straight through.

use crate::integrator::{balance_heuristic, sanitize, weighted_background, weighted_emission};
use crate::path::russian_roulette;
use crate::{Integrator, Intersection, Medium, Sampler, Scene};
use lux_math::{Color, ColorExt, Ray, Vec3, EPSILON};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeTracerConfig {
    /// Number of surface or medium scattering events.
    pub max_depth: u32,
    pub mis: bool,
    pub rr_depth: u32,
    /// Limit on invisible boundaries crossed by one path segment or shadow ray.
    pub max_crossings: u32,
}

impl Default for VolumeTracerConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            mis: true,
            rr_depth: 2,
            max_crossings: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VolumePathTracer {
    pub config: VolumeTracerConfig,
}

impl VolumePathTracer {
    pub fn new(config: VolumeTracerConfig) -> Self {
        Self { config }
    }

    /// Fraction of light reaching `origin + distance * direction` from the
    /// origin. Surfaces with a BSDF block the ray; media attenuate it.
    fn transmittance<'a>(
        &self,
        scene: &'a Scene,
        origin: Vec3,
        direction: Vec3,
        distance: f32,
        mut medium: Option<&'a dyn Medium>,
    ) -> f32 {
        let mut ray = Ray::new(origin, direction);
        let mut remaining = distance;
        let mut transmittance = 1.0;

        for _ in 0..=self.config.max_crossings {
            let its = scene.intersect_with(&ray, remaining);
            let Some(instance) = its.instance else {
                if let Some(medium) = medium {
                    transmittance *= medium.eval_transmittance(remaining);
                }
                return transmittance;
            };
            if instance.bsdf().is_some() {
                return 0.0;
            }
            if let Some(medium) = medium {
                transmittance *= medium.eval_transmittance(its.t);
            }
            if transmittance <= 0.0 {
                return 0.0;
            }
            medium = medium_after(&its, direction, medium);
            remaining -= its.t;
            ray = its.spawn_ray(direction);
        }

        log::debug!("Shadow ray exceeded {} boundary crossings", self.config.max_crossings);
        0.0
    }

    /// Next-event estimate from `origin`. `scatter(wi)` returns the scattering
    /// value towards `wi`, its sampling density and the medium the shadow ray
    /// starts in.
    fn estimate_direct<'a, F>(
        &self,
        scene: &'a Scene,
        origin: Vec3,
        rng: &mut Sampler,
        scatter: F,
    ) -> Color
    where
        F: Fn(Vec3) -> (Color, f32, Option<&'a dyn Medium>),
    {
        let Some(selection) = scene.sample_light(rng) else {
            return Color::ZERO;
        };
        let sample = selection.light.sample_direct(origin, rng);
        if sample.is_invalid() {
            return Color::ZERO;
        }

        let (value, scatter_pdf, start_medium) = scatter(sample.wi);
        if value.is_black() {
            return Color::ZERO;
        }

        let max_distance = if sample.distance.is_finite() {
            sample.distance * (1.0 - EPSILON)
        } else {
            f32::INFINITY
        };
        let transmittance = self.transmittance(scene, origin, sample.wi, max_distance, start_medium);
        if transmittance <= 0.0 {
            return Color::ZERO;
        }

        let weight = if self.config.mis && selection.light.can_be_intersected() {
            balance_heuristic(selection.probability * sample.pdf, scatter_pdf)
        } else {
            1.0
        };
        sample.weight * value * (transmittance * weight / selection.probability)
    }
}

/// Medium on the far side of `its` for a ray leaving along `direction`.
fn medium_after<'a>(its: &Intersection<'a>, direction: Vec3, current: Option<&'a dyn Medium>) -> Option<&'a dyn Medium> {
    let Some(boundary) = its.instance.and_then(|instance| instance.medium()) else {
        return current;
    };
    if its.surf.frame.normal.dot(direction) < 0.0 {
        Some(boundary.as_ref())
    } else {
        None
    }
}

impl Integrator for VolumePathTracer {
    fn li(&self, ray: &Ray, scene: &Scene, rng: &mut Sampler) -> Color {
        let config = &self.config;
        let mut ray = *ray;
        let mut radiance = Color::ZERO;
        let mut throughput = Color::ONE;
        let mut scatter_pdf = f32::INFINITY;
        // Where `scatter_pdf` was sampled; invisible boundary crossings move
        // the ray origin but not this point
        let mut vertex = ray.origin;
        let mut medium: Option<&dyn Medium> = None;
        let mut depth = 0;
        let mut crossings = 0;

        loop {
            let its = scene.intersect(&ray);

            // Free flight through the current medium
            if let Some(current) = medium {
                let distance = current.sample_distance(rng);
                if distance < its.t {
                    let albedo = current.scattering_albedo();
                    if albedo <= 0.0 {
                        break;
                    }
                    throughput *= albedo;
                    if depth >= config.max_depth {
                        break;
                    }

                    let position = ray.at(distance);
                    let wo = -ray.direction;
                    radiance += throughput
                        * self.estimate_direct(scene, position, rng, |wi| {
                            let phase = current.phase(wo, wi);
                            (Color::splat(phase), phase, medium)
                        });

                    // Phase sampling is perfect importance sampling, weight 1
                    let (wi, pdf) = current.sample_direction(wo, rng);
                    scatter_pdf = pdf;
                    vertex = position;
                    ray = Ray::new(position, wi);
                    depth += 1;
                    crossings = 0;
                    if depth > config.rr_depth && !russian_roulette(&mut throughput, rng) {
                        break;
                    }
                    continue;
                }
            }

            let Some(instance) = its.instance else {
                radiance += throughput * weighted_background(scene, ray.direction, scatter_pdf, config.mis);
                break;
            };

            radiance += throughput * weighted_emission(&its, scene, vertex, scatter_pdf, config.mis);

            if instance.bsdf().is_none() {
                crossings += 1;
                if crossings > config.max_crossings {
                    log::debug!("Path exceeded {} boundary crossings", config.max_crossings);
                    break;
                }
                medium = medium_after(&its, ray.direction, medium);
                ray = its.spawn_ray(ray.direction);
                continue;
            }

            if depth >= config.max_depth {
                break;
            }

            radiance += throughput
                * self.estimate_direct(scene, its.position(), rng, |wi| {
                    let eval = its.evaluate_bsdf(wi);
                    (eval.value, eval.pdf, medium_after(&its, wi, medium))
                });

            let Some(sample) = its.sample_bsdf(rng) else {
                break;
            };
            if sample.weight.is_black() {
                break;
            }
            throughput *= sample.weight;
            scatter_pdf = sample.pdf;
            vertex = its.position();
            medium = medium_after(&its, sample.wi, medium);
            ray = its.spawn_ray(sample.wi);
            depth += 1;
            crossings = 0;

            if depth > config.rr_depth && !russian_roulette(&mut throughput, rng) {
                break;
            }
        }

        sanitize(radiance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ConstantTexture, Diffuse, EnvironmentMap, HomogeneousMedium, Instance, LambertianEmission, PathTracer,
        PathTracerConfig, SceneBuilder, Sphere, TriangleMesh,
    };
    use lux_math::{Quat, Transform};
    use std::f32::consts::PI;
    use std::sync::Arc;

    fn constant(value: f32) -> Arc<ConstantTexture> {
        Arc::new(ConstantTexture::new(Color::splat(value)))
    }

    fn mean_estimate(integrator: &dyn Integrator, scene: &Scene, ray: &Ray, n: u32) -> Color {
        let mut sum = Color::ZERO;
        for i in 0..n {
            let mut rng = Sampler::for_pixel(9, 1, 1, i);
            sum += integrator.li(ray, scene, &mut rng);
        }
        sum / n as f32
    }

    /// Emissive wall at z = -5 seen through a unit sphere of `medium`.
    fn wall_behind_fog(medium: Option<HomogeneousMedium>) -> Scene {
        let mut builder = SceneBuilder::new();
        builder.add_area_light(
            Instance::new(Arc::new(TriangleMesh::rectangle()))
                .with_transform(Transform::from_scale_rotation_translation(
                    Vec3::splat(10.0),
                    Default::default(),
                    Vec3::new(0.0, 0.0, -5.0),
                ))
                .with_emission(Arc::new(LambertianEmission::new(constant(1.0)))),
        );
        if let Some(medium) = medium {
            builder.add_instance(Instance::new(Arc::new(Sphere::new())).with_medium(Arc::new(medium)));
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_absorbing_medium_scales_by_transmittance() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), -Vec3::Z);
        let tracer = VolumePathTracer::default();

        let clear = mean_estimate(&tracer, &wall_behind_fog(None), &ray, 16);
        assert!((clear.x - 1.0).abs() < 1e-5);

        // Chord of length 2 through sigma_t = 0.5
        let fog = wall_behind_fog(Some(HomogeneousMedium::new(0.5, 0.0)));
        let foggy = mean_estimate(&tracer, &fog, &ray, 20_000);
        let expected = clear.x * (-1.0f32).exp();
        assert!((foggy.x - expected).abs() < 0.02, "{} vs {}", foggy.x, expected);
    }

    #[test]
    fn test_shadow_transmittance_through_boundary() {
        let scene = wall_behind_fog(Some(HomogeneousMedium::new(0.25, 0.0)));
        let tracer = VolumePathTracer::default();
        let t = tracer.transmittance(&scene, Vec3::new(0.0, 0.0, 3.0), -Vec3::Z, 6.0, None);
        assert!((t - (-0.5f32).exp()).abs() < 1e-4, "{}", t);

        // Starting inside the medium
        let t = tracer.transmittance(&scene, Vec3::ZERO, Vec3::Z, 3.0, Some(&HomogeneousMedium::new(0.25, 0.0)));
        assert!((t - (-0.25f32).exp()).abs() < 1e-4, "{}", t);
    }

    #[test]
    fn test_opaque_surface_blocks_shadow_ray() {
        let mut builder = SceneBuilder::new();
        builder.add_instance(Instance::new(Arc::new(Sphere::new())).with_bsdf(Arc::new(Diffuse::new(constant(0.5)))));
        let scene = builder.build().unwrap();
        let tracer = VolumePathTracer::default();
        assert_eq!(tracer.transmittance(&scene, Vec3::new(0.0, 0.0, 3.0), -Vec3::Z, 6.0, None), 0.0);
        assert_eq!(tracer.transmittance(&scene, Vec3::new(0.0, 3.0, 3.0), -Vec3::Z, 6.0, None), 1.0);
    }

    #[test]
    fn test_scattering_furnace() {
        // A purely scattering medium under a uniform sky neither gains nor loses energy
        let mut builder = SceneBuilder::new();
        builder
            .add_instance(Instance::new(Arc::new(Sphere::new())).with_medium(Arc::new(HomogeneousMedium::new(0.0, 1.0))))
            .set_environment(Arc::new(EnvironmentMap::new(constant(1.0))));
        let scene = builder.build().unwrap();

        let tracer = VolumePathTracer::new(VolumeTracerConfig {
            max_depth: 64,
            ..Default::default()
        });
        let ray = Ray::new(Vec3::new(0.0, 0.0, 4.0), -Vec3::Z);
        let estimate = mean_estimate(&tracer, &scene, &ray, 20_000);
        assert!((estimate.x - 1.0).abs() < 0.03, "{}", estimate.x);
    }

    #[test]
    fn test_matches_path_tracer_without_media() {
        let mut builder = SceneBuilder::new();
        builder
            .add_instance(Instance::new(Arc::new(Sphere::new())).with_bsdf(Arc::new(Diffuse::new(constant(0.7)))))
            .set_environment(Arc::new(EnvironmentMap::new(constant(1.0))));
        let scene = builder.build().unwrap();
        let ray = Ray::new(Vec3::new(0.0, 0.0, 4.0), -Vec3::Z);

        let volume = VolumePathTracer::new(VolumeTracerConfig {
            max_depth: 4,
            ..Default::default()
        });
        let path = PathTracer::new(PathTracerConfig {
            max_depth: 4,
            ..Default::default()
        });
        for i in 0..32 {
            let a = volume.li(&ray, &scene, &mut Sampler::for_pixel(0, 0, 0, i));
            let b = path.li(&ray, &scene, &mut Sampler::for_pixel(0, 0, 0, i));
            assert!((a - b).abs().max_element() < 1e-5, "{:?} vs {:?}", a, b);
        }
    }

    /// Diffuse floor at z = 0 under a downward-facing square light at
    /// z = 3.5, optionally wrapped in a radius-3 boundary of `medium`.
    fn floor_under_light(medium: Option<HomogeneousMedium>) -> Scene {
        let mut builder = SceneBuilder::new();
        builder
            .add_instance(
                Instance::new(Arc::new(TriangleMesh::rectangle()))
                    .with_transform(Transform::from_scale(Vec3::splat(10.0)))
                    .with_bsdf(Arc::new(Diffuse::new(constant(0.8)))),
            )
            .add_area_light(
                Instance::new(Arc::new(TriangleMesh::rectangle()))
                    .with_transform(Transform::from_scale_rotation_translation(
                        Vec3::ONE,
                        Quat::from_rotation_x(PI),
                        Vec3::new(0.0, 0.0, 3.5),
                    ))
                    .with_emission(Arc::new(LambertianEmission::new(constant(4.0)))),
            );
        if let Some(medium) = medium {
            builder.add_instance(
                Instance::new(Arc::new(Sphere::new()))
                    .with_transform(Transform::from_scale(Vec3::splat(3.0)))
                    .with_medium(Arc::new(medium)),
            );
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_vacuum_boundary_leaves_mis_estimate_unchanged() {
        let tracer = VolumePathTracer::new(VolumeTracerConfig {
            max_depth: 1,
            ..Default::default()
        });
        let ray = Ray::new(Vec3::new(0.5, 0.3, 2.0), Vec3::new(0.1, 0.05, -1.0).normalize());

        // Vacuum draws no free-flight samples, so both scenes see the same
        // random streams
        let plain = mean_estimate(&tracer, &floor_under_light(None), &ray, 4_000);
        let bounded = floor_under_light(Some(HomogeneousMedium::new(0.0, 0.0)));
        let through = mean_estimate(&tracer, &bounded, &ray, 4_000);
        assert!(plain.x > 0.0);
        assert!((plain.x - through.x).abs() < 1e-3 * plain.x, "{} vs {}", plain.x, through.x);

        // Hits on the light behind the boundary must carry the MIS weight
        // of the floor vertex, which makes both halves of the estimate agree
        let unweighted = VolumePathTracer::new(VolumeTracerConfig {
            max_depth: 1,
            mis: false,
            ..Default::default()
        });
        let reference = mean_estimate(&unweighted, &bounded, &ray, 40_000);
        assert!((through.x - reference.x).abs() < 0.03 * reference.x, "{} vs {}", through.x, reference.x);
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: VolumeTracerConfig = serde_json::from_str(r#"{"max_crossings": 4}"#).unwrap();
        assert_eq!(config.max_crossings, 4);
        assert_eq!(config.max_depth, 2);
        assert!(config.mis);
    }
}
