//! A shape placed in the scene with its transform and surface properties.

use crate::{AreaSample, Bsdf, Emission, Intersection, Medium, Sampler, Shape, Texture};
use lux_math::{Aabb, Frame, Ray, Transform, Vec3, EPSILON};
use std::sync::Arc;

/// A shape with an optional local-to-world transform, BSDF, emission,
/// interior medium and tangent-space normal map.
///
/// An instance without a BSDF is invisible to shading; with a medium attached
/// it acts as the boundary of a participating volume.
#[derive(Clone)]
pub struct Instance {
    shape: Arc<dyn Shape>,
    transform: Option<Transform>,
    bsdf: Option<Arc<dyn Bsdf>>,
    emission: Option<Arc<dyn Emission>>,
    medium: Option<Arc<dyn Medium>>,
    normal_map: Option<Arc<dyn Texture>>,
    is_light: bool,
}

impl Instance {
    pub fn new(shape: Arc<dyn Shape>) -> Self {
        Self {
            shape,
            transform: None,
            bsdf: None,
            emission: None,
            medium: None,
            normal_map: None,
            is_light: false,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_bsdf(mut self, bsdf: Arc<dyn Bsdf>) -> Self {
        self.bsdf = Some(bsdf);
        self
    }

    pub fn with_emission(mut self, emission: Arc<dyn Emission>) -> Self {
        self.emission = Some(emission);
        self
    }

    pub fn with_medium(mut self, medium: Arc<dyn Medium>) -> Self {
        self.medium = Some(medium);
        self
    }

    /// Normal map texture with tangent-space normals encoded in `[0, 1]`.
    pub fn with_normal_map(mut self, normal_map: Arc<dyn Texture>) -> Self {
        self.normal_map = Some(normal_map);
        self
    }

    /// Marks the instance as registered with the scene's light list.
    pub(crate) fn mark_as_light(&mut self) {
        self.is_light = true;
    }

    pub fn is_light(&self) -> bool {
        self.is_light
    }

    pub fn bsdf(&self) -> Option<&dyn Bsdf> {
        self.bsdf.as_deref()
    }

    pub fn emission(&self) -> Option<&dyn Emission> {
        self.emission.as_deref()
    }

    pub fn medium(&self) -> Option<&Arc<dyn Medium>> {
        self.medium.as_ref()
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    /// Intersects a world ray with unit-length direction, recording this
    /// instance on success.
    pub fn intersect<'a>(&'a self, ray: &Ray, its: &mut Intersection<'a>) -> bool {
        debug_assert!(
            (ray.direction.length_squared() - 1.0).abs() < 1e-3,
            "instance rays must have unit direction"
        );

        let hit = match &self.transform {
            Some(transform) => self.intersect_local(transform, ray, its),
            None => {
                let hit = self.shape.intersect(ray, its);
                if hit {
                    self.apply_normal_map(its);
                }
                hit
            }
        };
        if !hit {
            return false;
        }

        debug_assert!(its.t.is_finite() && its.t >= EPSILON);
        its.instance = Some(self);
        true
    }

    /// Transformed hit test. Surface data comes back in world space.
    fn intersect_local(&self, transform: &Transform, ray: &Ray, its: &mut Intersection<'_>) -> bool {
        let local = transform.inverse_ray(ray);
        let scale = local.direction.length();
        if !(scale > 0.0) || !scale.is_finite() {
            return false;
        }
        let local = Ray::new(local.origin, local.direction / scale);

        // Distances along the normalized local ray are `scale` times larger
        let previous_t = its.t;
        its.t *= scale;
        if !self.shape.intersect(&local, its) {
            its.t = previous_t;
            return false;
        }

        its.t /= scale;
        self.apply_normal_map(its);
        transform_surface(transform, &mut its.surf);
        true
    }

    pub fn bounding_box(&self) -> Aabb {
        let local = self.shape.bounding_box();
        match &self.transform {
            Some(transform) => transform.apply_aabb(&local),
            None => local,
        }
    }

    pub fn centroid(&self) -> Vec3 {
        let local = self.shape.centroid();
        match &self.transform {
            Some(transform) => transform.apply_point(local),
            None => local,
        }
    }

    /// Samples a world-space point with its world-space area density.
    pub fn sample_area(&self, rng: &mut Sampler, reference: Option<Vec3>) -> AreaSample {
        match &self.transform {
            Some(transform) => {
                let local_reference = reference.map(|p| transform.inverse_point(p));
                let mut sample = self.shape.sample_area(rng, local_reference);
                transform_surface(transform, &mut sample);
                sample
            }
            None => self.shape.sample_area(rng, reference),
        }
    }

    /// World-space area density with which `sample_area(_, reference)`
    /// produces `position`, a point on this instance with geometric normal
    /// `geometry_normal`.
    pub fn pdf_area(&self, position: Vec3, geometry_normal: Vec3, reference: Option<Vec3>) -> f32 {
        let Some(transform) = &self.transform else {
            return self.shape.pdf_area(position, reference);
        };
        let local_pdf = self.shape.pdf_area(
            transform.inverse_point(position),
            reference.map(|p| transform.inverse_point(p)),
        );
        let jacobian = transform.area_scale(transform.inverse_normal(geometry_normal));
        if jacobian > 0.0 {
            local_pdf / jacobian
        } else {
            local_pdf
        }
    }

    /// Perturbs the shading frame by the normal map, in local space.
    fn apply_normal_map(&self, its: &mut Intersection<'_>) {
        let Some(normal_map) = &self.normal_map else {
            return;
        };
        let encoded = normal_map.evaluate(its.surf.uv);
        let local_normal = (encoded * 2.0 - Vec3::ONE).normalize_or_zero();
        if local_normal == Vec3::ZERO {
            return;
        }
        let frame = &its.surf.frame;
        let normal = frame.to_world(local_normal).normalize();
        its.surf.frame = Frame::from_normal_tangent(normal, frame.tangent);
    }
}

/// Moves local surface data to world space, converting the area density with
/// the Jacobian of the transform.
fn transform_surface(transform: &Transform, surf: &mut AreaSample) {
    let jacobian = transform.area_scale(surf.geometry_normal);

    surf.position = transform.apply_point(surf.position);
    surf.geometry_normal = transform.apply_normal(surf.geometry_normal).normalize();

    let normal = transform.apply_normal(surf.frame.normal).normalize();
    let tangent = transform.apply_vector(surf.frame.tangent);
    surf.frame = Frame::from_normal_tangent(normal, tangent);

    if jacobian > 0.0 {
        surf.pdf /= jacobian;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConstantTexture, Sphere, TriangleMesh};
    use lux_math::Quat;

    fn hit<'a>(instance: &'a Instance, ray: &Ray) -> Option<Intersection<'a>> {
        let mut its = Intersection::new(-ray.direction, f32::INFINITY);
        instance.intersect(ray, &mut its).then_some(its)
    }

    #[test]
    fn test_translated_and_scaled_sphere() {
        let instance = Instance::new(Arc::new(Sphere)).with_transform(
            Transform::from_translation(Vec3::new(0.0, 0.0, -10.0))
                .then_local(&Transform::from_scale(Vec3::splat(2.0))),
        );
        let its = hit(&instance, &Ray::new(Vec3::ZERO, -Vec3::Z)).unwrap();
        assert!((its.t - 8.0).abs() < 1e-4);
        assert!((its.position() - Vec3::new(0.0, 0.0, -8.0)).length() < 1e-4);
        assert!((its.surf.frame.normal - Vec3::Z).length() < 1e-4);
        assert!(std::ptr::eq(its.instance.unwrap(), &instance));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unit direction")]
    fn test_plain_instance_rejects_unnormalized_ray() {
        let instance = Instance::new(Arc::new(Sphere));
        hit(&instance, &Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -2.0)));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unit direction")]
    fn test_transformed_instance_rejects_unnormalized_ray() {
        let instance = Instance::new(Arc::new(Sphere)).with_transform(Transform::from_scale(Vec3::splat(2.0)));
        hit(&instance, &Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -2.0)));
    }

    #[test]
    fn test_miss_restores_distance() {
        let instance = Instance::new(Arc::new(Sphere))
            .with_transform(Transform::from_scale(Vec3::splat(3.0)));
        let ray = Ray::new(Vec3::new(0.0, 10.0, 10.0), -Vec3::Z);
        let mut its = Intersection::new(Vec3::Z, 50.0);
        assert!(!instance.intersect(&ray, &mut its));
        assert_eq!(its.t, 50.0);
        assert!(!its.is_hit());
    }

    #[test]
    fn test_frame_orthonormal_under_nonuniform_scale() {
        let instance = Instance::new(Arc::new(Sphere)).with_transform(
            Transform::from_scale_rotation_translation(
                Vec3::new(3.0, 0.5, 1.0),
                Quat::from_rotation_y(0.4),
                Vec3::new(1.0, 2.0, 3.0),
            ),
        );
        let mut rng = Sampler::new(21);
        for _ in 0..100 {
            let s = instance.sample_area(&mut rng, None);
            let f = s.frame;
            assert!((f.normal.length() - 1.0).abs() < 1e-4);
            assert!((f.tangent.length() - 1.0).abs() < 1e-4);
            assert!(f.normal.dot(f.tangent).abs() < 1e-4);
            assert!(f.normal.dot(f.bitangent).abs() < 1e-4);
        }
    }

    #[test]
    fn test_area_pdf_accounts_for_scale() {
        let instance = Instance::new(Arc::new(TriangleMesh::rectangle()))
            .with_transform(Transform::from_scale(Vec3::new(2.0, 3.0, 1.0)));
        let its = hit(&instance, &Ray::new(Vec3::new(0.5, 0.5, 2.0), -Vec3::Z)).unwrap();
        // World area is 4 * 6 = 24
        assert!((its.surf.pdf - 1.0 / 24.0).abs() < 1e-5);
        assert!((its.t - 2.0).abs() < 1e-5);

        let mut rng = Sampler::new(2);
        let s = instance.sample_area(&mut rng, None);
        assert!((s.pdf - 1.0 / 24.0).abs() < 1e-5);
    }

    #[test]
    fn test_pdf_area_matches_sampling_under_transform() {
        let instance = Instance::new(Arc::new(Sphere)).with_transform(
            Transform::from_scale_rotation_translation(
                Vec3::new(2.0, 0.5, 1.0),
                Quat::from_rotation_z(0.3),
                Vec3::new(0.0, 4.0, 0.0),
            ),
        );
        let reference = Vec3::new(1.0, -1.0, 0.5);
        let mut rng = Sampler::new(8);
        for _ in 0..100 {
            let s = instance.sample_area(&mut rng, Some(reference));
            let pdf = instance.pdf_area(s.position, s.geometry_normal, Some(reference));
            assert!((pdf - s.pdf).abs() < 1e-3 * s.pdf, "{} vs {}", pdf, s.pdf);
        }
    }

    #[test]
    fn test_light_pdf_from_earlier_point_on_ray() {
        let instance = Instance::new(Arc::new(Sphere))
            .with_transform(Transform::from_translation(Vec3::new(0.0, 0.0, -6.0)));
        let start = Vec3::new(0.2, 0.1, 0.0);
        let dir = (Vec3::new(0.0, 0.1, -5.5) - start).normalize();

        let from_start = hit(&instance, &Ray::new(start, dir)).unwrap();
        let from_later = hit(&instance, &Ray::new(start + dir * 2.0, dir)).unwrap();
        let expected = from_start.light_pdf_from(start);
        assert!((from_later.light_pdf_from(start) - expected).abs() < 1e-3 * expected);
        // Seen from closer, the sphere covers a wider cone
        assert!(from_later.light_pdf_from(from_later.position() - dir * from_later.t) < expected);
    }

    #[test]
    fn test_flat_normal_map_keeps_normal() {
        let instance = Instance::new(Arc::new(TriangleMesh::rectangle()))
            .with_normal_map(Arc::new(ConstantTexture::new(Vec3::new(0.5, 0.5, 1.0))));
        let its = hit(&instance, &Ray::new(Vec3::new(0.2, 0.1, 1.0), -Vec3::Z)).unwrap();
        assert!((its.surf.frame.normal - Vec3::Z).length() < 1e-5);

        let tilted = Instance::new(Arc::new(TriangleMesh::rectangle()))
            .with_normal_map(Arc::new(ConstantTexture::new(Vec3::new(1.0, 0.5, 1.0))));
        let its = hit(&tilted, &Ray::new(Vec3::new(0.2, 0.1, 1.0), -Vec3::Z)).unwrap();
        assert!(its.surf.frame.normal.dot(Vec3::Z) < 0.9);
        // Geometric normal is untouched
        assert!((its.surf.geometry_normal - Vec3::Z).length() < 1e-5);
    }
}
