use crate::{AreaSample, Intersection, Sampler, Shape, SurfaceEvent};
use lux_math::{safe_asin, warp, Aabb, Frame, Ray, Vec2, Vec3, EPSILON};
use std::f32::consts::FRAC_1_PI;

/// Unit sphere centered at the local origin. Position and size come from the
/// instance transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sphere;

impl Sphere {
    pub fn new() -> Self {
        Self
    }

    /// Surface data for a point on the sphere.
    fn surface_at(point: Vec3, pdf: f32) -> SurfaceEvent {
        let normal = point.normalize();
        SurfaceEvent {
            position: point,
            uv: sphere_uv(normal),
            frame: Frame::from_normal(normal),
            geometry_normal: normal,
            pdf,
        }
    }

    /// Cosine of the half-angle of the cone subtended by the sphere from
    /// `reference`, or `None` when the point is inside the sphere.
    fn cone_cos_max(reference: Vec3) -> Option<f32> {
        let dist2 = reference.length_squared();
        if dist2 <= 1.0 + EPSILON {
            return None;
        }
        Some((1.0 - 1.0 / dist2).max(0.0).sqrt())
    }

    /// Area density of cone sampling from `reference` at `point`.
    fn cone_area_pdf(point: Vec3, reference: Vec3, cos_max: f32) -> f32 {
        let to_point = point - reference;
        let dist2 = to_point.length_squared();
        let cos_surface = point.normalize().dot(to_point).abs() / dist2.sqrt();
        warp::uniform_sphere_cone_pdf(cos_max) * cos_surface / dist2
    }
}

/// Longitude/latitude mapping of a unit normal to `[0, 1]^2`.
fn sphere_uv(n: Vec3) -> Vec2 {
    Vec2::new(
        0.5 - n.z.atan2(n.x) * 0.5 * FRAC_1_PI,
        0.5 - safe_asin(n.y) * FRAC_1_PI,
    )
}

impl Shape for Sphere {
    fn intersect(&self, ray: &Ray, its: &mut Intersection<'_>) -> bool {
        // |o + t d|^2 = 1 with |d| = 1, so a = 1 and we use the half-b form
        let half_b = ray.origin.dot(ray.direction);
        let c = ray.origin.length_squared() - 1.0;
        let discriminant = half_b * half_b - c;
        if discriminant < 0.0 {
            return false;
        }

        let q = -(half_b + discriminant.sqrt().copysign(half_b));
        if q == 0.0 {
            return false;
        }
        let (mut t0, mut t1) = (q, c / q);
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }

        let t = if t0 >= EPSILON {
            t0
        } else if t1 >= EPSILON {
            t1
        } else {
            return false;
        };
        if t >= its.t {
            return false;
        }

        let point = ray.at(t);
        its.t = t;
        its.surf = Sphere::surface_at(point, self.pdf_area(point, Some(ray.origin)));
        true
    }

    fn bounding_box(&self) -> Aabb {
        Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    fn centroid(&self) -> Vec3 {
        Vec3::ZERO
    }

    fn sample_area(&self, rng: &mut Sampler, reference: Option<Vec3>) -> AreaSample {
        let cone = reference.and_then(|p| Sphere::cone_cos_max(p).map(|cos_max| (p, cos_max)));

        let Some((reference, cos_max)) = cone else {
            let point = warp::square_to_uniform_sphere(rng.next_2d());
            return Sphere::surface_at(point, 0.25 * FRAC_1_PI);
        };

        // Sample a direction inside the visible cone and project it onto the
        // near side of the sphere.
        let dist = reference.length();
        let axis = Frame::from_normal(-reference / dist);
        let dir = axis.to_world(warp::square_to_uniform_sphere_cone(rng.next_2d(), cos_max));

        let half_b = reference.dot(dir);
        let c = dist * dist - 1.0;
        let t = -half_b - (half_b * half_b - c).max(0.0).sqrt();
        let point = (reference + dir * t).normalize();

        Sphere::surface_at(point, Sphere::cone_area_pdf(point, reference, cos_max))
    }

    fn pdf_area(&self, position: Vec3, reference: Option<Vec3>) -> f32 {
        match reference.and_then(|p| Sphere::cone_cos_max(p).map(|cos_max| (p, cos_max))) {
            Some((reference, cos_max)) => Sphere::cone_area_pdf(position, reference, cos_max),
            None => warp::uniform_sphere_pdf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn hit(ray: &Ray) -> Option<Intersection<'static>> {
        let mut its = Intersection::new(-ray.direction, f32::INFINITY);
        Sphere.intersect(ray, &mut its).then_some(its)
    }

    #[test]
    fn test_hit_from_outside() {
        let its = hit(&Ray::new(Vec3::new(0.0, 0.0, 5.0), -Vec3::Z)).unwrap();
        assert!((its.t - 4.0).abs() < 1e-5);
        assert!((its.surf.position - Vec3::Z).length() < 1e-5);
        assert!((its.surf.frame.normal - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_hit_from_inside_takes_far_root() {
        let its = hit(&Ray::new(Vec3::ZERO, Vec3::X)).unwrap();
        assert!((its.t - 1.0).abs() < 1e-5);
        assert!((its.surf.pdf - 0.25 * FRAC_1_PI).abs() < 1e-6);
    }

    #[test]
    fn test_miss_and_behind() {
        assert!(hit(&Ray::new(Vec3::new(0.0, 2.0, 5.0), -Vec3::Z)).is_none());
        assert!(hit(&Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::Z)).is_none());
    }

    #[test]
    fn test_respects_previous_best() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), -Vec3::Z);
        let mut its = Intersection::new(Vec3::Z, 3.0);
        assert!(!Sphere.intersect(&ray, &mut its));
        assert_eq!(its.t, 3.0);
    }

    #[test]
    fn test_uv_range() {
        let mut rng = Sampler::new(3);
        for _ in 0..200 {
            let s = Sphere.sample_area(&mut rng, None);
            assert!((0.0..=1.0).contains(&s.uv.x));
            assert!((0.0..=1.0).contains(&s.uv.y));
            assert!((s.position.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_cone_samples_visible_and_pdf_matches_intersection() {
        let mut rng = Sampler::new(11);
        let reference = Vec3::new(0.5, 3.0, -1.0);
        for _ in 0..200 {
            let s = Sphere.sample_area(&mut rng, Some(reference));
            // Visible from the reference point
            assert!(s.geometry_normal.dot(reference - s.position) >= -1e-4);

            let dir = (s.position - reference).normalize();
            let mut its = Intersection::new(-dir, f32::INFINITY);
            assert!(Sphere.intersect(&Ray::new(reference, dir), &mut its));
            assert!((its.surf.pdf - s.pdf).abs() < 1e-2 * s.pdf);
        }
    }

    #[test]
    fn test_pdf_area_matches_sampling() {
        let mut rng = Sampler::new(4);
        let reference = Vec3::new(-2.0, 0.5, 1.5);
        for _ in 0..100 {
            let s = Sphere.sample_area(&mut rng, Some(reference));
            assert!((Sphere.pdf_area(s.position, Some(reference)) - s.pdf).abs() < 1e-4 * s.pdf);
        }
        // Inside the sphere sampling falls back to uniform area
        assert_eq!(Sphere.pdf_area(Vec3::X, Some(Vec3::ZERO)), 0.25 * FRAC_1_PI);
        assert_eq!(Sphere.pdf_area(Vec3::X, None), 0.25 * FRAC_1_PI);
    }

    #[test]
    fn test_cone_pdf_integrates_over_visible_cap() {
        // Estimate the solid angle of the sphere seen from d = 3 using the
        // sampled area density: E[1 / pdf_area * (cos / r^2)] = solid angle
        let mut rng = Sampler::new(5);
        let reference = Vec3::new(0.0, 0.0, 3.0);
        let n = 2000;
        let mut sum = 0.0;
        for _ in 0..n {
            let s = Sphere.sample_area(&mut rng, Some(reference));
            let to = reference - s.position;
            let cos = s.geometry_normal.dot(to.normalize());
            sum += cos / to.length_squared() / s.pdf;
        }
        let cos_max = (1.0f32 - 1.0 / 9.0).sqrt();
        let expected = 2.0 * PI * (1.0 - cos_max);
        assert!((sum / n as f32 - expected).abs() < 1e-3);
    }
}
