//! The geometry interface implemented by spheres and triangle meshes.

use crate::{Intersection, Sampler};
use lux_math::{Aabb, Frame, Ray, Vec2, Vec3};

/// Local geometry at a point on a surface.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceEvent {
    pub position: Vec3,
    pub uv: Vec2,
    /// Orthonormal shading frame; may be perturbed by interpolation or normal maps.
    pub frame: Frame,
    pub geometry_normal: Vec3,
    /// Area density with which this point would be chosen by `sample_area`.
    pub pdf: f32,
}

impl Default for SurfaceEvent {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            uv: Vec2::ZERO,
            frame: Frame::default(),
            geometry_normal: Vec3::Z,
            pdf: 0.0,
        }
    }
}

/// A point sampled on a surface, with its area density in `pdf`.
pub type AreaSample = SurfaceEvent;

/// A surface in its own local space.
pub trait Shape: Send + Sync {
    /// Intersects a local ray with unit-length direction.
    ///
    /// Only hits with `EPSILON <= t < its.t` are accepted; on success the
    /// shape updates `its.t` and `its.surf` and returns true, otherwise it
    /// leaves `its` untouched.
    fn intersect(&self, ray: &Ray, its: &mut Intersection<'_>) -> bool;

    fn bounding_box(&self) -> Aabb;

    fn centroid(&self) -> Vec3;

    /// Samples a point on the surface. Shapes may use `reference` (the point
    /// being lit) to concentrate samples on the visible part.
    fn sample_area(&self, rng: &mut Sampler, reference: Option<Vec3>) -> AreaSample;

    /// Area density with which `sample_area(_, reference)` produces the
    /// surface point `position`.
    fn pdf_area(&self, position: Vec3, reference: Option<Vec3>) -> f32;
}
