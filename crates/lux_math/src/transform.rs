// Affine transforms for instancing.
//
// glam::Mat4 already provides transform_point3(), transform_vector3() and inverse().

use crate::{Aabb, Ray};
use glam::{Mat3, Mat4, Quat, Vec3};

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners; unbounded stays unbounded.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;
}

impl Mat4Ext for Mat4 {
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() || aabb.is_unbounded() {
            return *aabb;
        }

        let corners = aabb.corners();
        let first = self.transform_point3(corners[0]);
        let (lo, hi) = corners[1..]
            .iter()
            .map(|&corner| self.transform_point3(corner))
            .fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));

        Aabb::from_points(lo, hi)
    }
}

/// An invertible affine transform with its inverse cached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    matrix: Mat4,
    inverse: Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        matrix: Mat4::IDENTITY,
        inverse: Mat4::IDENTITY,
    };

    /// Wraps a matrix. Returns `None` when the matrix is singular.
    pub fn from_matrix(matrix: Mat4) -> Option<Self> {
        let det = matrix.determinant();
        if det.abs() < 1e-12 || !det.is_finite() {
            return None;
        }
        Some(Self {
            matrix,
            inverse: matrix.inverse(),
        })
    }

    pub fn from_translation(t: Vec3) -> Self {
        Self {
            matrix: Mat4::from_translation(t),
            inverse: Mat4::from_translation(-t),
        }
    }

    pub fn from_rotation(q: Quat) -> Self {
        Self {
            matrix: Mat4::from_quat(q),
            inverse: Mat4::from_quat(q.inverse()),
        }
    }

    /// Scale by non-zero factors (zero components are replaced by 1).
    pub fn from_scale(s: Vec3) -> Self {
        let s = Vec3::select(s.cmpeq(Vec3::ZERO), Vec3::ONE, s);
        Self {
            matrix: Mat4::from_scale(s),
            inverse: Mat4::from_scale(s.recip()),
        }
    }

    /// Scale, then rotate, then translate.
    pub fn from_scale_rotation_translation(scale: Vec3, rotation: Quat, translation: Vec3) -> Self {
        Self::from_translation(translation)
            .then_local(&Self::from_rotation(rotation))
            .then_local(&Self::from_scale(scale))
    }

    /// `self * other`: applies `other` first, then `self`.
    pub fn then_local(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
            inverse: other.inverse * self.inverse,
        }
    }

    pub fn matrix(&self) -> &Mat4 {
        &self.matrix
    }

    pub fn inverse_matrix(&self) -> &Mat4 {
        &self.inverse
    }

    pub fn apply_point(&self, p: Vec3) -> Vec3 {
        self.matrix.transform_point3(p)
    }

    pub fn apply_vector(&self, v: Vec3) -> Vec3 {
        self.matrix.transform_vector3(v)
    }

    /// Transforms a normal by the inverse transpose. The result is not normalized.
    pub fn apply_normal(&self, n: Vec3) -> Vec3 {
        Mat3::from_mat4(self.inverse).transpose() * n
    }

    /// World normal back to local space. The result is not normalized.
    pub fn inverse_normal(&self, n: Vec3) -> Vec3 {
        Mat3::from_mat4(self.matrix).transpose() * n
    }

    /// Ratio of world to local area for a surface element with local normal `n`.
    pub fn area_scale(&self, n: Vec3) -> f32 {
        self.matrix.determinant().abs() * self.apply_normal(n).length() / n.length()
    }

    pub fn inverse_point(&self, p: Vec3) -> Vec3 {
        self.inverse.transform_point3(p)
    }

    pub fn inverse_vector(&self, v: Vec3) -> Vec3 {
        self.inverse.transform_vector3(v)
    }

    /// World ray to local space. The direction keeps its scaled length.
    pub fn inverse_ray(&self, ray: &Ray) -> Ray {
        Ray::new(self.inverse_point(ray.origin), self.inverse_vector(ray.direction))
    }

    pub fn apply_aabb(&self, aabb: &Aabb) -> Aabb {
        self.matrix.transform_aabb(aabb)
    }
}
