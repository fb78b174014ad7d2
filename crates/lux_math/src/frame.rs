use crate::Vec3;

/// Orthonormal shading frame. Local coordinates have the normal along `+z`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub tangent: Vec3,
    pub bitangent: Vec3,
    pub normal: Vec3,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            tangent: Vec3::X,
            bitangent: Vec3::Y,
            normal: Vec3::Z,
        }
    }
}

impl Frame {
    /// Builds a frame around a unit normal (Duff et al. 2017, branchless).
    pub fn from_normal(normal: Vec3) -> Self {
        let sign = 1.0f32.copysign(normal.z);
        let a = -1.0 / (sign + normal.z);
        let b = normal.x * normal.y * a;
        let tangent = Vec3::new(1.0 + sign * normal.x * normal.x * a, sign * b, -sign * normal.x);
        let bitangent = Vec3::new(b, sign + normal.y * normal.y * a, -normal.y);
        Self {
            tangent,
            bitangent,
            normal,
        }
    }

    /// Gram-Schmidt: keeps `normal`, projects `tangent` into its plane.
    /// Falls back to an arbitrary tangent when the two are parallel.
    pub fn from_normal_tangent(normal: Vec3, tangent: Vec3) -> Self {
        let normal = normal.normalize();
        let projected = tangent - normal * normal.dot(tangent);
        let len = projected.length();
        if !(len > 1e-6) {
            return Self::from_normal(normal);
        }
        let tangent = projected / len;
        Self {
            tangent,
            bitangent: normal.cross(tangent),
            normal,
        }
    }

    #[inline]
    pub fn to_local(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.dot(self.tangent), v.dot(self.bitangent), v.dot(self.normal))
    }

    #[inline]
    pub fn to_world(&self, v: Vec3) -> Vec3 {
        self.tangent * v.x + self.bitangent * v.y + self.normal * v.z
    }

    #[inline]
    pub fn cos_theta(w: Vec3) -> f32 {
        w.z
    }

    #[inline]
    pub fn abs_cos_theta(w: Vec3) -> f32 {
        w.z.abs()
    }

    #[inline]
    pub fn cos2_theta(w: Vec3) -> f32 {
        w.z * w.z
    }

    #[inline]
    pub fn sin2_theta(w: Vec3) -> f32 {
        (1.0 - Self::cos2_theta(w)).max(0.0)
    }

    #[inline]
    pub fn tan2_theta(w: Vec3) -> f32 {
        Self::sin2_theta(w) / Self::cos2_theta(w)
    }

    #[inline]
    pub fn same_hemisphere(a: Vec3, b: Vec3) -> bool {
        a.z * b.z > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_orthonormal(f: &Frame) {
        assert!((f.tangent.length() - 1.0).abs() < 1e-4);
        assert!((f.bitangent.length() - 1.0).abs() < 1e-4);
        assert!((f.normal.length() - 1.0).abs() < 1e-4);
        assert!(f.tangent.dot(f.bitangent).abs() < 1e-4);
        assert!(f.tangent.dot(f.normal).abs() < 1e-4);
        assert!(f.bitangent.dot(f.normal).abs() < 1e-4);
    }

    #[test]
    fn test_from_normal_is_orthonormal() {
        for n in [
            Vec3::Z,
            -Vec3::Z,
            Vec3::X,
            Vec3::new(0.3, -0.4, 0.8).normalize(),
            Vec3::new(-1e-8, 0.0, -1.0).normalize(),
        ] {
            assert_orthonormal(&Frame::from_normal(n));
        }
    }

    #[test]
    fn test_local_world_round_trip() {
        let frame = Frame::from_normal(Vec3::new(1.0, 2.0, 3.0).normalize());
        let v = Vec3::new(0.2, -0.7, 0.4);
        let back = frame.to_world(frame.to_local(v));
        assert!((back - v).length() < 1e-5);
        assert!((frame.to_local(frame.normal) - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_gram_schmidt() {
        let frame = Frame::from_normal_tangent(Vec3::Y, Vec3::new(1.0, 0.5, 0.0));
        assert_orthonormal(&frame);
        assert!((frame.tangent - Vec3::X).length() < 1e-5);

        // Parallel tangent falls back to an arbitrary basis
        assert_orthonormal(&Frame::from_normal_tangent(Vec3::Y, Vec3::Y));
    }
}
