//! Math primitives shared by the Lux renderer crates.

// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod color;
mod distribution;
mod frame;
mod interval;
mod ray;
mod transform;
pub mod warp;

pub use aabb::Aabb;
pub use color::{Color, ColorExt};
pub use distribution::{Distribution1D, Distribution2D};
pub use frame::Frame;
pub use interval::Interval;
pub use ray::Ray;
pub use transform::{Mat4Ext, Transform};

/// Minimum ray distance accepted as a hit; also used as a generic numeric guard.
pub const EPSILON: f32 = 1e-4;

/// Square root that clamps negative inputs (from rounding) to zero.
#[inline]
pub fn safe_sqrt(x: f32) -> f32 {
    x.max(0.0).sqrt()
}

/// Arc cosine that clamps its argument to [-1, 1].
#[inline]
pub fn safe_acos(x: f32) -> f32 {
    x.clamp(-1.0, 1.0).acos()
}

/// Arc sine that clamps its argument to [-1, 1].
#[inline]
pub fn safe_asin(x: f32) -> f32 {
    x.clamp(-1.0, 1.0).asin()
}

#[inline]
pub fn sqr(x: f32) -> f32 {
    x * x
}
