use crate::Vec3;

/// Linear RGB color.
pub type Color = Vec3;

/// Radiometric helpers on [`Color`].
pub trait ColorExt {
    fn mean(&self) -> f32;
    /// Rec. 709 luminance.
    fn luminance(&self) -> f32;
    fn is_black(&self) -> bool;
}

impl ColorExt for Color {
    #[inline]
    fn mean(&self) -> f32 {
        (self.x + self.y + self.z) / 3.0
    }

    #[inline]
    fn luminance(&self) -> f32 {
        0.2126 * self.x + 0.7152 * self.y + 0.0722 * self.z
    }

    #[inline]
    fn is_black(&self) -> bool {
        *self == Vec3::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luminance_of_white_is_one() {
        assert!((Color::ONE.luminance() - 1.0).abs() < 1e-6);
        assert!((Color::new(0.0, 3.0, 0.0).mean() - 1.0).abs() < 1e-6);
        assert!(Color::ZERO.is_black());
        assert!(!Color::X.is_black());
    }
}
