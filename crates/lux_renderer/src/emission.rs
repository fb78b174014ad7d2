//! Surface emission profiles.

use crate::Texture;
use lux_math::{Color, Frame, Vec2, Vec3};
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct EmissionEval {
    pub value: Color,
    /// Solid-angle density of sampling the emitting direction, when the
    /// emitter is itself a sampleable light (environment maps). Zero otherwise.
    pub pdf: f32,
}

impl EmissionEval {
    pub fn invalid() -> Self {
        Self {
            value: Color::ZERO,
            pdf: 0.0,
        }
    }
}

/// Radiance leaving a surface point.
pub trait Emission: Send + Sync {
    /// Radiance towards `wo`, given in the local shading frame.
    fn evaluate(&self, uv: Vec2, wo: Vec3) -> EmissionEval;
}

/// Uniform radiance on the front side of a surface.
pub struct LambertianEmission {
    emission: Arc<dyn Texture>,
}

impl LambertianEmission {
    pub fn new(emission: Arc<dyn Texture>) -> Self {
        Self { emission }
    }
}

impl Emission for LambertianEmission {
    fn evaluate(&self, uv: Vec2, wo: Vec3) -> EmissionEval {
        if Frame::cos_theta(wo) <= 0.0 {
            return EmissionEval::invalid();
        }
        EmissionEval {
            value: self.emission.evaluate(uv),
            pdf: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConstantTexture;

    #[test]
    fn test_one_sided() {
        let emission = LambertianEmission::new(Arc::new(ConstantTexture::new(Color::new(1.0, 2.0, 3.0))));
        let front = emission.evaluate(Vec2::ZERO, Vec3::new(0.3, 0.0, 0.5));
        assert_eq!(front.value, Color::new(1.0, 2.0, 3.0));
        let back = emission.evaluate(Vec2::ZERO, Vec3::new(0.3, 0.0, -0.5));
        assert_eq!(back.value, Color::ZERO);
    }
}
