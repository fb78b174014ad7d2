//! Principled BSDF: a diffuse base layer mixed with a GGX metallic lobe.
//!
//! A simplified take on the Disney model. Only the base color, roughness,
//! metallic and specular parameters are supported.

use crate::microfacet::{conductor_evaluate, conductor_sample, roughness_to_alpha};
use crate::material::schlick;
use crate::{Bsdf, BsdfEval, BsdfSample, ConstantTexture, Sampler, Texture};
use lux_math::{Color, ColorExt, Frame, Vec2, Vec3};
use std::f32::consts::FRAC_1_PI;
use std::sync::Arc;

pub struct Principled {
    base_color: Arc<dyn Texture>,
    roughness: Arc<dyn Texture>,
    metallic: Arc<dyn Texture>,
    specular: Arc<dyn Texture>,
}

/// Per-lookup lobe weights.
struct Lobes {
    diffuse_probability: f32,
    diffuse: Color,
    metallic: Color,
    alpha: f32,
}

impl Principled {
    /// Dielectric-looking default: grey base, medium roughness, no metal.
    pub fn new(base_color: Arc<dyn Texture>) -> Self {
        Self {
            base_color,
            roughness: Arc::new(ConstantTexture::scalar_value(0.5)),
            metallic: Arc::new(ConstantTexture::scalar_value(0.0)),
            specular: Arc::new(ConstantTexture::scalar_value(0.5)),
        }
    }

    pub fn with_roughness(mut self, roughness: Arc<dyn Texture>) -> Self {
        self.roughness = roughness;
        self
    }

    pub fn with_metallic(mut self, metallic: Arc<dyn Texture>) -> Self {
        self.metallic = metallic;
        self
    }

    pub fn with_specular(mut self, specular: Arc<dyn Texture>) -> Self {
        self.specular = specular;
        self
    }

    fn lobes(&self, uv: Vec2, wo: Vec3) -> Lobes {
        let base = self.base_color.evaluate(uv);
        let metallic = self.metallic.scalar(uv);
        let specular = self.specular.scalar(uv);
        let f = specular * schlick((1.0 - metallic) * 0.08, Frame::cos_theta(wo));

        let diffuse = (1.0 - f) * (1.0 - metallic) * base;
        let metallic_color = Color::splat(f) + (1.0 - f) * metallic * base;

        let total = diffuse.mean() + metallic_color.mean();
        Lobes {
            diffuse_probability: if total > 0.0 { diffuse.mean() / total } else { 1.0 },
            diffuse,
            metallic: metallic_color,
            alpha: roughness_to_alpha(self.roughness.scalar(uv)),
        }
    }
}

impl Bsdf for Principled {
    fn evaluate(&self, uv: Vec2, wo: Vec3, wi: Vec3) -> BsdfEval {
        if !Frame::same_hemisphere(wo, wi) {
            return BsdfEval::invalid();
        }
        // Work in the hemisphere of wo
        let (wo, wi) = if wo.z < 0.0 { (-wo, -wi) } else { (wo, wi) };
        let lobes = self.lobes(uv, wo);

        let cos_i = Frame::abs_cos_theta(wi);
        let diffuse_value = lobes.diffuse * FRAC_1_PI * cos_i;
        let diffuse_pdf = cos_i * FRAC_1_PI;
        let metal = conductor_evaluate(lobes.metallic, lobes.alpha, wo, wi);

        let p = lobes.diffuse_probability;
        BsdfEval {
            value: diffuse_value + metal.value,
            pdf: p * diffuse_pdf + (1.0 - p) * metal.pdf,
        }
    }

    fn sample(&self, uv: Vec2, wo: Vec3, rng: &mut Sampler) -> Option<BsdfSample> {
        let flipped = wo.z < 0.0;
        let wo = if flipped { -wo } else { wo };
        let lobes = self.lobes(uv, wo);
        let p = lobes.diffuse_probability;

        let (wi, weight) = if rng.next_1d() < p {
            let wi = lux_math::warp::square_to_cosine_hemisphere(rng.next_2d());
            (wi, lobes.diffuse / p)
        } else {
            let s = conductor_sample(lobes.metallic, lobes.alpha, wo, rng.next_2d())?;
            (s.wi, s.weight / (1.0 - p))
        };

        let cos_i = Frame::cos_theta(wi);
        if cos_i <= 0.0 {
            return None;
        }
        let metal_pdf = conductor_evaluate(lobes.metallic, lobes.alpha, wo, wi).pdf;
        let pdf = p * cos_i * FRAC_1_PI + (1.0 - p) * metal_pdf;

        Some(BsdfSample {
            wi: if flipped { -wi } else { wi },
            weight,
            pdf,
        })
    }

    fn albedo(&self, uv: Vec2) -> Color {
        let lobes = self.lobes(uv, Vec3::Z);
        lobes.diffuse + lobes.metallic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(v: f32) -> Arc<dyn Texture> {
        Arc::new(ConstantTexture::scalar_value(v))
    }

    #[test]
    fn test_pure_diffuse_when_no_specular() {
        let bsdf = Principled::new(constant(0.8)).with_specular(constant(0.0));
        let wo = Vec3::new(0.2, 0.3, 0.9).normalize();
        let wi = Vec3::new(-0.4, 0.1, 0.8).normalize();
        let eval = bsdf.evaluate(Vec2::ZERO, wo, wi);
        let expected = 0.8 * FRAC_1_PI * wi.z;
        assert!((eval.value.x - expected).abs() < 1e-5);
        assert!((eval.pdf - wi.z * FRAC_1_PI).abs() < 1e-5);
    }

    #[test]
    fn test_full_metal_has_no_diffuse() {
        let bsdf = Principled::new(constant(0.9))
            .with_metallic(constant(1.0))
            .with_roughness(constant(0.3));
        let lobes = bsdf.lobes(Vec2::ZERO, Vec3::Z);
        assert_eq!(lobes.diffuse, Color::ZERO);
        assert_eq!(lobes.diffuse_probability, 0.0);
    }

    #[test]
    fn test_sample_pdf_is_mixture_pdf() {
        let bsdf = Principled::new(constant(0.6))
            .with_metallic(constant(0.3))
            .with_roughness(constant(0.4));
        let mut rng = Sampler::new(17);
        let wo = Vec3::new(0.3, -0.2, 0.7).normalize();
        for _ in 0..300 {
            let Some(s) = bsdf.sample(Vec2::ZERO, wo, &mut rng) else {
                continue;
            };
            let eval = bsdf.evaluate(Vec2::ZERO, wo, s.wi);
            assert!((eval.pdf - s.pdf).abs() <= 1e-3 * s.pdf.max(1.0));
            assert!(s.weight.min_element() >= 0.0);
        }
    }

    #[test]
    fn test_albedo_bounded() {
        let bsdf = Principled::new(constant(1.0)).with_specular(constant(1.0));
        let albedo = bsdf.albedo(Vec2::ZERO);
        assert!(albedo.max_element() <= 1.0 + 1e-5);
    }
}
