//! GGX microfacet distribution and the rough surface models built on it.

use crate::material::{fresnel_dielectric, reflect, refract};
use crate::{Bsdf, BsdfEval, BsdfSample, Sampler, Texture};
use lux_math::{sqr, Color, Frame, Vec2, Vec3};
use std::f32::consts::PI;
use std::sync::Arc;

/// Maps perceptual roughness to the GGX width, clamped away from zero.
#[inline]
pub fn roughness_to_alpha(roughness: f32) -> f32 {
    sqr(roughness).max(1e-3)
}

/// Isotropic GGX normal distribution `D(wm)`.
pub fn ggx_d(wm: Vec3, alpha: f32) -> f32 {
    let cos2 = Frame::cos2_theta(wm);
    if cos2 <= 0.0 {
        return 0.0;
    }
    let tan2 = Frame::tan2_theta(wm);
    if !tan2.is_finite() {
        return 0.0;
    }
    let alpha2 = alpha * alpha;
    let e = 1.0 + tan2 / alpha2;
    1.0 / (PI * alpha2 * cos2 * cos2 * e * e)
}

/// Smith masking for direction `w` against microfacet normal `wm`.
///
/// Zero when `w` sees the back of the microfacet.
pub fn smith_g1(w: Vec3, wm: Vec3, alpha: f32) -> f32 {
    if w.dot(wm) * Frame::cos_theta(w) <= 0.0 {
        return 0.0;
    }
    let tan2 = Frame::tan2_theta(w);
    if !tan2.is_finite() {
        return 0.0;
    }
    2.0 / (1.0 + (1.0 + alpha * alpha * tan2).sqrt())
}

/// Samples a visible normal for `wo` (Heitz 2018). The result always lies
/// in the upper hemisphere.
pub fn sample_vndf(wo: Vec3, alpha: f32, sample: Vec2) -> Vec3 {
    let wo = if wo.z < 0.0 { -wo } else { wo };

    // Stretch to the hemisphere configuration
    let wh = Vec3::new(alpha * wo.x, alpha * wo.y, wo.z).normalize();
    let len2 = wh.x * wh.x + wh.y * wh.y;
    let t1 = if len2 > 0.0 {
        Vec3::new(-wh.y, wh.x, 0.0) / len2.sqrt()
    } else {
        Vec3::X
    };
    let t2 = wh.cross(t1);

    let r = sample.x.sqrt();
    let phi = 2.0 * PI * sample.y;
    let p1 = r * phi.cos();
    let s = 0.5 * (1.0 + wh.z);
    let p2 = (1.0 - s) * (1.0 - p1 * p1).max(0.0).sqrt() + s * r * phi.sin();

    let nh = t1 * p1 + t2 * p2 + wh * (1.0 - p1 * p1 - p2 * p2).max(0.0).sqrt();
    Vec3::new(alpha * nh.x, alpha * nh.y, nh.z.max(1e-6)).normalize()
}

/// Density of [`sample_vndf`] over microfacet normals.
pub fn vndf_pdf(wo: Vec3, wm: Vec3, alpha: f32) -> f32 {
    let cos_o = Frame::abs_cos_theta(wo);
    if cos_o == 0.0 {
        return 0.0;
    }
    smith_g1(wo, wm, alpha) * wo.dot(wm).abs() * ggx_d(wm, alpha) / cos_o
}

// =============================================================================
// Rough conductor
// =============================================================================

pub struct RoughConductor {
    reflectance: Arc<dyn Texture>,
    roughness: Arc<dyn Texture>,
}

impl RoughConductor {
    pub fn new(reflectance: Arc<dyn Texture>, roughness: Arc<dyn Texture>) -> Self {
        Self {
            reflectance,
            roughness,
        }
    }
}

/// Cook-Torrance reflection without Fresnel, shared with the principled
/// metallic lobe. `wo` and `wi` must be in the upper hemisphere.
pub(crate) fn conductor_evaluate(reflectance: Color, alpha: f32, wo: Vec3, wi: Vec3) -> BsdfEval {
    let cos_o = Frame::cos_theta(wo);
    if cos_o <= 0.0 || Frame::cos_theta(wi) <= 0.0 {
        return BsdfEval::invalid();
    }
    let wm = (wi + wo).normalize_or_zero();
    if wm == Vec3::ZERO {
        return BsdfEval::invalid();
    }

    let d = ggx_d(wm, alpha);
    let g = smith_g1(wi, wm, alpha) * smith_g1(wo, wm, alpha);
    BsdfEval {
        value: reflectance * (d * g / (4.0 * cos_o)),
        pdf: vndf_pdf(wo, wm, alpha) / (4.0 * wo.dot(wm).abs()),
    }
}

pub(crate) fn conductor_sample(reflectance: Color, alpha: f32, wo: Vec3, sample: Vec2) -> Option<BsdfSample> {
    let wm = sample_vndf(wo, alpha, sample);
    let wi = reflect(wo, wm);
    if Frame::cos_theta(wi) <= 0.0 {
        return None;
    }
    let pdf = vndf_pdf(wo, wm, alpha) / (4.0 * wo.dot(wm).abs());
    if !(pdf > 0.0) {
        return None;
    }
    Some(BsdfSample {
        wi,
        weight: reflectance * smith_g1(wi, wm, alpha),
        pdf,
    })
}

/// Mirrors a direction pair into the upper hemisphere.
fn flip_to_upper(wo: Vec3) -> (Vec3, bool) {
    if wo.z < 0.0 {
        (-wo, true)
    } else {
        (wo, false)
    }
}

impl Bsdf for RoughConductor {
    fn evaluate(&self, uv: Vec2, wo: Vec3, wi: Vec3) -> BsdfEval {
        let alpha = roughness_to_alpha(self.roughness.scalar(uv));
        let (wo, flipped) = flip_to_upper(wo);
        let wi = if flipped { -wi } else { wi };
        conductor_evaluate(self.reflectance.evaluate(uv), alpha, wo, wi)
    }

    fn sample(&self, uv: Vec2, wo: Vec3, rng: &mut Sampler) -> Option<BsdfSample> {
        let alpha = roughness_to_alpha(self.roughness.scalar(uv));
        let (wo, flipped) = flip_to_upper(wo);
        let sample = conductor_sample(self.reflectance.evaluate(uv), alpha, wo, rng.next_2d())?;
        Some(BsdfSample {
            wi: if flipped { -sample.wi } else { sample.wi },
            ..sample
        })
    }

    fn albedo(&self, uv: Vec2) -> Color {
        self.reflectance.evaluate(uv)
    }
}

// =============================================================================
// Rough dielectric
// =============================================================================

/// Rough glass (Walter et al. 2007) with stochastic lobe selection by Fresnel.
pub struct RoughDielectric {
    ior: Arc<dyn Texture>,
    reflectance: Arc<dyn Texture>,
    transmittance: Arc<dyn Texture>,
    roughness: Arc<dyn Texture>,
}

impl RoughDielectric {
    pub fn new(
        ior: Arc<dyn Texture>,
        reflectance: Arc<dyn Texture>,
        transmittance: Arc<dyn Texture>,
        roughness: Arc<dyn Texture>,
    ) -> Self {
        Self {
            ior,
            reflectance,
            transmittance,
            roughness,
        }
    }
}

impl Bsdf for RoughDielectric {
    fn evaluate(&self, uv: Vec2, wo: Vec3, wi: Vec3) -> BsdfEval {
        let alpha = roughness_to_alpha(self.roughness.scalar(uv));
        let eta = self.ior.scalar(uv);

        let cos_o = Frame::cos_theta(wo);
        let cos_i = Frame::cos_theta(wi);
        if cos_o == 0.0 || cos_i == 0.0 {
            return BsdfEval::invalid();
        }
        let is_reflection = cos_o * cos_i > 0.0;
        let etap = match (is_reflection, cos_o > 0.0) {
            (true, _) => 1.0,
            (false, true) => eta,
            (false, false) => 1.0 / eta,
        };

        let wm = (wi * etap + wo).normalize_or_zero();
        if wm == Vec3::ZERO {
            return BsdfEval::invalid();
        }
        let wm = if wm.z < 0.0 { -wm } else { wm };

        // Discard microfacets seen from behind
        if wm.dot(wi) * cos_i < 0.0 || wm.dot(wo) * cos_o < 0.0 {
            return BsdfEval::invalid();
        }

        let f = fresnel_dielectric(wo.dot(wm), eta);
        let d = ggx_d(wm, alpha);
        let g = smith_g1(wi, wm, alpha) * smith_g1(wo, wm, alpha);
        let pdf_wm = vndf_pdf(wo, wm, alpha);

        if is_reflection {
            let value = d * g * f / (4.0 * cos_o.abs());
            return BsdfEval {
                value: self.reflectance.evaluate(uv) * value,
                pdf: pdf_wm / (4.0 * wo.dot(wm).abs()) * f,
            };
        }

        let denom = sqr(wi.dot(wm) + wo.dot(wm) / etap);
        if denom == 0.0 {
            return BsdfEval::invalid();
        }
        let dwm_dwi = wi.dot(wm).abs() / denom;
        let value = d * g * (1.0 - f) * wo.dot(wm).abs() * dwm_dwi / (cos_o.abs() * etap * etap);
        BsdfEval {
            value: self.transmittance.evaluate(uv) * value,
            pdf: pdf_wm * dwm_dwi * (1.0 - f),
        }
    }

    fn sample(&self, uv: Vec2, wo: Vec3, rng: &mut Sampler) -> Option<BsdfSample> {
        let alpha = roughness_to_alpha(self.roughness.scalar(uv));
        let eta = self.ior.scalar(uv);

        let wm = sample_vndf(wo, alpha, rng.next_2d());
        let pdf_wm = vndf_pdf(wo, wm, alpha);
        let f = fresnel_dielectric(wo.dot(wm), eta);

        if rng.next_1d() < f {
            let wi = reflect(wo, wm);
            if !Frame::same_hemisphere(wo, wi) {
                return None;
            }
            let pdf = pdf_wm / (4.0 * wo.dot(wm).abs()) * f;
            if !(pdf > 0.0) {
                return None;
            }
            return Some(BsdfSample {
                wi,
                weight: self.reflectance.evaluate(uv) * smith_g1(wi, wm, alpha),
                pdf,
            });
        }

        let (wi, etap) = refract(wo, wm, eta)?;
        if Frame::same_hemisphere(wo, wi) || wi.z == 0.0 {
            return None;
        }
        let denom = sqr(wi.dot(wm) + wo.dot(wm) / etap);
        let pdf = pdf_wm * wi.dot(wm).abs() / denom * (1.0 - f);
        if !(pdf > 0.0) || !pdf.is_finite() {
            return None;
        }
        Some(BsdfSample {
            wi,
            weight: self.transmittance.evaluate(uv) * smith_g1(wi, wm, alpha) / (etap * etap),
            pdf,
        })
    }

    fn albedo(&self, uv: Vec2) -> Color {
        let f = fresnel_dielectric(1.0, self.ior.scalar(uv));
        self.reflectance.evaluate(uv) * f + self.transmittance.evaluate(uv) * (1.0 - f)
    }
}
