use crate::Vec2;

/// Piecewise-constant density over `[0, 1)` built from non-negative weights.
///
/// Also serves as a discrete distribution over the weight indices.
#[derive(Debug, Clone)]
pub struct Distribution1D {
    func: Vec<f32>,
    cdf: Vec<f32>,
    integral: f32,
}

impl Distribution1D {
    /// Builds the distribution. Negative or non-finite weights count as zero;
    /// an all-zero function degrades to uniform sampling.
    pub fn new(weights: &[f32]) -> Self {
        let func: Vec<f32> = weights
            .iter()
            .map(|&w| if w.is_finite() && w > 0.0 { w } else { 0.0 })
            .collect();
        let n = func.len().max(1);

        let mut cdf = Vec::with_capacity(n + 1);
        cdf.push(0.0);
        let mut running = 0.0f64;
        for &f in &func {
            running += f as f64 / n as f64;
            cdf.push(running as f32);
        }

        let integral = running as f32;
        if integral > 0.0 {
            for v in cdf.iter_mut().skip(1) {
                *v /= integral;
            }
        } else {
            for (i, v) in cdf.iter_mut().enumerate().skip(1) {
                *v = i as f32 / n as f32;
            }
        }
        // Guard the last entry against accumulated rounding
        if let Some(last) = cdf.last_mut() {
            *last = 1.0;
        }

        Self {
            func,
            cdf,
            integral,
        }
    }

    pub fn count(&self) -> usize {
        self.func.len()
    }

    /// Integral of the piecewise function over `[0, 1)`.
    pub fn integral(&self) -> f32 {
        self.integral
    }

    fn find_segment(&self, u: f32) -> usize {
        // Last index with cdf[i] <= u, clamped to a valid segment
        let idx = self.cdf.partition_point(|&c| c <= u);
        idx.saturating_sub(1).min(self.count().saturating_sub(1))
    }

    /// Returns `(x, pdf, segment)` with `x` in `[0, 1)` distributed like the function.
    pub fn sample_continuous(&self, u: f32) -> (f32, f32, usize) {
        let offset = self.find_segment(u);
        let (lo, hi) = (self.cdf[offset], self.cdf[offset + 1]);
        let mut du = u - lo;
        if hi - lo > 0.0 {
            du /= hi - lo;
        }
        let x = ((offset as f32 + du.clamp(0.0, 1.0)) / self.count().max(1) as f32).min(1.0 - f32::EPSILON);
        (x, self.pdf_segment(offset), offset)
    }

    /// Picks an index with probability proportional to its weight.
    /// Returns `(index, probability, remapped_u)`.
    pub fn sample_discrete(&self, u: f32) -> (usize, f32, f32) {
        let offset = self.find_segment(u);
        let (lo, hi) = (self.cdf[offset], self.cdf[offset + 1]);
        let remapped = if hi > lo { ((u - lo) / (hi - lo)).clamp(0.0, 1.0) } else { 0.0 };
        (offset, self.discrete_pdf(offset), remapped)
    }

    /// Probability of picking `index` in [`Distribution1D::sample_discrete`].
    pub fn discrete_pdf(&self, index: usize) -> f32 {
        self.cdf[index + 1] - self.cdf[index]
    }

    /// Continuous density of segment `index`.
    fn pdf_segment(&self, index: usize) -> f32 {
        if self.integral > 0.0 {
            self.func[index] / self.integral
        } else {
            1.0
        }
    }

    /// Continuous density at `x` in `[0, 1)`.
    pub fn pdf(&self, x: f32) -> f32 {
        if self.func.is_empty() {
            return 0.0;
        }
        let index = ((x * self.count() as f32) as usize).min(self.count() - 1);
        self.pdf_segment(index)
    }
}

/// Piecewise-constant density over `[0, 1)^2`, sampled by a marginal over
/// rows (`v`) followed by the conditional of the chosen row (`u`).
#[derive(Debug, Clone)]
pub struct Distribution2D {
    conditional: Vec<Distribution1D>,
    marginal: Distribution1D,
}

impl Distribution2D {
    /// `func` is row-major with `width` columns (`u`) and `height` rows (`v`).
    pub fn new(func: &[f32], width: usize, height: usize) -> Self {
        let conditional: Vec<Distribution1D> = (0..height)
            .map(|row| {
                let start = (row * width).min(func.len());
                let end = ((row + 1) * width).min(func.len());
                Distribution1D::new(&func[start..end])
            })
            .collect();
        let row_integrals: Vec<f32> = conditional.iter().map(|c| c.integral()).collect();
        let marginal = Distribution1D::new(&row_integrals);

        log::debug!(
            "Built {}x{} distribution (integral {:.4})",
            width,
            height,
            marginal.integral()
        );

        Self {
            conditional,
            marginal,
        }
    }

    /// Returns `(uv, pdf)`.
    pub fn sample_continuous(&self, sample: Vec2) -> (Vec2, f32) {
        let (v, pdf_v, row) = self.marginal.sample_continuous(sample.y);
        let Some(conditional) = self.conditional.get(row) else {
            return (Vec2::new(sample.x, v), 0.0);
        };
        let (u, pdf_u, _) = conditional.sample_continuous(sample.x);
        (Vec2::new(u, v), pdf_u * pdf_v)
    }

    pub fn pdf(&self, uv: Vec2) -> f32 {
        if self.conditional.is_empty() {
            return 0.0;
        }
        let rows = self.conditional.len();
        let row = ((uv.y * rows as f32) as usize).min(rows - 1);
        self.marginal.pdf(uv.y) * self.conditional[row].pdf(uv.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_1d_pdf_matches_weights() {
        let dist = Distribution1D::new(&[1.0, 3.0]);
        assert!((dist.integral() - 2.0).abs() < 1e-6);
        assert!((dist.pdf(0.25) - 0.5).abs() < 1e-6);
        assert!((dist.pdf(0.75) - 1.5).abs() < 1e-6);

        // u below the first break lands in segment 0
        let (x, pdf, offset) = dist.sample_continuous(0.125);
        assert_eq!(offset, 0);
        assert!((x - 0.25).abs() < 1e-5);
        assert!((pdf - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_1d_discrete_sampling() {
        let dist = Distribution1D::new(&[0.0, 2.0, 6.0]);
        let (index, prob, remapped) = dist.sample_discrete(0.5);
        assert_eq!(index, 2);
        assert!((prob - 0.75).abs() < 1e-6);
        assert!((remapped - 1.0 / 3.0).abs() < 1e-5);

        // Zero-weight entries are never picked
        for i in 0..100 {
            let (index, _, _) = dist.sample_discrete(i as f32 / 100.0);
            assert_ne!(index, 0);
        }
        let (index, _, _) = dist.sample_discrete(0.999_999);
        assert_eq!(index, 2);
    }

    #[test]
    fn test_1d_all_zero_is_uniform() {
        let dist = Distribution1D::new(&[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(dist.integral(), 0.0);
        let (x, pdf, _) = dist.sample_continuous(0.6);
        assert!((x - 0.6).abs() < 1e-5);
        assert_eq!(pdf, 1.0);
    }

    #[test]
    fn test_2d_sample_pdf_agree() {
        let func = [1.0, 2.0, 3.0, 4.0, 0.0, 6.0];
        let dist = Distribution2D::new(&func, 3, 2);
        for (sx, sy) in [(0.1, 0.2), (0.5, 0.5), (0.9, 0.95), (0.3, 0.7)] {
            let (uv, pdf) = dist.sample_continuous(Vec2::new(sx, sy));
            assert!(uv.x >= 0.0 && uv.x < 1.0 && uv.y >= 0.0 && uv.y < 1.0);
            assert!((dist.pdf(uv) - pdf).abs() < 1e-4 * pdf.max(1.0));
            assert!(pdf > 0.0);
        }
    }

    #[test]
    fn test_2d_pdf_integrates_to_one() {
        let func = [0.5, 2.0, 1.0, 0.0, 3.0, 1.5, 0.2, 0.1, 4.0];
        let dist = Distribution2D::new(&func, 3, 3);
        let n = 60;
        let mut sum = 0.0;
        for j in 0..n {
            for i in 0..n {
                let uv = Vec2::new((i as f32 + 0.5) / n as f32, (j as f32 + 0.5) / n as f32);
                sum += dist.pdf(uv);
            }
        }
        assert!((sum / (n * n) as f32 - 1.0).abs() < 1e-3);
    }
}
