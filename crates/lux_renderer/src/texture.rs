//! Textures evaluated at surface UV coordinates.
//!
//! Image textures are loaded through the `image` crate and stored as linear
//! RGB floats. A [`TextureCache`] shares decoded images between materials.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ColorType;
use lux_math::{Color, ColorExt, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during texture loading.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Failed to load texture {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Texture {0} has zero size")]
    Empty(String),

    #[error("Pixel buffer holds {actual} pixels, expected {width}x{height}")]
    SizeMismatch {
        width: u32,
        height: u32,
        actual: usize,
    },
}

pub type TextureResult<T> = Result<T, TextureError>;

/// Read-only color lookup.
pub trait Texture: Send + Sync {
    fn evaluate(&self, uv: Vec2) -> Color;

    /// Single-channel lookup for roughness/metallic style parameters.
    fn scalar(&self, uv: Vec2) -> f32 {
        self.evaluate(uv).mean()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConstantTexture {
    pub value: Color,
}

impl ConstantTexture {
    pub fn new(value: Color) -> Self {
        Self { value }
    }

    pub fn scalar_value(value: f32) -> Self {
        Self::new(Color::splat(value))
    }
}

impl Texture for ConstantTexture {
    fn evaluate(&self, _uv: Vec2) -> Color {
        self.value
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CheckerboardTexture {
    pub scale: Vec2,
    pub color0: Color,
    pub color1: Color,
}

impl CheckerboardTexture {
    pub fn new(scale: Vec2, color0: Color, color1: Color) -> Self {
        Self {
            scale,
            color0,
            color1,
        }
    }
}

impl Texture for CheckerboardTexture {
    fn evaluate(&self, uv: Vec2) -> Color {
        let cell = (uv * self.scale).floor();
        if (cell.x as i64 + cell.y as i64).rem_euclid(2) == 0 {
            self.color0
        } else {
            self.color1
        }
    }
}

/// How lookups outside `[0, 1]` are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderMode {
    Clamp,
    #[default]
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Nearest,
    #[default]
    Bilinear,
}

/// Decoded image in linear RGB, row-major with row 0 at the top.
#[derive(Debug, Clone)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl Image {
    pub fn new(width: u32, height: u32, pixels: Vec<Color>) -> TextureResult<Self> {
        if pixels.len() != (width as usize) * (height as usize) {
            return Err(TextureError::SizeMismatch {
                width,
                height,
                actual: pixels.len(),
            });
        }
        if pixels.is_empty() {
            return Err(TextureError::Empty("<memory>".to_string()));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Loads an image from disk. 8/16-bit formats are treated as sRGB,
    /// float formats (HDR, EXR) as linear.
    pub fn load(path: &Path) -> TextureResult<Self> {
        let img = image::open(path).map_err(|source| TextureError::Load {
            path: path.display().to_string(),
            source,
        })?;

        let linear = matches!(img.color(), ColorType::Rgb32F | ColorType::Rgba32F);
        let rgb = img.to_rgb32f();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(TextureError::Empty(path.display().to_string()));
        }

        let pixels = rgb
            .pixels()
            .map(|p| {
                let c = Color::new(p[0], p[1], p[2]);
                if linear {
                    c
                } else {
                    Color::new(srgb_to_linear(c.x), srgb_to_linear(c.y), srgb_to_linear(c.z))
                }
            })
            .collect();

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Get total size in bytes (approximate).
    pub fn size_bytes(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<Color>()
    }
}

/// Image lookup with exposure scaling, border handling and filtering.
#[derive(Debug, Clone)]
pub struct ImageTexture {
    image: Arc<Image>,
    exposure: f32,
    border: BorderMode,
    filter: FilterMode,
}

impl ImageTexture {
    pub fn new(image: Arc<Image>) -> Self {
        Self {
            image,
            exposure: 1.0,
            border: BorderMode::default(),
            filter: FilterMode::default(),
        }
    }

    pub fn with_exposure(mut self, exposure: f32) -> Self {
        self.exposure = exposure;
        self
    }

    pub fn with_border(mut self, border: BorderMode) -> Self {
        self.border = border;
        self
    }

    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    fn wrap_coord(&self, uv: Vec2) -> Vec2 {
        let wrapped = match self.border {
            BorderMode::Repeat => uv - uv.floor(),
            BorderMode::Clamp => uv.clamp(Vec2::ZERO, Vec2::ONE),
        };
        // Image rows start at the top, v grows upwards
        Vec2::new(wrapped.x, 1.0 - wrapped.y)
    }

    fn texel(&self, x: i64, y: i64) -> Color {
        let (w, h) = (self.image.width as i64, self.image.height as i64);
        let (x, y) = match self.border {
            BorderMode::Repeat => (x.rem_euclid(w), y.rem_euclid(h)),
            BorderMode::Clamp => (x.clamp(0, w - 1), y.clamp(0, h - 1)),
        };
        self.image.get(x as u32, y as u32)
    }
}

impl Texture for ImageTexture {
    fn evaluate(&self, uv: Vec2) -> Color {
        let p = self.wrap_coord(uv);
        let res = Vec2::new(self.image.width as f32, self.image.height as f32);

        let color = match self.filter {
            FilterMode::Nearest => {
                let pixel = (p * res).floor();
                self.texel(pixel.x as i64, pixel.y as i64)
            }
            FilterMode::Bilinear => {
                let centered = p * res - Vec2::splat(0.5);
                let base = centered.floor();
                let f = centered - base;
                let (x, y) = (base.x as i64, base.y as i64);

                self.texel(x, y) * (1.0 - f.x) * (1.0 - f.y)
                    + self.texel(x + 1, y) * f.x * (1.0 - f.y)
                    + self.texel(x, y + 1) * (1.0 - f.x) * f.y
                    + self.texel(x + 1, y + 1) * f.x * f.y
            }
        };

        color * self.exposure
    }
}

/// Cache for loaded images.
///
/// Images are loaded on-demand and shared between textures.
#[derive(Default)]
pub struct TextureCache {
    images: HashMap<PathBuf, Arc<Image>>,
    base_dir: Option<PathBuf>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache that resolves relative paths against `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            images: HashMap::new(),
            base_dir: Some(base_dir.into()),
        }
    }

    /// Load an image from file, using the cache if available.
    pub fn load(&mut self, path: impl AsRef<Path>) -> TextureResult<Arc<Image>> {
        let full_path = self.resolve_path(path.as_ref());
        if let Some(image) = self.images.get(&full_path) {
            return Ok(image.clone());
        }

        let image = Arc::new(Image::load(&full_path)?);
        log::debug!(
            "Loaded texture: {} ({}x{}, {:.1} KB)",
            full_path.display(),
            image.width,
            image.height,
            image.size_bytes() as f32 / 1024.0
        );
        self.images.insert(full_path, image.clone());
        Ok(image)
    }

    /// Insert an already decoded image under a path key.
    pub fn insert(&mut self, path: impl AsRef<Path>, image: Image) -> Arc<Image> {
        let image = Arc::new(image);
        self.images.insert(self.resolve_path(path.as_ref()), image.clone());
        image
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Convert an sRGB-encoded value in `[0, 1]` to linear.
pub fn srgb_to_linear(v: f32) -> f32 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image() -> Arc<Image> {
        // 2x2: top row red/green, bottom row blue/white
        let pixels = vec![Color::X, Color::Y, Color::Z, Color::ONE];
        Arc::new(Image::new(2, 2, pixels).unwrap())
    }

    #[test]
    fn test_checkerboard_alternates() {
        let tex = CheckerboardTexture::new(Vec2::splat(2.0), Color::ZERO, Color::ONE);
        assert_eq!(tex.evaluate(Vec2::new(0.25, 0.25)), Color::ZERO);
        assert_eq!(tex.evaluate(Vec2::new(0.75, 0.25)), Color::ONE);
        assert_eq!(tex.evaluate(Vec2::new(0.75, 0.75)), Color::ZERO);
        // Negative coordinates keep the pattern
        assert_eq!(tex.evaluate(Vec2::new(-0.25, 0.25)), Color::ONE);
    }

    #[test]
    fn test_nearest_lookup_flips_v() {
        let tex = ImageTexture::new(gradient_image()).with_filter(FilterMode::Nearest);
        // v near 1 is the top row
        assert_eq!(tex.evaluate(Vec2::new(0.25, 0.75)), Color::X);
        assert_eq!(tex.evaluate(Vec2::new(0.75, 0.25)), Color::ONE);
    }

    #[test]
    fn test_bilinear_center_is_average() {
        let tex = ImageTexture::new(gradient_image()).with_border(BorderMode::Clamp);
        let c = tex.evaluate(Vec2::splat(0.5));
        let expected = (Color::X + Color::Y + Color::Z + Color::ONE) * 0.25;
        assert!((c - expected).length() < 1e-5);
    }

    #[test]
    fn test_repeat_border_and_exposure() {
        let tex = ImageTexture::new(gradient_image())
            .with_filter(FilterMode::Nearest)
            .with_exposure(2.0);
        let inside = tex.evaluate(Vec2::new(0.25, 0.75));
        let wrapped = tex.evaluate(Vec2::new(1.25, -0.25));
        assert_eq!(inside, wrapped);
        assert_eq!(inside, Color::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_image_size_validation() {
        assert!(matches!(
            Image::new(2, 2, vec![Color::ZERO; 3]),
            Err(TextureError::SizeMismatch { actual: 3, .. })
        ));
    }

    #[test]
    fn test_cache_missing_file_is_error() {
        let mut cache = TextureCache::with_base_dir("/nonexistent-dir");
        assert!(cache.load("missing.png").is_err());
        assert!(cache.is_empty());

        let image = Image::new(1, 1, vec![Color::ONE]).unwrap();
        cache.insert("memory.png", image);
        assert_eq!(cache.len(), 1);
        assert!(cache.load("memory.png").is_ok());
    }

    #[test]
    fn test_srgb_to_linear() {
        assert!(srgb_to_linear(0.0).abs() < 1e-6);
        assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-5);
        let mid = srgb_to_linear(0.5);
        assert!(mid > 0.1 && mid < 0.5);
    }

    #[test]
    fn test_scalar_is_channel_mean() {
        let tex = ConstantTexture::new(Color::new(0.3, 0.6, 0.9));
        assert!((tex.scalar(Vec2::ZERO) - 0.6).abs() < 1e-6);
    }
}
