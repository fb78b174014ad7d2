//! Lux - Monte Carlo light transport on the CPU.
//!
//! Shapes are placed in the world through instances that carry their
//! material, emission and medium. A [`Scene`] aggregates instances and lights
//! behind a BVH, and integrators turn scene queries into radiance estimates
//! for camera rays.

mod bucket;
mod bvh;
mod camera;
mod emission;
mod environment;
mod instance;
mod integrator;
mod intersection;
mod light;
mod material;
mod medium;
mod mesh;
mod microfacet;
mod path;
mod principled;
mod renderer;
mod sampler;
mod scene;
mod shape;
mod sphere;
mod texture;
mod volume;

pub use bucket::{generate_buckets, render, render_bucket, Bucket, BucketResult, DEFAULT_BUCKET_SIZE};
pub use bvh::{Bvh, Primitives};
pub use camera::Camera;
pub use emission::{Emission, EmissionEval, LambertianEmission};
pub use environment::EnvironmentMap;
pub use instance::Instance;
pub use integrator::{
    balance_heuristic, sanitize, AlbedoIntegrator, DirectIntegrator, Integrator, NormalsConfig, NormalsIntegrator,
};
pub use intersection::Intersection;
pub use light::{AreaLight, BackgroundLight, DirectLightSample, DirectionalLight, Light, PointLight};
pub use material::{fresnel_dielectric, reflect, refract, schlick, Bsdf, BsdfEval, BsdfSample, Dielectric, Diffuse};
pub use medium::{henyey_greenstein, HomogeneousMedium, Medium};
pub use mesh::{MeshData, MeshError, MeshResult, TriangleMesh};
pub use microfacet::{RoughConductor, RoughDielectric};
pub use path::{PathTracer, PathTracerConfig};
pub use principled::Principled;
pub use renderer::{color_to_rgba, linear_to_gamma, render_pixel, ImageBuffer, RenderConfig};
pub use sampler::Sampler;
pub use scene::{LightSelection, Scene, SceneBuilder, SceneError, SceneResult};
pub use shape::{AreaSample, Shape, SurfaceEvent};
pub use sphere::Sphere;
pub use texture::{
    srgb_to_linear, BorderMode, CheckerboardTexture, ConstantTexture, FilterMode, Image, ImageTexture, Texture,
    TextureCache, TextureError, TextureResult,
};
pub use volume::{VolumePathTracer, VolumeTracerConfig};

/// Re-export the math types used throughout the public API
pub use lux_math::{Aabb, Color, ColorExt, Frame, Interval, Quat, Ray, Transform, Vec2, Vec3};
