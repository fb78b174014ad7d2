//! Renders a Cornell box with a glass ball, a rough metal ball and a fog
//! sphere, and writes it as a PNG.
//!
//! Usage: `cargo run --release --example cornell -- [output.png] [config.json]`
//! where the optional JSON file holds a `RenderConfig`.

use anyhow::{Context, Result};
use lux_renderer::{
    render, Camera, Color, ConstantTexture, Dielectric, Diffuse, HomogeneousMedium, Instance, LambertianEmission,
    Principled, Quat, RenderConfig, Scene, SceneBuilder, Sphere, Texture, Transform, TriangleMesh, Vec3, VolumePathTracer,
    VolumeTracerConfig,
};
use std::f32::consts::FRAC_PI_2;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn constant(color: Color) -> Arc<dyn Texture> {
    Arc::new(ConstantTexture::new(color))
}

fn wall(transform: Transform, color: Color) -> Instance {
    Instance::new(Arc::new(TriangleMesh::rectangle()))
        .with_transform(transform)
        .with_bsdf(Arc::new(Diffuse::new(constant(color))))
}

fn placed(scale: f32, rotation: Quat, translation: Vec3) -> Transform {
    Transform::from_scale_rotation_translation(Vec3::splat(scale), rotation, translation)
}

fn cornell_box() -> Result<Scene> {
    let white = Color::splat(0.73);
    let red = Color::new(0.65, 0.05, 0.05);
    let green = Color::new(0.12, 0.45, 0.15);

    let mut builder = SceneBuilder::new();
    builder
        .add_instance(wall(placed(1.0, Quat::from_rotation_x(-FRAC_PI_2), -Vec3::Y), white))
        .add_instance(wall(placed(1.0, Quat::from_rotation_x(FRAC_PI_2), Vec3::Y), white))
        .add_instance(wall(placed(1.0, Quat::IDENTITY, -Vec3::Z), white))
        .add_instance(wall(placed(1.0, Quat::from_rotation_y(FRAC_PI_2), -Vec3::X), red))
        .add_instance(wall(placed(1.0, Quat::from_rotation_y(-FRAC_PI_2), Vec3::X), green))
        .add_area_light(
            Instance::new(Arc::new(TriangleMesh::rectangle()))
                .with_transform(placed(0.25, Quat::from_rotation_x(FRAC_PI_2), Vec3::new(0.0, 0.98, 0.0)))
                .with_emission(Arc::new(LambertianEmission::new(constant(Color::splat(17.0))))),
        )
        .add_instance(
            Instance::new(Arc::new(Sphere::new()))
                .with_transform(placed(0.35, Quat::IDENTITY, Vec3::new(-0.45, -0.65, -0.3)))
                .with_bsdf(Arc::new(Dielectric::new(
                    Arc::new(ConstantTexture::scalar_value(1.5)),
                    constant(Color::ONE),
                    constant(Color::ONE),
                ))),
        )
        .add_instance(
            Instance::new(Arc::new(Sphere::new()))
                .with_transform(placed(0.3, Quat::IDENTITY, Vec3::new(0.45, -0.7, 0.2)))
                .with_bsdf(Arc::new(
                    Principled::new(constant(Color::new(0.95, 0.75, 0.4)))
                        .with_metallic(constant(Color::ONE))
                        .with_roughness(constant(Color::splat(0.3))),
                )),
        )
        .add_instance(
            Instance::new(Arc::new(Sphere::new()))
                .with_transform(placed(0.3, Quat::IDENTITY, Vec3::new(0.3, 0.2, -0.4)))
                .with_medium(Arc::new(HomogeneousMedium::new(0.2, 1.8).with_asymmetry(0.3))),
        );

    builder.build().context("Failed to build Cornell box")
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut args = std::env::args().skip(1);
    let output = args.next().unwrap_or_else(|| "cornell.png".to_string());
    let config: RenderConfig = match args.next() {
        Some(path) => {
            let text = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path))?;
            serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path))?
        }
        None => RenderConfig {
            samples_per_pixel: 64,
            ..Default::default()
        },
    };

    let scene = cornell_box()?;
    let mut camera = Camera::new()
        .with_resolution(400, 400)
        .with_position(Vec3::new(0.0, 0.0, 3.7), Vec3::ZERO, Vec3::Y)
        .with_vfov(38.0);
    camera.initialize();

    let integrator = VolumePathTracer::new(VolumeTracerConfig {
        max_depth: 8,
        ..Default::default()
    });

    let image = render(&camera, &scene, &integrator, &config, &AtomicBool::new(false));
    log::info!("Average radiance {:?}", image.average());

    image::save_buffer(&output, &image.to_rgba(), image.width, image.height, image::ColorType::Rgba8)
        .with_context(|| format!("Failed to write {}", output))?;
    log::info!("Wrote {}", output);

    Ok(())
}
