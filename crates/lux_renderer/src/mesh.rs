//! Indexed triangle meshes with an internal BVH.

use crate::bvh::{Bvh, Primitives};
use crate::{AreaSample, Intersection, Sampler, Shape, SurfaceEvent};
use lux_math::{warp, Aabb, Distribution1D, Frame, Ray, Vec2, Vec3, EPSILON};
use thiserror::Error;

/// Errors that can occur while assembling a mesh.
#[derive(Error, Debug, PartialEq)]
pub enum MeshError {
    #[error("Mesh has no triangles")]
    Empty,

    #[error("Triangle {triangle} references vertex {index}, but only {count} exist")]
    IndexOutOfRange {
        triangle: usize,
        index: u32,
        count: usize,
    },

    #[error("Mesh has {actual} {attribute} for {expected} vertices")]
    AttributeCount {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },
}

pub type MeshResult<T> = Result<T, MeshError>;

/// Raw buffers of a mesh. `normals` and `uvs` may be empty.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub triangles: Vec<[u32; 3]>,
}

pub struct TriangleMesh {
    data: MeshData,
    smooth_normals: bool,
    bvh: Bvh,
    area_distribution: Distribution1D,
    total_area: f32,
}

impl TriangleMesh {
    /// Validates the buffers and builds the acceleration structure.
    ///
    /// With `smooth_normals` set and vertex normals present, shading normals
    /// are interpolated; otherwise the flat face normal is used.
    pub fn new(data: MeshData, smooth_normals: bool) -> MeshResult<Self> {
        validate(&data)?;
        Ok(Self::from_valid(data, smooth_normals))
    }

    /// Builds a mesh from buffers that already passed `validate`.
    fn from_valid(data: MeshData, smooth_normals: bool) -> Self {
        debug_assert!(validate(&data).is_ok());

        let areas: Vec<f32> = (0..data.triangles.len())
            .map(|i| {
                let [p0, p1, p2] = triangle_positions(&data, i);
                0.5 * (p1 - p0).cross(p2 - p0).length()
            })
            .collect();
        let total_area: f32 = areas.iter().sum();
        let degenerate = areas.iter().filter(|&&a| !(a > 0.0)).count();
        if degenerate > 0 {
            log::debug!("Mesh has {} degenerate triangles", degenerate);
        }

        let mut mesh = Self {
            area_distribution: Distribution1D::new(&areas),
            data,
            smooth_normals,
            bvh: Bvh::build(&NoPrimitives),
            total_area,
        };
        mesh.bvh = Bvh::build(&mesh);

        log::info!(
            "Created triangle mesh: {} vertices, {} triangles, area {:.3}",
            mesh.data.positions.len(),
            mesh.data.triangles.len(),
            mesh.total_area
        );
        mesh
    }

    /// Two triangles spanning `[-1, 1]^2` in the `z = 0` plane, facing `+z`.
    pub fn rectangle() -> Self {
        let data = MeshData {
            positions: vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ],
            normals: vec![Vec3::Z; 4],
            uvs: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ],
            triangles: vec![[0, 1, 2], [0, 2, 3]],
        };
        Self::from_valid(data, false)
    }

    pub fn triangle_count(&self) -> usize {
        self.data.triangles.len()
    }

    pub fn surface_area(&self) -> f32 {
        self.total_area
    }

    fn area_pdf(&self) -> f32 {
        if self.total_area > 0.0 {
            1.0 / self.total_area
        } else {
            0.0
        }
    }

    /// Surface data at barycentric coordinates `(b1, b2)` of a triangle.
    fn surface_at(&self, index: usize, b1: f32, b2: f32) -> SurfaceEvent {
        let [i0, i1, i2] = self.data.triangles[index].map(|i| i as usize);
        let [p0, p1, p2] = triangle_positions(&self.data, index);
        let b0 = 1.0 - b1 - b2;

        let edge1 = p1 - p0;
        let mut geometry_normal = edge1.cross(p2 - p0).normalize_or_zero();

        let normals = &self.data.normals;
        let shading_normal = if self.smooth_normals && !normals.is_empty() {
            let n = (normals[i0] * b0 + normals[i1] * b1 + normals[i2] * b2).normalize_or_zero();
            if n == Vec3::ZERO {
                geometry_normal
            } else {
                // Keep the face normal on the side the vertex normals point to
                if geometry_normal.dot(n) < 0.0 {
                    geometry_normal = -geometry_normal;
                }
                n
            }
        } else {
            geometry_normal
        };

        let uvs = &self.data.uvs;
        let uv = if uvs.is_empty() {
            Vec2::new(b1, b2)
        } else {
            uvs[i0] * b0 + uvs[i1] * b1 + uvs[i2] * b2
        };

        SurfaceEvent {
            position: p0 * b0 + p1 * b1 + p2 * b2,
            uv,
            frame: Frame::from_normal_tangent(shading_normal, edge1),
            geometry_normal,
            pdf: self.area_pdf(),
        }
    }

    /// Möller-Trumbore ray/triangle test.
    fn intersect_triangle(&self, index: usize, ray: &Ray, its: &mut Intersection<'_>) -> bool {
        let [p0, p1, p2] = triangle_positions(&self.data, index);
        let edge1 = p1 - p0;
        let edge2 = p2 - p0;

        let pvec = ray.direction.cross(edge2);
        let det = edge1.dot(pvec);
        // Parallel rays and zero-area triangles
        if det.abs() < 1e-8 {
            return false;
        }
        let inv_det = 1.0 / det;

        let tvec = ray.origin - p0;
        let u = tvec.dot(pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return false;
        }

        let qvec = tvec.cross(edge1);
        let v = ray.direction.dot(qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return false;
        }

        let t = edge2.dot(qvec) * inv_det;
        if t < EPSILON || t >= its.t {
            return false;
        }

        its.t = t;
        its.surf = self.surface_at(index, u, v);
        true
    }
}

fn validate(data: &MeshData) -> MeshResult<()> {
    if data.triangles.is_empty() {
        return Err(MeshError::Empty);
    }
    let count = data.positions.len();
    for (attribute, actual) in [("normals", data.normals.len()), ("uvs", data.uvs.len())] {
        if actual != 0 && actual != count {
            return Err(MeshError::AttributeCount {
                attribute,
                expected: count,
                actual,
            });
        }
    }
    for (triangle, indices) in data.triangles.iter().enumerate() {
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= count) {
            return Err(MeshError::IndexOutOfRange {
                triangle,
                index,
                count,
            });
        }
    }
    Ok(())
}

fn triangle_positions(data: &MeshData, index: usize) -> [Vec3; 3] {
    data.triangles[index].map(|i| data.positions[i as usize])
}

/// Placeholder primitive set used before the real BVH is built.
struct NoPrimitives;

impl Primitives for NoPrimitives {
    fn primitive_count(&self) -> usize {
        0
    }

    fn primitive_bounds(&self, _index: usize) -> Aabb {
        Aabb::EMPTY
    }

    fn primitive_centroid(&self, _index: usize) -> Vec3 {
        Vec3::ZERO
    }
}

impl Primitives for TriangleMesh {
    fn primitive_count(&self) -> usize {
        self.data.triangles.len()
    }

    fn primitive_bounds(&self, index: usize) -> Aabb {
        let [p0, p1, p2] = triangle_positions(&self.data, index);
        Aabb::from_points(p0.min(p1).min(p2), p0.max(p1).max(p2))
    }

    fn primitive_centroid(&self, index: usize) -> Vec3 {
        let [p0, p1, p2] = triangle_positions(&self.data, index);
        (p0 + p1 + p2) / 3.0
    }
}

impl Shape for TriangleMesh {
    fn intersect(&self, ray: &Ray, its: &mut Intersection<'_>) -> bool {
        self.bvh
            .intersect(ray, its, |index, ray, its| self.intersect_triangle(index, ray, its))
    }

    fn bounding_box(&self) -> Aabb {
        self.bvh.bounding_box()
    }

    fn centroid(&self) -> Vec3 {
        let sum: Vec3 = self.data.positions.iter().copied().sum();
        sum / self.data.positions.len().max(1) as f32
    }

    fn sample_area(&self, rng: &mut Sampler, _reference: Option<Vec3>) -> AreaSample {
        let (index, _, _) = self.area_distribution.sample_discrete(rng.next_1d());
        let b = warp::square_to_uniform_triangle(rng.next_2d());
        self.surface_at(index, b.x, b.y)
    }

    fn pdf_area(&self, _position: Vec3, _reference: Option<Vec3>) -> f32 {
        self.area_pdf()
    }
}
