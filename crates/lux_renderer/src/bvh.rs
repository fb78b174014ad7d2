//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! The same structure indexes triangles inside a mesh and instances inside a
//! scene. It only stores primitive indices; the owner supplies bounds and
//! centroids at build time and a per-primitive hit test during traversal.

use crate::Intersection;
use lux_math::{Aabb, Ray, Vec3};

/// Maximum primitives per leaf node before splitting.
const LEAF_MAX_SIZE: usize = 4;

/// Number of centroid bins evaluated by the SAH split.
const SAH_BINS: usize = 12;

/// A set of primitives the BVH can be built over.
///
/// Bounds must be finite; unbounded primitives are handled by the owner.
pub trait Primitives {
    fn primitive_count(&self) -> usize;
    fn primitive_bounds(&self, index: usize) -> Aabb;
    fn primitive_centroid(&self, index: usize) -> Vec3;
}

/// BVH node - either a branch with two children or a leaf with a range of
/// primitive indices.
enum BvhNode {
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
    },
    Leaf {
        first: usize,
        count: usize,
        bbox: Aabb,
    },
    Empty,
}

impl BvhNode {
    fn bbox(&self) -> Aabb {
        match self {
            BvhNode::Branch { bbox, .. } | BvhNode::Leaf { bbox, .. } => *bbox,
            BvhNode::Empty => Aabb::EMPTY,
        }
    }
}

#[derive(Debug, Default)]
struct BuildStats {
    nodes: usize,
    leaves: usize,
    max_depth: usize,
}

pub struct Bvh {
    root: BvhNode,
    indices: Vec<usize>,
}

impl Bvh {
    pub fn build<P: Primitives + ?Sized>(primitives: &P) -> Self {
        let count = primitives.primitive_count();
        if count == 0 {
            return Self {
                root: BvhNode::Empty,
                indices: Vec::new(),
            };
        }

        let bounds: Vec<Aabb> = (0..count).map(|i| primitives.primitive_bounds(i)).collect();
        let centroids: Vec<Vec3> = (0..count).map(|i| primitives.primitive_centroid(i)).collect();
        let mut indices: Vec<usize> = (0..count).collect();

        let mut stats = BuildStats::default();
        let root = build_node(&bounds, &centroids, &mut indices, 0, 0, &mut stats);

        log::debug!(
            "BVH built over {} primitives: {} nodes, {} leaves, depth {}",
            count,
            stats.nodes,
            stats.leaves,
            stats.max_depth
        );

        Self { root, indices }
    }

    pub fn bounding_box(&self) -> Aabb {
        self.root.bbox()
    }

    /// Finds the nearest hit closer than `its.t`.
    ///
    /// `hit_primitive(index, ray, its)` tests a single primitive and must only
    /// accept hits closer than the current `its.t`.
    pub fn intersect<'a, F>(&self, ray: &Ray, its: &mut Intersection<'a>, mut hit_primitive: F) -> bool
    where
        F: FnMut(usize, &Ray, &mut Intersection<'a>) -> bool,
    {
        if self.root.bbox().hit_distance(ray, its.t).is_none() {
            return false;
        }
        self.traverse(&self.root, ray, its, &mut hit_primitive)
    }

    fn traverse<'a, F>(&self, node: &BvhNode, ray: &Ray, its: &mut Intersection<'a>, hit_primitive: &mut F) -> bool
    where
        F: FnMut(usize, &Ray, &mut Intersection<'a>) -> bool,
    {
        match node {
            BvhNode::Empty => false,

            BvhNode::Leaf { first, count, .. } => {
                let mut hit_anything = false;
                for &index in &self.indices[*first..*first + *count] {
                    hit_anything |= hit_primitive(index, ray, its);
                }
                hit_anything
            }

            BvhNode::Branch { left, right, .. } => {
                let near_left = left.bbox().hit_distance(ray, its.t);
                let near_right = right.bbox().hit_distance(ray, its.t);

                // Visit the closer child first so the farther one can be pruned
                let order = match (near_left, near_right) {
                    (Some(l), Some(r)) if r < l => [(right, Some(r)), (left, Some(l))],
                    _ => [(left, near_left), (right, near_right)],
                };

                let mut hit_anything = false;
                for (child, entry) in order {
                    match entry {
                        Some(t) if t < its.t => {
                            hit_anything |= self.traverse(child, ray, its, hit_primitive);
                        }
                        _ => {}
                    }
                }
                hit_anything
            }
        }
    }
}

fn build_node(
    bounds: &[Aabb],
    centroids: &[Vec3],
    indices: &mut [usize],
    first: usize,
    depth: usize,
    stats: &mut BuildStats,
) -> BvhNode {
    stats.nodes += 1;
    stats.max_depth = stats.max_depth.max(depth);

    let n = indices.len();
    let bbox = indices
        .iter()
        .fold(Aabb::EMPTY, |acc, &i| Aabb::surrounding(&acc, &bounds[i]));

    if n <= LEAF_MAX_SIZE {
        stats.leaves += 1;
        return BvhNode::Leaf {
            first,
            count: n,
            bbox,
        };
    }

    let centroid_bounds = indices
        .iter()
        .fold(Aabb::EMPTY, |acc, &i| acc.include_point(centroids[i]));
    let axis = centroid_bounds.longest_axis();

    let mid = sah_partition(bounds, centroids, indices, axis, &centroid_bounds)
        .unwrap_or_else(|| median_partition(centroids, indices, axis));

    let (left_indices, right_indices) = indices.split_at_mut(mid);
    let left = build_node(bounds, centroids, left_indices, first, depth + 1, stats);
    let right = build_node(bounds, centroids, right_indices, first + mid, depth + 1, stats);

    BvhNode::Branch {
        left: Box::new(left),
        right: Box::new(right),
        bbox,
    }
}

/// Partitions by the cheapest binned surface-area split along `axis`.
/// Returns the split position, or `None` when no bin boundary separates the
/// primitives.
fn sah_partition(
    bounds: &[Aabb],
    centroids: &[Vec3],
    indices: &mut [usize],
    axis: usize,
    centroid_bounds: &Aabb,
) -> Option<usize> {
    let extent = centroid_bounds.axis_interval(axis);
    if !(extent.size() > 0.0) {
        return None;
    }

    let bin_of = |i: usize| {
        let offset = (centroids[i][axis] - extent.min) / extent.size();
        ((offset * SAH_BINS as f32) as usize).min(SAH_BINS - 1)
    };

    let mut bins = [(Aabb::EMPTY, 0usize); SAH_BINS];
    for &i in indices.iter() {
        let bin = &mut bins[bin_of(i)];
        bin.0 = Aabb::surrounding(&bin.0, &bounds[i]);
        bin.1 += 1;
    }

    let mut best: Option<(usize, f32)> = None;
    for split in 1..SAH_BINS {
        let (left, right) = bins.split_at(split);
        let merge = |side: &[(Aabb, usize)]| {
            side.iter()
                .fold((Aabb::EMPTY, 0), |(b, c), (bb, cc)| (Aabb::surrounding(&b, bb), c + cc))
        };
        let (left_box, left_count) = merge(left);
        let (right_box, right_count) = merge(right);
        if left_count == 0 || right_count == 0 {
            continue;
        }

        let cost = left_box.surface_area() * left_count as f32
            + right_box.surface_area() * right_count as f32;
        if best.map_or(true, |(_, c)| cost < c) {
            best = Some((split, cost));
        }
    }
    let (split, _) = best?;

    let mut mid = 0;
    for j in 0..indices.len() {
        if bin_of(indices[j]) < split {
            indices.swap(mid, j);
            mid += 1;
        }
    }
    (mid > 0 && mid < indices.len()).then_some(mid)
}

/// Splits at the median centroid along `axis`.
fn median_partition(centroids: &[Vec3], indices: &mut [usize], axis: usize) -> usize {
    let mid = indices.len() / 2;
    indices.select_nth_unstable_by(mid, |&a, &b| centroids[a][axis].total_cmp(&centroids[b][axis]));
    mid
}
