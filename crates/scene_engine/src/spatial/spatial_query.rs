//! Overlap volumes for cosmos queries
//!
//! Each query volume answers one question: can anything inside this box be
//! a match? The cosmos uses the answer to prune whole subtrees, so the test
//! must be conservative (false positives are fine, false negatives are not).

use super::bounds::{Aabb, Frustum, Ray};
use crate::foundation::math::Vec3;

/// Volume that can be tested against bounding boxes
pub trait SpatialQuery: Send + Sync {
    /// Whether the box may contain a match
    fn overlaps(&self, bounds: &Aabb) -> bool;
}

impl SpatialQuery for Frustum {
    fn overlaps(&self, bounds: &Aabb) -> bool {
        self.intersects_aabb(bounds)
    }
}

impl SpatialQuery for Aabb {
    fn overlaps(&self, bounds: &Aabb) -> bool {
        self.intersects(bounds)
    }
}

impl SpatialQuery for Ray {
    fn overlaps(&self, bounds: &Aabb) -> bool {
        bounds.intersect_ray(self).is_some()
    }
}

/// Single point in space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointQuery(pub Vec3);

impl SpatialQuery for PointQuery {
    fn overlaps(&self, bounds: &Aabb) -> bool {
        bounds.contains_point(self.0)
    }
}

/// Sphere used for cube/point-light range culling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereQuery {
    /// Sphere center
    pub center: Vec3,
    /// Sphere radius
    pub radius: f32,
}

impl SphereQuery {
    /// Create a sphere query
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

impl SpatialQuery for SphereQuery {
    fn overlaps(&self, bounds: &Aabb) -> bool {
        bounds.intersects_sphere(self.center, self.radius)
    }
}

/// Accepts every box
#[derive(Debug, Clone, Copy, Default)]
pub struct Everything;

impl SpatialQuery for Everything {
    fn overlaps(&self, _bounds: &Aabb) -> bool {
        true
    }
}
