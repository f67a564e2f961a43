//! Spatial queries over component storages
//!
//! All queries read the cosmos as of the last finalize and return only
//! components still pooled in their storage.

use std::cmp::Ordering;

use super::scene_graph::SceneGraph;
use crate::ecs::{ComponentRef, ComponentTypeId};
use crate::foundation::math::Vec3;
use crate::spatial::{Aabb, Frustum, PointQuery, Ray, SpatialQuery, SphereQuery};

impl SceneGraph {
    /// Components of a type whose cosmos box passes `query`
    pub fn query<Q: SpatialQuery + ?Sized>(&self, type_id: ComponentTypeId, query: &Q) -> Vec<ComponentRef> {
        self.storage(type_id)
            .map(|storage| storage.read().query(query))
            .unwrap_or_default()
    }

    /// Components whose box intersects a frustum
    pub fn query_by_frustum(&self, type_id: ComponentTypeId, frustum: &Frustum) -> Vec<ComponentRef> {
        self.query(type_id, frustum)
    }

    /// Components whose box intersects an area
    pub fn query_by_area(&self, type_id: ComponentTypeId, area: &Aabb) -> Vec<ComponentRef> {
        self.query(type_id, area)
    }

    /// Components whose box contains a point
    pub fn query_by_position(&self, type_id: ComponentTypeId, position: Vec3) -> Vec<ComponentRef> {
        self.query(type_id, &PointQuery(position))
    }

    /// Components whose box intersects a sphere
    pub fn query_by_sphere(&self, type_id: ComponentTypeId, center: Vec3, radius: f32) -> Vec<ComponentRef> {
        self.query(type_id, &SphereQuery::new(center, radius))
    }

    /// Components hit by a ray, nearest first, with their hit distance
    ///
    /// The cosmos boxes only pre-filter; each candidate is tested against
    /// its oriented box from the entity snapshot.
    pub fn query_by_ray(&self, type_id: ComponentTypeId, ray: &Ray) -> Vec<(ComponentRef, f32)> {
        let mut hits: Vec<_> = self
            .query(type_id, ray)
            .into_iter()
            .filter_map(|component| {
                let snapshot = component.entity()?.snapshot();
                let inverse = snapshot.world.try_inverse()?;
                let local = Ray {
                    origin: inverse.transform_point(&ray.origin.into()).coords,
                    direction: inverse.transform_vector(&ray.direction),
                };
                let distance = Aabb::unit().intersect_ray(&local)?;
                Some((component, distance))
            })
            .collect();

        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        hits
    }

    /// Pooled components of a type accepted by `predicate`
    pub fn query_by_match(
        &self,
        type_id: ComponentTypeId,
        mut predicate: impl FnMut(&ComponentRef) -> bool,
    ) -> Vec<ComponentRef> {
        let Some(storage) = self.storage(type_id) else {
            return Vec::new();
        };
        let storage = storage.read();
        storage.pool().iter().filter(|component| predicate(component)).cloned().collect()
    }
}
