//! Spatial partitioning data structures
//!
//! Bounding volumes, the cosmos bounding-volume tree and the query volumes
//! used for culling, picking and proximity queries.

pub mod bounds;
pub mod cosmos;
pub mod spatial_query;

pub use bounds::{Aabb, Frustum, Plane, Ray};
pub use cosmos::Cosmos;
pub use spatial_query::{Everything, PointQuery, SpatialQuery, SphereQuery};
