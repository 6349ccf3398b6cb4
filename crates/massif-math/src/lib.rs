//! Shared f64 geometry for the Massif tile selection engine: axis-aligned
//! bounding boxes and view-frustum containment tests.
//!
//! Tileset coordinates are world-scale, so everything here is f64. The
//! traversal engine only consumes scalar query results (distances, depths,
//! containment verdicts); the math lives in this crate so the same types can
//! serve loaders and debug tooling.

mod aabb;
mod frustum;

pub use aabb::Aabb;
pub use frustum::{Containment, Frustum};
