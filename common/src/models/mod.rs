//! Shared data models.

pub mod geometry;
pub mod point;
pub mod polygon;
pub mod query;

// Re-export commonly used types
pub use geometry::{CoordinateError, Feature, FeatureCollection, FeatureProperties, Geometry, Position};
pub use point::{
    BatchCreatePointsRequest, CreatePointRequest, NewPoint, PointChanges, PointRecord,
    UpdatePointRequest,
};
pub use polygon::{
    BatchCreatePolygonsRequest, CreatePolygonRequest, NewPolygon, PolygonChanges, PolygonRecord,
    UpdatePolygonRequest,
};
pub use query::{IntersectParams, ListParams, LocationParams, RadiusParams};
