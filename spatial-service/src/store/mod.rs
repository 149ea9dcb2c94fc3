//! Storage backends for spatial points and polygons.
//!
//! Handlers only see [`SpatialStore`]. `PgSpatialStore` is the PostGIS
//! backend used in production; `MemoryStore` keeps everything in process
//! and needs no database.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgSpatialStore;

use async_trait::async_trait;

use common::errors::AppResult;
use common::models::{
    ListParams, NewPoint, NewPolygon, PointChanges, PointRecord, PolygonChanges, PolygonRecord,
    Position,
};

/// Persistence and spatial query operations.
///
/// Lookups return `Ok(None)` (or `Ok(false)` for deletes) when the record
/// does not exist; errors are reserved for backend failures.
#[async_trait]
pub trait SpatialStore: Send + Sync {
    /// Checks that the backend is reachable.
    async fn ping(&self) -> AppResult<()>;

    async fn insert_point(&self, point: NewPoint) -> AppResult<PointRecord>;

    /// Inserts all points or none of them.
    async fn insert_points(&self, points: Vec<NewPoint>) -> AppResult<Vec<PointRecord>>;

    async fn list_points(&self, params: &ListParams) -> AppResult<Vec<PointRecord>>;

    async fn get_point(&self, id: i64) -> AppResult<Option<PointRecord>>;

    async fn update_point(&self, id: i64, changes: PointChanges) -> AppResult<Option<PointRecord>>;

    async fn delete_point(&self, id: i64) -> AppResult<bool>;

    /// Points within `radius_m` metres (geodesic) of `centre`, nearest first, with their distance.
    async fn points_within_radius(
        &self,
        centre: Position,
        radius_m: f64,
    ) -> AppResult<Vec<(PointRecord, f64)>>;

    /// Points strictly inside the polygon (boundary excluded).
    async fn points_within_polygon(&self, polygon_id: i64) -> AppResult<Vec<PointRecord>>;

    async fn insert_polygon(&self, polygon: NewPolygon) -> AppResult<PolygonRecord>;

    /// Inserts all polygons or none of them.
    async fn insert_polygons(&self, polygons: Vec<NewPolygon>) -> AppResult<Vec<PolygonRecord>>;

    async fn list_polygons(&self, params: &ListParams) -> AppResult<Vec<PolygonRecord>>;

    async fn get_polygon(&self, id: i64) -> AppResult<Option<PolygonRecord>>;

    async fn update_polygon(
        &self,
        id: i64,
        changes: PolygonChanges,
    ) -> AppResult<Option<PolygonRecord>>;

    async fn delete_polygon(&self, id: i64) -> AppResult<bool>;

    /// Polygons sharing any point with `ring`, touching included.
    async fn polygons_intersecting(&self, ring: &[Position]) -> AppResult<Vec<PolygonRecord>>;

    /// Polygons whose interior contains `location`.
    async fn polygons_containing(&self, location: Position) -> AppResult<Vec<PolygonRecord>>;
}
