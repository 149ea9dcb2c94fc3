//! In-process store backed by ordered maps.
//!
//! Spatial predicates come from `common::utils::spatial`. Within and
//! containment searches exclude the boundary, matching `ST_Within` and
//! `ST_Contains`; intersection includes it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use common::errors::{AppError, AppResult};
use common::models::{
    ListParams, NewPoint, NewPolygon, PointChanges, PointRecord, PolygonChanges, PolygonRecord,
    Position,
};
use common::utils::{haversine_distance, locate, rings_intersect, RingLocation};

use super::SpatialStore;

#[derive(Default)]
struct Inner {
    next_point_id: i64,
    next_polygon_id: i64,
    points: BTreeMap<i64, PointRecord>,
    polygons: BTreeMap<i64, PolygonRecord>,
}

impl Inner {
    fn add_point(&mut self, point: NewPoint) -> PointRecord {
        self.next_point_id += 1;
        let now = Utc::now();
        let record = PointRecord {
            id: self.next_point_id,
            name: point.name,
            description: point.description,
            attributes: point.attributes,
            position: point.position,
            created_at: now,
            updated_at: now,
        };
        self.points.insert(record.id, record.clone());
        record
    }

    fn add_polygon(&mut self, polygon: NewPolygon) -> PolygonRecord {
        self.next_polygon_id += 1;
        let now = Utc::now();
        let record = PolygonRecord {
            id: self.next_polygon_id,
            name: polygon.name,
            description: polygon.description,
            attributes: polygon.attributes,
            ring: polygon.ring,
            created_at: now,
            updated_at: now,
        };
        self.polygons.insert(record.id, record.clone());
        record
    }
}

/// Case-insensitive substring match, the same test `ILIKE '%needle%'` performs.
fn name_matches(name: &str, params: &ListParams) -> bool {
    match params.name_filter() {
        Some(needle) => name.to_lowercase().contains(&needle.to_lowercase()),
        None => true,
    }
}

fn page<T>(records: impl Iterator<Item = T>, params: &ListParams) -> Vec<T> {
    records
        .skip(params.skip as usize)
        .take(params.limit as usize)
        .collect()
}

/// Store that keeps every record in memory. Ids start at 1 per table.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a lost database: while offline every call fails with a connection error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> AppResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseConnection(
                "in-memory store is offline".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SpatialStore for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        self.check_online()
    }

    async fn insert_point(&self, point: NewPoint) -> AppResult<PointRecord> {
        self.check_online()?;
        Ok(self.inner.write().await.add_point(point))
    }

    async fn insert_points(&self, points: Vec<NewPoint>) -> AppResult<Vec<PointRecord>> {
        self.check_online()?;
        let mut inner = self.inner.write().await;
        Ok(points.into_iter().map(|p| inner.add_point(p)).collect())
    }

    async fn list_points(&self, params: &ListParams) -> AppResult<Vec<PointRecord>> {
        self.check_online()?;
        let inner = self.inner.read().await;
        Ok(page(
            inner
                .points
                .values()
                .filter(|p| name_matches(&p.name, params))
                .cloned(),
            params,
        ))
    }

    async fn get_point(&self, id: i64) -> AppResult<Option<PointRecord>> {
        self.check_online()?;
        Ok(self.inner.read().await.points.get(&id).cloned())
    }

    async fn update_point(&self, id: i64, changes: PointChanges) -> AppResult<Option<PointRecord>> {
        self.check_online()?;
        let mut inner = self.inner.write().await;
        let Some(record) = inner.points.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = changes.name {
            record.name = name;
        }
        if let Some(description) = changes.description {
            record.description = Some(description);
        }
        if let Some(attributes) = changes.attributes {
            record.attributes = Some(attributes);
        }
        if let Some(position) = changes.position {
            record.position = position;
        }
        record.updated_at = Utc::now();

        Ok(Some(record.clone()))
    }

    async fn delete_point(&self, id: i64) -> AppResult<bool> {
        self.check_online()?;
        Ok(self.inner.write().await.points.remove(&id).is_some())
    }

    async fn points_within_radius(
        &self,
        centre: Position,
        radius_m: f64,
    ) -> AppResult<Vec<(PointRecord, f64)>> {
        self.check_online()?;
        let inner = self.inner.read().await;
        let mut hits: Vec<(PointRecord, f64)> = inner
            .points
            .values()
            .map(|p| (p, haversine_distance(centre, p.position)))
            .filter(|(_, distance)| *distance <= radius_m)
            .map(|(p, distance)| (p.clone(), distance))
            .collect();
        hits.sort_by(|(a, da), (b, db)| da.total_cmp(db).then(a.id.cmp(&b.id)));
        Ok(hits)
    }

    async fn points_within_polygon(&self, polygon_id: i64) -> AppResult<Vec<PointRecord>> {
        self.check_online()?;
        let inner = self.inner.read().await;
        let Some(polygon) = inner.polygons.get(&polygon_id) else {
            return Ok(Vec::new());
        };
        Ok(inner
            .points
            .values()
            .filter(|p| locate(p.position, &polygon.ring) == RingLocation::Inside)
            .cloned()
            .collect())
    }

    async fn insert_polygon(&self, polygon: NewPolygon) -> AppResult<PolygonRecord> {
        self.check_online()?;
        Ok(self.inner.write().await.add_polygon(polygon))
    }

    async fn insert_polygons(&self, polygons: Vec<NewPolygon>) -> AppResult<Vec<PolygonRecord>> {
        self.check_online()?;
        let mut inner = self.inner.write().await;
        Ok(polygons.into_iter().map(|p| inner.add_polygon(p)).collect())
    }

    async fn list_polygons(&self, params: &ListParams) -> AppResult<Vec<PolygonRecord>> {
        self.check_online()?;
        let inner = self.inner.read().await;
        Ok(page(
            inner
                .polygons
                .values()
                .filter(|p| name_matches(&p.name, params))
                .cloned(),
            params,
        ))
    }

    async fn get_polygon(&self, id: i64) -> AppResult<Option<PolygonRecord>> {
        self.check_online()?;
        Ok(self.inner.read().await.polygons.get(&id).cloned())
    }

    async fn update_polygon(
        &self,
        id: i64,
        changes: PolygonChanges,
    ) -> AppResult<Option<PolygonRecord>> {
        self.check_online()?;
        let mut inner = self.inner.write().await;
        let Some(record) = inner.polygons.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = changes.name {
            record.name = name;
        }
        if let Some(description) = changes.description {
            record.description = Some(description);
        }
        if let Some(attributes) = changes.attributes {
            record.attributes = Some(attributes);
        }
        if let Some(ring) = changes.ring {
            record.ring = ring;
        }
        record.updated_at = Utc::now();

        Ok(Some(record.clone()))
    }

    async fn delete_polygon(&self, id: i64) -> AppResult<bool> {
        self.check_online()?;
        Ok(self.inner.write().await.polygons.remove(&id).is_some())
    }

    async fn polygons_intersecting(&self, ring: &[Position]) -> AppResult<Vec<PolygonRecord>> {
        self.check_online()?;
        let inner = self.inner.read().await;
        Ok(inner
            .polygons
            .values()
            .filter(|p| rings_intersect(&p.ring, ring))
            .cloned()
            .collect())
    }

    async fn polygons_containing(&self, location: Position) -> AppResult<Vec<PolygonRecord>> {
        self.check_online()?;
        let inner = self.inner.read().await;
        Ok(inner
            .polygons
            .values()
            .filter(|p| locate(location, &p.ring) == RingLocation::Inside)
            .cloned()
            .collect())
    }
}
