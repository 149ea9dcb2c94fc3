//! PostGIS-backed store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Executor, PgPool, Postgres};

use common::errors::{AppError, AppResult};
use common::models::geometry::{ring_to_wkt, Geometry};
use common::models::{
    ListParams, NewPoint, NewPolygon, PointChanges, PointRecord, PolygonChanges, PolygonRecord,
    Position,
};

use super::SpatialStore;

macro_rules! point_columns {
    () => {
        "id, name, description, attributes, ST_X(geom) AS lon, ST_Y(geom) AS lat, created_at, updated_at"
    };
}

macro_rules! polygon_columns {
    () => {
        "id, name, description, attributes, ST_AsGeoJSON(geom, 15) AS geometry, created_at, updated_at"
    };
}

/// Schema bootstrap, run in order at startup.
const SCHEMA: [&str; 5] = [
    "CREATE EXTENSION IF NOT EXISTS postgis",
    "CREATE TABLE IF NOT EXISTS spatial_points (
        id          BIGSERIAL    PRIMARY KEY,
        name        VARCHAR(255) NOT NULL,
        description TEXT,
        attributes  JSONB,
        geom        geometry(POINT, 4326) NOT NULL,
        created_at  TIMESTAMPTZ  NOT NULL DEFAULT now(),
        updated_at  TIMESTAMPTZ  NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS idx_spatial_points_geom ON spatial_points USING GIST (geom)",
    "CREATE TABLE IF NOT EXISTS spatial_polygons (
        id          BIGSERIAL    PRIMARY KEY,
        name        VARCHAR(255) NOT NULL,
        description TEXT,
        attributes  JSONB,
        geom        geometry(POLYGON, 4326) NOT NULL,
        created_at  TIMESTAMPTZ  NOT NULL DEFAULT now(),
        updated_at  TIMESTAMPTZ  NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS idx_spatial_polygons_geom ON spatial_polygons USING GIST (geom)",
];

const INSERT_POINT: &str = concat!(
    "INSERT INTO spatial_points (name, description, attributes, geom) \
     VALUES ($1, $2, $3, ST_GeomFromText($4, 4326)) \
     RETURNING ",
    point_columns!()
);

const LIST_POINTS: &str = concat!(
    "SELECT ",
    point_columns!(),
    " FROM spatial_points \
     WHERE ($1::TEXT IS NULL OR name ILIKE $1) \
     ORDER BY id OFFSET $2 LIMIT $3"
);

const GET_POINT: &str = concat!("SELECT ", point_columns!(), " FROM spatial_points WHERE id = $1");

const UPDATE_POINT: &str = concat!(
    "UPDATE spatial_points SET \
       name = COALESCE($2, name), \
       description = COALESCE($3, description), \
       attributes = COALESCE($4, attributes), \
       geom = COALESCE(ST_GeomFromText($5, 4326), geom), \
       updated_at = now() \
     WHERE id = $1 \
     RETURNING ",
    point_columns!()
);

const POINTS_WITHIN_RADIUS: &str = concat!(
    "SELECT ",
    point_columns!(),
    ", ST_Distance(geom::geography, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography) AS distance \
     FROM spatial_points \
     WHERE ST_DWithin(geom::geography, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, $3) \
     ORDER BY distance, id"
);

const POINTS_WITHIN_POLYGON: &str = concat!(
    "SELECT ",
    point_columns!(),
    " FROM spatial_points \
     WHERE ST_Within(geom, (SELECT geom FROM spatial_polygons WHERE id = $1)) \
     ORDER BY id"
);

const INSERT_POLYGON: &str = concat!(
    "INSERT INTO spatial_polygons (name, description, attributes, geom) \
     VALUES ($1, $2, $3, ST_GeomFromText($4, 4326)) \
     RETURNING ",
    polygon_columns!()
);

const LIST_POLYGONS: &str = concat!(
    "SELECT ",
    polygon_columns!(),
    " FROM spatial_polygons \
     WHERE ($1::TEXT IS NULL OR name ILIKE $1) \
     ORDER BY id OFFSET $2 LIMIT $3"
);

const GET_POLYGON: &str =
    concat!("SELECT ", polygon_columns!(), " FROM spatial_polygons WHERE id = $1");

const UPDATE_POLYGON: &str = concat!(
    "UPDATE spatial_polygons SET \
       name = COALESCE($2, name), \
       description = COALESCE($3, description), \
       attributes = COALESCE($4, attributes), \
       geom = COALESCE(ST_GeomFromText($5, 4326), geom), \
       updated_at = now() \
     WHERE id = $1 \
     RETURNING ",
    polygon_columns!()
);

const POLYGONS_INTERSECTING: &str = concat!(
    "SELECT ",
    polygon_columns!(),
    " FROM spatial_polygons \
     WHERE ST_Intersects(geom, ST_GeomFromText($1, 4326)) \
     ORDER BY id"
);

const POLYGONS_CONTAINING: &str = concat!(
    "SELECT ",
    polygon_columns!(),
    " FROM spatial_polygons \
     WHERE ST_Contains(geom, ST_SetSRID(ST_MakePoint($1, $2), 4326)) \
     ORDER BY id"
);

/// Row from the `spatial_points` table.
#[derive(sqlx::FromRow)]
struct PointRow {
    id: i64,
    name: String,
    description: Option<String>,
    attributes: Option<Value>,
    lon: f64,
    lat: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PointRow> for PointRecord {
    fn from(row: PointRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            attributes: row.attributes,
            position: Position(row.lon, row.lat),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PointDistanceRow {
    #[sqlx(flatten)]
    point: PointRow,
    distance: f64,
}

/// Row from the `spatial_polygons` table; `geometry` is GeoJSON text.
#[derive(sqlx::FromRow)]
struct PolygonRow {
    id: i64,
    name: String,
    description: Option<String>,
    attributes: Option<Value>,
    geometry: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PolygonRow> for PolygonRecord {
    type Error = AppError;

    fn try_from(row: PolygonRow) -> Result<Self, Self::Error> {
        let geometry: Geometry = serde_json::from_str(&row.geometry).map_err(|e| {
            AppError::DatabaseQuery(format!("polygon {} has unreadable geometry: {}", row.id, e))
        })?;
        let ring = geometry
            .exterior_ring()
            .map(<[Position]>::to_vec)
            .ok_or_else(|| {
                AppError::DatabaseQuery(format!("polygon {} has no exterior ring", row.id))
            })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            attributes: row.attributes,
            ring,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn polygon_records(rows: Vec<PolygonRow>) -> AppResult<Vec<PolygonRecord>> {
    rows.into_iter().map(PolygonRecord::try_from).collect()
}

/// `ILIKE` pattern for a substring match, with wildcards in the needle escaped.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

async fn insert_point_with<'e, E>(executor: E, point: &NewPoint) -> AppResult<PointRecord>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = sqlx::query_as::<_, PointRow>(INSERT_POINT)
        .bind(&point.name)
        .bind(&point.description)
        .bind(&point.attributes)
        .bind(point.position.to_wkt())
        .fetch_one(executor)
        .await?;
    Ok(row.into())
}

async fn insert_polygon_with<'e, E>(executor: E, polygon: &NewPolygon) -> AppResult<PolygonRecord>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = sqlx::query_as::<_, PolygonRow>(INSERT_POLYGON)
        .bind(&polygon.name)
        .bind(&polygon.description)
        .bind(&polygon.attributes)
        .bind(ring_to_wkt(&polygon.ring))
        .fetch_one(executor)
        .await?;
    row.try_into()
}

/// PostGIS implementation of [`SpatialStore`].
#[derive(Clone)]
pub struct PgSpatialStore {
    pool: PgPool,
}

impl PgSpatialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the PostGIS extension, tables and GiST indexes if they do not exist.
    pub async fn ensure_schema(&self) -> AppResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Spatial tables `spatial_points` and `spatial_polygons` ensured");
        Ok(())
    }
}

#[async_trait]
impl SpatialStore for PgSpatialStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_point(&self, point: NewPoint) -> AppResult<PointRecord> {
        insert_point_with(&self.pool, &point).await
    }

    async fn insert_points(&self, points: Vec<NewPoint>) -> AppResult<Vec<PointRecord>> {
        let mut tx = self.pool.begin().await?;
        let mut records = Vec::with_capacity(points.len());
        for point in &points {
            records.push(insert_point_with(&mut *tx, point).await?);
        }
        tx.commit().await?;
        Ok(records)
    }

    async fn list_points(&self, params: &ListParams) -> AppResult<Vec<PointRecord>> {
        let rows = sqlx::query_as::<_, PointRow>(LIST_POINTS)
            .bind(params.name_filter().map(contains_pattern))
            .bind(i64::from(params.skip))
            .bind(i64::from(params.limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PointRecord::from).collect())
    }

    async fn get_point(&self, id: i64) -> AppResult<Option<PointRecord>> {
        let row = sqlx::query_as::<_, PointRow>(GET_POINT)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PointRecord::from))
    }

    async fn update_point(&self, id: i64, changes: PointChanges) -> AppResult<Option<PointRecord>> {
        let row = sqlx::query_as::<_, PointRow>(UPDATE_POINT)
            .bind(id)
            .bind(changes.name)
            .bind(changes.description)
            .bind(changes.attributes)
            .bind(changes.position.map(|p| p.to_wkt()))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PointRecord::from))
    }

    async fn delete_point(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM spatial_points WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn points_within_radius(
        &self,
        centre: Position,
        radius_m: f64,
    ) -> AppResult<Vec<(PointRecord, f64)>> {
        let rows = sqlx::query_as::<_, PointDistanceRow>(POINTS_WITHIN_RADIUS)
            .bind(centre.lon())
            .bind(centre.lat())
            .bind(radius_m)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (PointRecord::from(row.point), row.distance))
            .collect())
    }

    async fn points_within_polygon(&self, polygon_id: i64) -> AppResult<Vec<PointRecord>> {
        let rows = sqlx::query_as::<_, PointRow>(POINTS_WITHIN_POLYGON)
            .bind(polygon_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PointRecord::from).collect())
    }

    async fn insert_polygon(&self, polygon: NewPolygon) -> AppResult<PolygonRecord> {
        insert_polygon_with(&self.pool, &polygon).await
    }

    async fn insert_polygons(&self, polygons: Vec<NewPolygon>) -> AppResult<Vec<PolygonRecord>> {
        let mut tx = self.pool.begin().await?;
        let mut records = Vec::with_capacity(polygons.len());
        for polygon in &polygons {
            records.push(insert_polygon_with(&mut *tx, polygon).await?);
        }
        tx.commit().await?;
        Ok(records)
    }

    async fn list_polygons(&self, params: &ListParams) -> AppResult<Vec<PolygonRecord>> {
        let rows = sqlx::query_as::<_, PolygonRow>(LIST_POLYGONS)
            .bind(params.name_filter().map(contains_pattern))
            .bind(i64::from(params.skip))
            .bind(i64::from(params.limit))
            .fetch_all(&self.pool)
            .await?;
        polygon_records(rows)
    }

    async fn get_polygon(&self, id: i64) -> AppResult<Option<PolygonRecord>> {
        sqlx::query_as::<_, PolygonRow>(GET_POLYGON)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(PolygonRecord::try_from)
            .transpose()
    }

    async fn update_polygon(
        &self,
        id: i64,
        changes: PolygonChanges,
    ) -> AppResult<Option<PolygonRecord>> {
        sqlx::query_as::<_, PolygonRow>(UPDATE_POLYGON)
            .bind(id)
            .bind(changes.name)
            .bind(changes.description)
            .bind(changes.attributes)
            .bind(changes.ring.as_deref().map(ring_to_wkt))
            .fetch_optional(&self.pool)
            .await?
            .map(PolygonRecord::try_from)
            .transpose()
    }

    async fn delete_polygon(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM spatial_polygons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn polygons_intersecting(&self, ring: &[Position]) -> AppResult<Vec<PolygonRecord>> {
        let rows = sqlx::query_as::<_, PolygonRow>(POLYGONS_INTERSECTING)
            .bind(ring_to_wkt(ring))
            .fetch_all(&self.pool)
            .await?;
        polygon_records(rows)
    }

    async fn polygons_containing(&self, location: Position) -> AppResult<Vec<PolygonRecord>> {
        let rows = sqlx::query_as::<_, PolygonRow>(POLYGONS_CONTAINING)
            .bind(location.lon())
            .bind(location.lat())
            .fetch_all(&self.pool)
            .await?;
        polygon_records(rows)
    }
}
