//! GeoJSON wire types and coordinate validation.
//!
//! All geometries are WGS 84 (SRID 4326) with `[longitude, latitude]` axis order.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationError;

/// Spatial reference identifier of every stored geometry.
pub const SRID: i32 = 4326;

/// Coordinate validation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("Coordinates must be [longitude, latitude]")]
    Arity,

    #[error("Coordinates must be finite numbers")]
    NotFinite,

    #[error("Longitude {0} must be between -180 and 180")]
    Longitude(f64),

    #[error("Latitude {0} must be between -90 and 90")]
    Latitude(f64),

    #[error("Polygon must have at least 3 coordinates")]
    TooFewPositions,

    #[error("Polygon must have at least 3 distinct coordinates")]
    Degenerate,
}

/// A `[longitude, latitude]` pair. Serializes as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position(pub f64, pub f64);

impl Position {
    /// Builds a position, rejecting non-finite or out-of-range values.
    pub fn new(lon: f64, lat: f64) -> Result<Self, CoordinateError> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(CoordinateError::NotFinite);
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::Longitude(lon));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::Latitude(lat));
        }
        Ok(Self(lon, lat))
    }

    /// Builds a position from a raw coordinate list, which must hold exactly two values.
    pub fn from_coords(coords: &[f64]) -> Result<Self, CoordinateError> {
        match coords {
            [lon, lat] => Self::new(*lon, *lat),
            _ => Err(CoordinateError::Arity),
        }
    }

    pub fn lon(&self) -> f64 {
        self.0
    }

    pub fn lat(&self) -> f64 {
        self.1
    }

    /// Well-known text, e.g. `POINT(10 20)`.
    pub fn to_wkt(&self) -> String {
        format!("POINT({} {})", self.0, self.1)
    }
}

/// Validates and closes a polygon ring.
///
/// At least three positions are required. An open ring is closed by
/// repeating its first position; the closed ring must span at least three
/// distinct vertices.
pub fn ring_from_coords(coords: &[Vec<f64>]) -> Result<Vec<Position>, CoordinateError> {
    if coords.len() < 3 {
        return Err(CoordinateError::TooFewPositions);
    }

    let mut ring = coords
        .iter()
        .map(|c| Position::from_coords(c))
        .collect::<Result<Vec<_>, _>>()?;

    if ring.first() != ring.last() {
        ring.push(ring[0]);
    }

    let vertices = &ring[..ring.len() - 1];
    let distinct = vertices
        .iter()
        .enumerate()
        .filter(|(i, p)| !vertices[..*i].contains(*p))
        .count();
    if distinct < 3 {
        return Err(CoordinateError::Degenerate);
    }

    Ok(ring)
}

/// Well-known text for a single-ring polygon, e.g. `POLYGON((0 0, 0 1, 1 1, 0 0))`.
pub fn ring_to_wkt(ring: &[Position]) -> String {
    let body = ring
        .iter()
        .map(|p| format!("{} {}", p.0, p.1))
        .collect::<Vec<_>>()
        .join(", ");
    format!("POLYGON(({}))", body)
}

/// `validator` hook for point coordinate fields.
pub fn validate_position(coords: &Vec<f64>) -> Result<(), ValidationError> {
    Position::from_coords(coords)
        .map(|_| ())
        .map_err(|e| invalid("position", e))
}

/// `validator` hook for polygon coordinate fields.
pub fn validate_ring(coords: &Vec<Vec<f64>>) -> Result<(), ValidationError> {
    ring_from_coords(coords)
        .map(|_| ())
        .map_err(|e| invalid("ring", e))
}

fn invalid(code: &'static str, err: CoordinateError) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Owned(err.to_string()))
}

/// GeoJSON geometry object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    Polygon { coordinates: Vec<Vec<Position>> },
}

impl Geometry {
    /// Exterior ring of a polygon geometry.
    pub fn exterior_ring(&self) -> Option<&[Position]> {
        match self {
            Geometry::Polygon { coordinates } => coordinates.first().map(Vec::as_slice),
            Geometry::Point { .. } => None,
        }
    }
}

/// Properties block shared by point and polygon features.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FeatureProperties {
    pub name: String,
    pub description: Option<String>,
    pub attributes: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Distance in metres from the search centre (radius search only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

/// GeoJSON Feature.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Feature {
    /// Always `"Feature"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: i64,
    #[schema(value_type = Object)]
    pub geometry: Geometry,
    pub properties: FeatureProperties,
}

impl Feature {
    pub fn new(id: i64, geometry: Geometry, properties: FeatureProperties) -> Self {
        Self {
            kind: "Feature",
            id,
            geometry,
            properties,
        }
    }
}

/// GeoJSON FeatureCollection.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FeatureCollection {
    /// Always `"FeatureCollection"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: "FeatureCollection",
            features,
        }
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
