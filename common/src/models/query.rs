//! Query-string parameters for listing and spatial search endpoints.

use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use super::geometry::{ring_from_coords, Position};
use crate::errors::{AppError, AppResult};

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 1000;

/// Paging and name filter for collection listings.
#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Number of records to skip.
    #[serde(default)]
    pub skip: u32,

    /// Maximum number of records to return (1-1000, default 100).
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = MAX_LIMIT, message = "limit must be between 1 and 1000"))]
    pub limit: u32,

    /// Case-insensitive substring match on the name.
    pub name: Option<String>,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
            name: None,
        }
    }
}

impl ListParams {
    /// Name filter with surrounding whitespace removed; blank filters are dropped.
    pub fn name_filter(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

/// Centre and radius for a proximity search.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RadiusParams {
    /// Longitude of the centre.
    pub lon: f64,
    /// Latitude of the centre.
    pub lat: f64,
    /// Search radius in metres.
    pub radius: f64,
}

impl RadiusParams {
    /// Validated centre and radius.
    pub fn resolve(&self) -> AppResult<(Position, f64)> {
        let centre = Position::new(self.lon, self.lat)?;
        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(AppError::Validation(
                "radius must be a non-negative number of metres".to_string(),
            ));
        }
        Ok((centre, self.radius))
    }
}

/// A location for containment search.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LocationParams {
    /// Longitude of the point.
    pub lon: f64,
    /// Latitude of the point.
    pub lat: f64,
}

impl LocationParams {
    pub fn resolve(&self) -> AppResult<Position> {
        Ok(Position::new(self.lon, self.lat)?)
    }
}

/// Query polygon for intersection search.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IntersectParams {
    /// JSON-encoded list of `[longitude, latitude]` pairs.
    pub coordinates: String,
}

impl IntersectParams {
    /// Decodes and validates the ring, closing it if needed.
    pub fn resolve(&self) -> AppResult<Vec<Position>> {
        let coords: Vec<Vec<f64>> = serde_json::from_str(&self.coordinates).map_err(|e| {
            AppError::BadRequest(format!(
                "coordinates must be a JSON list of [longitude, latitude] pairs: {}",
                e
            ))
        })?;
        Ok(ring_from_coords(&coords)?)
    }
}
