//! Spatial polygon models.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;
use validator::Validate;

use super::geometry::{
    ring_from_coords, validate_ring, Feature, FeatureProperties, Geometry, Position,
};
use crate::errors::{AppError, AppResult};

/// Largest number of polygons accepted by one batch request.
pub const MAX_BATCH_POLYGONS: usize = 1000;

/// Request body for creating a polygon.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePolygonRequest {
    /// Display name.
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Arbitrary JSON attributes.
    #[schema(value_type = Option<Object>)]
    pub attributes: Option<Map<String, Value>>,
    /// Exterior ring as `[[longitude, latitude], ...]`; closed automatically.
    #[validate(custom(function = "validate_ring"))]
    pub coordinates: Vec<Vec<f64>>,
}

impl CreatePolygonRequest {
    /// Validates the request and converts it into a storable polygon.
    pub fn into_new_polygon(self) -> AppResult<NewPolygon> {
        self.validate()?;
        Ok(NewPolygon {
            ring: ring_from_coords(&self.coordinates)?,
            name: self.name,
            description: self.description,
            attributes: self.attributes.map(Value::Object),
        })
    }
}

/// Request body for a partial polygon update. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePolygonRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub attributes: Option<Map<String, Value>>,
    #[validate(custom(function = "validate_ring"))]
    pub coordinates: Option<Vec<Vec<f64>>>,
}

impl UpdatePolygonRequest {
    pub fn into_changes(self) -> AppResult<PolygonChanges> {
        self.validate()?;
        let ring = match self.coordinates {
            Some(coords) => Some(ring_from_coords(&coords)?),
            None => None,
        };
        Ok(PolygonChanges {
            name: self.name,
            description: self.description,
            attributes: self.attributes.map(Value::Object),
            ring,
        })
    }
}

/// Request body for creating several polygons at once.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BatchCreatePolygonsRequest {
    #[validate(nested)]
    pub polygons: Vec<CreatePolygonRequest>,
}

impl BatchCreatePolygonsRequest {
    pub fn into_new_polygons(self) -> AppResult<Vec<NewPolygon>> {
        if self.polygons.len() > MAX_BATCH_POLYGONS {
            return Err(AppError::Validation(format!(
                "Too many polygons in one batch (max {})",
                MAX_BATCH_POLYGONS
            )));
        }
        self.validate()?;
        self.polygons
            .into_iter()
            .map(CreatePolygonRequest::into_new_polygon)
            .collect()
    }
}

/// A validated polygon ready to be stored. `ring` is always closed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPolygon {
    pub name: String,
    pub description: Option<String>,
    pub attributes: Option<Value>,
    pub ring: Vec<Position>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub attributes: Option<Value>,
    pub ring: Option<Vec<Position>>,
}

/// A stored polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub attributes: Option<Value>,
    pub ring: Vec<Position>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PolygonRecord> for Feature {
    fn from(record: PolygonRecord) -> Self {
        Feature::new(
            record.id,
            Geometry::Polygon {
                coordinates: vec![record.ring],
            },
            FeatureProperties {
                name: record.name,
                description: record.description,
                attributes: record.attributes,
                created_at: record.created_at,
                updated_at: record.updated_at,
                distance: None,
            },
        )
    }
}
