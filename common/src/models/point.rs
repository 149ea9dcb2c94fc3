//! Spatial point models.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;
use validator::Validate;

use super::geometry::{validate_position, Feature, FeatureProperties, Geometry, Position};
use crate::errors::{AppError, AppResult};

/// Largest number of points accepted by one batch request.
pub const MAX_BATCH_POINTS: usize = 1000;

/// Request body for creating a point.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePointRequest {
    /// Display name.
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Arbitrary JSON attributes.
    #[schema(value_type = Option<Object>)]
    pub attributes: Option<Map<String, Value>>,
    /// `[longitude, latitude]`.
    #[validate(custom(function = "validate_position"))]
    pub coordinates: Vec<f64>,
}

impl CreatePointRequest {
    /// Validates the request and converts it into a storable point.
    pub fn into_new_point(self) -> AppResult<NewPoint> {
        self.validate()?;
        Ok(NewPoint {
            position: Position::from_coords(&self.coordinates)?,
            name: self.name,
            description: self.description,
            attributes: self.attributes.map(Value::Object),
        })
    }
}

/// Request body for a partial point update. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePointRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub attributes: Option<Map<String, Value>>,
    #[validate(custom(function = "validate_position"))]
    pub coordinates: Option<Vec<f64>>,
}

impl UpdatePointRequest {
    /// Validates the request and converts it into a change set.
    pub fn into_changes(self) -> AppResult<PointChanges> {
        self.validate()?;
        let position = match self.coordinates {
            Some(coords) => Some(Position::from_coords(&coords)?),
            None => None,
        };
        Ok(PointChanges {
            name: self.name,
            description: self.description,
            attributes: self.attributes.map(Value::Object),
            position,
        })
    }
}

/// Request body for creating several points at once.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BatchCreatePointsRequest {
    #[validate(nested)]
    pub points: Vec<CreatePointRequest>,
}

impl BatchCreatePointsRequest {
    pub fn into_new_points(self) -> AppResult<Vec<NewPoint>> {
        if self.points.len() > MAX_BATCH_POINTS {
            return Err(AppError::Validation(format!(
                "Too many points in one batch (max {})",
                MAX_BATCH_POINTS
            )));
        }
        self.validate()?;
        self.points
            .into_iter()
            .map(CreatePointRequest::into_new_point)
            .collect()
    }
}

/// A validated point ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPoint {
    pub name: String,
    pub description: Option<String>,
    pub attributes: Option<Value>,
    pub position: Position,
}

/// Validated partial update of a point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub attributes: Option<Value>,
    pub position: Option<Position>,
}

/// A stored point.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub attributes: Option<Value>,
    pub position: Position,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PointRecord {
    /// GeoJSON feature annotated with a distance in metres.
    pub fn into_feature_with_distance(self, distance: f64) -> Feature {
        let mut feature = Feature::from(self);
        feature.properties.distance = Some(distance);
        feature
    }
}

impl From<PointRecord> for Feature {
    fn from(record: PointRecord) -> Self {
        Feature::new(
            record.id,
            Geometry::Point {
                coordinates: record.position,
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
