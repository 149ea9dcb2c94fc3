//! JSON envelope for health and error responses.
//!
//! Points and polygons go over the wire as bare GeoJSON; only the health
//! endpoint and failures are wrapped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::SERVICE_NAME;

/// `{success, data?, error?, meta}`
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,

    pub meta: ResponseMeta,
}

/// Error payload of a failed request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    /// Stable machine-readable code, e.g. `VALIDATION_ERROR`.
    pub code: String,
    pub message: String,
    /// Field-level detail, present for validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResponseMeta {
    pub timestamp: DateTime<Utc>,
    /// Always this service's name.
    pub service: String,
}

impl ResponseMeta {
    fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            service: SERVICE_NAME.to_string(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: ResponseMeta::now(),
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(error: ApiError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            meta: ResponseMeta::now(),
        }
    }
}
