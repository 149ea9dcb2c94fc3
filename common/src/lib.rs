//! Shared building blocks for the spatial service.
//!
//! - `config`: environment-driven configuration and the validated database descriptor
//! - `errors`: application error type and its HTTP mapping
//! - `extract`: request extractors that reject with `AppError`
//! - `models`: GeoJSON wire types and request/record models
//! - `middleware`: request tracing middleware
//! - `response`: response envelope
//! - `utils`: planar and geodesic geometry helpers

pub mod config;
pub mod errors;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;

/// Service name reported in response metadata and logs.
pub const SERVICE_NAME: &str = "spatial-service";
