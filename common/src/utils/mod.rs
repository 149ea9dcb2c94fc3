//! Utility functions and helpers.

pub mod spatial;

// Re-export commonly used types
pub use spatial::{haversine_distance, locate, rings_intersect, RingLocation};
