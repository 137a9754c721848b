//! Core WSE processing modules

pub mod clip;
pub mod quality;
pub mod reproject;

// Re-export main types
pub use clip::{ReferencePolygon, Ring, SpatialClipper};
pub use quality::{QuantileFilter, QuantileParams};
pub use reproject::{CrsNormalizer, ZoneAction};
