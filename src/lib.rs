//! swotpipe: A Modular SWOT Water-Surface-Elevation Ingestion Pipeline
//!
//! This library discovers SWOT raster granules for a region, filters each
//! granule's wse variable to its 5th-95th percentile band, normalizes the
//! projection to a single canonical UTM zone, clips to a reference polygon,
//! and persists one NetCDF artifact per granule date. Mosaicking and
//! plotting live downstream and only consume the output directory.

pub mod core;
pub mod io;
pub mod pipeline;
pub mod types;

// Re-export main types and functions for easier access
pub use types::{
    BoundingBox, GeoTransform, Granule, PipelineError, PipelineResult, SourceProjection,
    UtmZone, Wse, WseArray, WseGrid,
};

pub use crate::core::{
    CrsNormalizer, QuantileFilter, QuantileParams, ReferencePolygon, SpatialClipper,
};
pub use crate::io::{CatalogClient, Downloader, PolygonReader, SearchParams, WseRasterIo};
pub use crate::pipeline::{Pipeline, RunContext, RunSummary, Stage};
