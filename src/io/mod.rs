//! External interfaces: catalog discovery, object download, raster and
//! vector file access

pub mod catalog;
pub mod download;
pub mod polygon;
pub mod raster;

// Re-export main types
pub use catalog::{CatalogClient, SearchParams};
pub use download::Downloader;
pub use polygon::PolygonReader;
pub use raster::WseRasterIo;
