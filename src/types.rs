use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Water-surface elevation value type
pub type Wse = f32;

/// 2D WSE grid (row-major: y x x), NaN marks no-data cells
pub type WseArray = Array2<Wse>;

/// Declared source projection of a granule, parsed from its native-id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceProjection {
    /// Northern-hemisphere UTM zone (e.g. 45 -> EPSG:32645)
    Utm { zone: u8 },
    /// Native-id carries no recognizable zone tag
    Unknown,
}

impl std::fmt::Display for SourceProjection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceProjection::Utm { zone } => write!(f, "UTM{}", zone),
            SourceProjection::Unknown => write!(f, "unknown"),
        }
    }
}

/// A UTM zone used as the pipeline-wide target projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmZone {
    pub zone: u8,
    pub north: bool,
}

impl UtmZone {
    pub fn north(zone: u8) -> Self {
        Self { zone, north: true }
    }

    /// EPSG code of the zone (326xx north, 327xx south)
    pub fn epsg(&self) -> u32 {
        if self.north {
            32600 + self.zone as u32
        } else {
            32700 + self.zone as u32
        }
    }
}

impl std::fmt::Display for UtmZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UTM Zone {}{}", self.zone, if self.north { "N" } else { "S" })
    }
}

/// One discoverable unit of SWOT raster data, as returned by catalog search.
///
/// Ephemeral: built per run from CMR metadata, read-only afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Granule {
    /// Catalog native-id, e.g. "SWOT_L2_HR_Raster_..._UTM45V_..._x_x_x_013_512_084F_..."
    pub native_id: String,
    /// Tile identifier extracted from the native-id (pass/scene segment)
    pub tile_id: String,
    /// UTC date of the temporal extent's ending datetime
    pub acquisition_date: NaiveDate,
    /// Projection tag parsed from the native-id
    pub source_projection: SourceProjection,
    /// Data URLs, first entry is the one downloaded
    pub data_urls: Vec<String>,
}

/// Geographic bounding box for catalog queries (lon/lat degrees)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

/// Affine geotransform in GDAL element order
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: &[f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }
}

/// In-memory WSE raster: data grid plus cell-center coordinate axes.
///
/// `x[j]` / `y[i]` are the projected coordinates of the center of cell
/// `data[[i, j]]`. Axes are monotonic; `y` typically decreases (north-up).
#[derive(Debug, Clone)]
pub struct WseGrid {
    pub data: WseArray,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub epsg: u32,
}

impl WseGrid {
    /// Grid dimensions as (rows, cols)
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Pixel width in projected units (signed)
    pub fn pixel_width(&self) -> f64 {
        if self.x.len() > 1 {
            self.x[1] - self.x[0]
        } else {
            0.0
        }
    }

    /// Pixel height in projected units (signed, negative for north-up grids)
    pub fn pixel_height(&self) -> f64 {
        if self.y.len() > 1 {
            self.y[1] - self.y[0]
        } else {
            0.0
        }
    }

    /// Geotransform equivalent of the coordinate axes
    pub fn geo_transform(&self) -> GeoTransform {
        let pw = self.pixel_width();
        let ph = self.pixel_height();
        GeoTransform {
            top_left_x: self.x.first().copied().unwrap_or(0.0) - pw / 2.0,
            pixel_width: pw,
            rotation_x: 0.0,
            top_left_y: self.y.first().copied().unwrap_or(0.0) - ph / 2.0,
            rotation_y: 0.0,
            pixel_height: ph,
        }
    }

    /// Count of non-NaN cells
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }
}

/// Error types for the ingestion pipeline
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Catalog query failed: {0}")]
    Catalog(String),

    #[error("Invalid granule metadata: {0}")]
    InvalidGranule(String),

    #[error("Unsupported source projection for {native_id}: {tag}")]
    UnsupportedProjection { native_id: String, tag: String },

    #[error("Degenerate wse distribution: {0}")]
    DegenerateQuantiles(String),

    #[error("Clip produced an empty intersection: {0}")]
    EmptyIntersection(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
