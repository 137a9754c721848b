use crate::types::{PipelineError, PipelineResult, SourceProjection, UtmZone, WseGrid};
use gdal::spatial_ref::{CoordTransform, SpatialRef};
use ndarray::Array2;

/// What the normalizer does with a given source zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneAction {
    /// Source already matches the canonical zone: stamp the CRS, keep the grid
    Retag,
    /// Known alternate zone: resample the grid into the canonical zone
    Reproject,
    /// Not in the dispatch table: the granule cannot be processed
    Unsupported,
}

/// Normalizes granule grids into the single canonical UTM zone.
///
/// The zone policy is a dispatch table: the canonical zone maps to `Retag`,
/// each known alternate zone maps to `Reproject`, everything else is
/// `Unsupported`. Supporting a new source zone means one more table entry.
pub struct CrsNormalizer {
    canonical: UtmZone,
    table: Vec<(u8, ZoneAction)>,
}

impl CrsNormalizer {
    /// Build the dispatch table for a canonical zone and its known alternates
    pub fn new(canonical: UtmZone, alternate_zones: &[u8]) -> Self {
        let mut table = vec![(canonical.zone, ZoneAction::Retag)];
        for &zone in alternate_zones {
            if zone != canonical.zone {
                table.push((zone, ZoneAction::Reproject));
            }
        }
        Self { canonical, table }
    }

    pub fn canonical(&self) -> UtmZone {
        self.canonical
    }

    /// Table lookup for a declared source projection
    pub fn action_for(&self, source: SourceProjection) -> ZoneAction {
        match source {
            SourceProjection::Utm { zone } => self
                .table
                .iter()
                .find(|(z, _)| *z == zone)
                .map(|(_, action)| *action)
                .unwrap_or(ZoneAction::Unsupported),
            SourceProjection::Unknown => ZoneAction::Unsupported,
        }
    }

    /// Return a grid whose CRS is the canonical zone.
    ///
    /// Canonical-zone input is retagged without touching data or coordinates,
    /// so normalization is idempotent. Alternate zones are resampled with
    /// nearest-neighbor lookup; NaN cells stay NaN and no value is invented
    /// across no-data boundaries.
    pub fn normalize(
        &self,
        grid: &WseGrid,
        native_id: &str,
        source: SourceProjection,
    ) -> PipelineResult<WseGrid> {
        match self.action_for(source) {
            ZoneAction::Retag => {
                log::info!(
                    "File {} is already in {}. Writing CRS as EPSG:{}.",
                    native_id,
                    self.canonical,
                    self.canonical.epsg()
                );
                let mut out = grid.clone();
                out.epsg = self.canonical.epsg();
                Ok(out)
            }
            ZoneAction::Reproject => {
                let zone = match source {
                    SourceProjection::Utm { zone } => zone,
                    SourceProjection::Unknown => unreachable!("table never maps unknown"),
                };
                let source_zone = UtmZone::north(zone);
                log::info!(
                    "Reprojecting {} from {} to {}.",
                    native_id,
                    source_zone,
                    self.canonical
                );
                reproject_nearest(grid, source_zone.epsg(), self.canonical.epsg())
            }
            ZoneAction::Unsupported => Err(PipelineError::UnsupportedProjection {
                native_id: native_id.to_string(),
                tag: source.to_string(),
            }),
        }
    }
}

/// Spatial reference for an EPSG code with lon/lat (GIS) axis order
pub(crate) fn spatial_ref_for_epsg(epsg: u32) -> PipelineResult<SpatialRef> {
    let srs = SpatialRef::from_epsg(epsg)?;
    srs.set_axis_mapping_strategy(gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER);
    Ok(srs)
}

/// Backward nearest-neighbor resampling between two projected CRSs.
///
/// The output grid covers the transformed footprint of the input at the same
/// pixel spacing. Each output cell center is transformed back into the source
/// CRS and takes the value of the nearest source cell, so no-data holes are
/// carried over instead of being smeared by interpolation.
fn reproject_nearest(grid: &WseGrid, src_epsg: u32, dst_epsg: u32) -> PipelineResult<WseGrid> {
    let (rows, cols) = grid.dim();
    if rows == 0 || cols == 0 {
        return Err(PipelineError::Processing(
            "Cannot reproject an empty grid".to_string(),
        ));
    }

    let src_srs = spatial_ref_for_epsg(src_epsg)?;
    let dst_srs = spatial_ref_for_epsg(dst_epsg)?;
    let forward = CoordTransform::new(&src_srs, &dst_srs)?;
    let backward = CoordTransform::new(&dst_srs, &src_srs)?;

    // Transform the boundary cell centers to find the output extent. Corners
    // alone are not enough: zone-to-zone transforms bow the grid edges.
    let mut bx = Vec::new();
    let mut by = Vec::new();
    for j in 0..cols {
        bx.push(grid.x[j]);
        by.push(grid.y[0]);
        bx.push(grid.x[j]);
        by.push(grid.y[rows - 1]);
    }
    for i in 0..rows {
        bx.push(grid.x[0]);
        by.push(grid.y[i]);
        bx.push(grid.x[cols - 1]);
        by.push(grid.y[i]);
    }
    let mut bz = vec![0.0; bx.len()];
    forward.transform_coords(&mut bx, &mut by, &mut bz)?;

    let (min_x, max_x) = min_max(&bx);
    let (min_y, max_y) = min_max(&by);

    let px = grid.pixel_width().abs();
    let py = grid.pixel_height().abs();
    if px <= 0.0 || py <= 0.0 {
        return Err(PipelineError::Processing(
            "Grid has no resolvable pixel spacing".to_string(),
        ));
    }

    let out_cols = ((max_x - min_x) / px).ceil() as usize + 1;
    let out_rows = ((max_y - min_y) / py).ceil() as usize + 1;

    // Output axes: x ascending, y descending (north-up), cell centers
    let out_x: Vec<f64> = (0..out_cols).map(|j| min_x + j as f64 * px).collect();
    let out_y: Vec<f64> = (0..out_rows).map(|i| max_y - i as f64 * py).collect();

    // Source axis origins and directions for nearest-index lookup
    let sx0 = grid.x[0];
    let sdx = grid.pixel_width();
    let sy0 = grid.y[0];
    let sdy = grid.pixel_height();

    let mut out = Array2::from_elem((out_rows, out_cols), f32::NAN);
    let mut tx = vec![0.0f64; out_cols];
    let mut ty = vec![0.0f64; out_cols];
    let mut tz = vec![0.0f64; out_cols];

    for i in 0..out_rows {
        tx.copy_from_slice(&out_x);
        for v in ty.iter_mut() {
            *v = out_y[i];
        }
        for v in tz.iter_mut() {
            *v = 0.0;
        }
        backward.transform_coords(&mut tx, &mut ty, &mut tz)?;

        for j in 0..out_cols {
            let sj = ((tx[j] - sx0) / sdx).round();
            let si = ((ty[j] - sy0) / sdy).round();
            if si >= 0.0 && sj >= 0.0 && (si as usize) < rows && (sj as usize) < cols {
                out[[i, j]] = grid.data[[si as usize, sj as usize]];
            }
        }
    }

    Ok(WseGrid {
        data: out,
        x: out_x,
        y: out_y,
        epsg: dst_epsg,
    })
}

fn min_max(values: &[f64]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values {
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    (min, max)
}
