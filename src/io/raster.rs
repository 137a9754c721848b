use crate::core::reproject::spatial_ref_for_epsg;
use crate::types::{PipelineError, PipelineResult, WseGrid};
use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::Array2;
use std::path::Path;

/// NetCDF reader/writer for the wse variable
pub struct WseRasterIo;

impl WseRasterIo {
    /// Read the `wse` variable of a granule NetCDF file into a grid.
    ///
    /// The variable is addressed as a GDAL subdataset; plain single-band
    /// files (used in tests) are opened directly. No-data cells become NaN.
    /// The returned grid carries cell-center coordinate axes derived from
    /// the geotransform and the EPSG code passed by the caller (SWOT raster
    /// granules declare their zone in the granule name, not the file).
    pub fn read_wse<P: AsRef<Path>>(path: P, epsg: u32) -> PipelineResult<WseGrid> {
        let path = path.as_ref();
        log::debug!("Reading wse from: {}", path.display());

        let subdataset = format!("NETCDF:\"{}\":wse", path.display());
        let dataset = match Dataset::open(Path::new(&subdataset)) {
            Ok(ds) => ds,
            Err(_) => Dataset::open(path)?,
        };

        let gt = dataset.geo_transform()?;
        let (width, height) = dataset.raster_size();
        if width == 0 || height == 0 {
            return Err(PipelineError::Processing(format!(
                "Empty raster: {}",
                path.display()
            )));
        }

        let rasterband = dataset.rasterband(1)?;
        let no_data = rasterband.no_data_value();
        let buffer = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

        let mut data = Array2::from_shape_vec((height, width), buffer.data)
            .map_err(|e| PipelineError::Processing(format!("Failed to reshape wse data: {}", e)))?;

        if let Some(nd) = no_data {
            let nd = nd as f32;
            data.mapv_inplace(|v| if v == nd { f32::NAN } else { v });
        }

        let x: Vec<f64> = (0..width).map(|j| gt[0] + (j as f64 + 0.5) * gt[1]).collect();
        let y: Vec<f64> = (0..height).map(|i| gt[3] + (i as f64 + 0.5) * gt[5]).collect();

        Ok(WseGrid { data, x, y, epsg })
    }

    /// Persist a grid as a single-variable NetCDF artifact.
    ///
    /// The file is written to `<path>.part` and renamed into place once the
    /// dataset is flushed and closed, so a consumer never sees a partially
    /// written artifact under the final name.
    pub fn write_wse<P: AsRef<Path>>(grid: &WseGrid, path: P) -> PipelineResult<()> {
        let path = path.as_ref();
        let (rows, cols) = grid.dim();
        if rows == 0 || cols == 0 {
            return Err(PipelineError::Processing(
                "Refusing to write an empty grid".to_string(),
            ));
        }

        let part_path = path.with_extension("nc.part");

        let driver = DriverManager::get_driver_by_name("netCDF")?;
        {
            let mut dataset =
                driver.create_with_band_type::<f32, _>(&part_path, cols as isize, rows as isize, 1)?;
            dataset.set_geo_transform(&grid.geo_transform().to_gdal())?;
            dataset.set_spatial_ref(&spatial_ref_for_epsg(grid.epsg)?)?;

            let mut band = dataset.rasterband(1)?;
            band.set_no_data_value(Some(f64::NAN))?;

            // Name the netCDF variable after the measurement
            band.set_metadata_item("NETCDF_VARNAME", "wse", "")?;
            band.set_metadata_item("long_name", "water surface elevation", "")?;
            band.set_metadata_item("units", "m", "")?;

            let values: Vec<f32> = grid.data.iter().copied().collect();
            band.write((0, 0), (cols, rows), &Buffer::new((cols, rows), values))?;
        }

        std::fs::rename(&part_path, path)?;
        log::debug!("Wrote artifact {}", path.display());
        Ok(())
    }
}
