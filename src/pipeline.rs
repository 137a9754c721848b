use crate::core::{CrsNormalizer, QuantileFilter, ReferencePolygon, SpatialClipper};
use crate::io::{CatalogClient, Downloader, SearchParams, WseRasterIo};
use crate::types::{Granule, PipelineError, PipelineResult, SourceProjection, UtmZone};
use chrono::{Duration, NaiveDate, Utc};
use std::path::{Path, PathBuf};

/// Directory names under the data root
pub const DOWNLOAD_DIR: &str = "Downloaded_Data";
pub const OUTPUT_DIR: &str = "Filtered_Data";
pub const LOG_DIR: &str = "Logs";

/// Known alternate source zones resampled into the canonical zone
pub const ALTERNATE_ZONES: [u8; 2] = [44, 46];

/// Pipeline stage names for failure reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Download,
    Read,
    Filter,
    Normalize,
    Clip,
    Persist,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Download => "download",
            Stage::Read => "read",
            Stage::Filter => "quantile filter",
            Stage::Normalize => "reprojection",
            Stage::Clip => "clip",
            Stage::Persist => "save",
        };
        write!(f, "{}", name)
    }
}

/// Per-run shared state: directories, canonical zone, clip boundary.
///
/// Built once per invocation and passed down, so two pipelines over
/// different regions can coexist in one process.
pub struct RunContext {
    pub download_dir: PathBuf,
    pub output_dir: PathBuf,
    pub canonical: UtmZone,
    pub polygon: ReferencePolygon,
}

impl RunContext {
    /// Bootstrap the run directories under `data_root`
    pub fn new<P: AsRef<Path>>(
        data_root: P,
        canonical: UtmZone,
        polygon: ReferencePolygon,
    ) -> PipelineResult<Self> {
        let data_root = data_root.as_ref();
        let download_dir = data_root.join(DOWNLOAD_DIR);
        let output_dir = data_root.join(OUTPUT_DIR);
        std::fs::create_dir_all(&download_dir)?;
        std::fs::create_dir_all(&output_dir)?;
        std::fs::create_dir_all(data_root.join(LOG_DIR))?;

        Ok(Self {
            download_dir,
            output_dir,
            canonical,
            polygon,
        })
    }

    /// Canonical artifact path: Filtered_Data/SWOT_BD_<YYYYMMDD>_<tile>_wse.nc
    pub fn artifact_path(&self, granule: &Granule) -> PathBuf {
        self.output_dir.join(format!(
            "SWOT_BD_{}_{}_wse.nc",
            granule.acquisition_date.format("%Y%m%d"),
            granule.tile_id
        ))
    }

    /// Temporary location of the raw granule download
    pub fn raw_path(&self, granule: &Granule) -> PathBuf {
        self.download_dir.join(format!(
            "SWOT_BD_{}_{}.nc",
            granule.acquisition_date.format("%Y%m%d"),
            granule.tile_id
        ))
    }
}

/// Counts reported at the end of a run
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub found: usize,
    pub skipped_existing: usize,
    pub saved: usize,
    pub failed: usize,
}

/// Sequences discovery, download, filtering, normalization, clipping and
/// persistence, isolating failures per granule.
pub struct Pipeline {
    ctx: RunContext,
    catalog: CatalogClient,
    downloader: Downloader,
    filter: QuantileFilter,
    normalizer: CrsNormalizer,
}

impl Pipeline {
    pub fn new(ctx: RunContext, catalog: CatalogClient, downloader: Downloader) -> Self {
        let normalizer = CrsNormalizer::new(ctx.canonical, &ALTERNATE_ZONES);
        Self {
            ctx,
            catalog,
            downloader,
            filter: QuantileFilter::new(),
            normalizer,
        }
    }

    /// Run the full pipeline for one search window.
    ///
    /// A catalog failure aborts the run; every later failure is scoped to
    /// its granule. Raw downloads are deleted whether or not the granule
    /// succeeds. Granules whose artifact already exists are skipped before
    /// anything is downloaded, so re-runs are idempotent.
    pub fn run(&self, params: &SearchParams) -> PipelineResult<RunSummary> {
        log::info!(
            "Start date {} and end date {} for granules search.",
            params.start,
            params.end
        );

        let granules = self.catalog.search(params)?;
        Ok(self.process_discovered(&granules))
    }

    /// Process an already-discovered granule set (the post-catalog half of
    /// `run`). Failures past this point are scoped to single granules.
    pub fn process_discovered(&self, granules: &[Granule]) -> RunSummary {
        log::info!("Found {} granules for the given search criteria.", granules.len());

        let mut summary = RunSummary {
            found: granules.len(),
            ..Default::default()
        };

        for granule in granules {
            let artifact = self.ctx.artifact_path(granule);
            if artifact.exists() {
                log::info!(
                    "Output for {} already exists at {}, skipping granule {}.",
                    granule.acquisition_date,
                    artifact.display(),
                    granule.native_id
                );
                summary.skipped_existing += 1;
                continue;
            }

            match self.process_granule(granule, &artifact) {
                Ok(()) => {
                    summary.saved += 1;
                    log::info!("*******************************************************");
                    log::info!(
                        "Finished processing granule for date: {}",
                        granule.acquisition_date
                    );
                    log::info!("*******************************************************");
                }
                Err((stage, e)) => {
                    summary.failed += 1;
                    // An unrecognized projection tag is a skip, not a fault
                    if matches!(e, PipelineError::UnsupportedProjection { .. }) {
                        log::warn!(
                            "File {} does not contain a supported UTM zone. Skipping: {}",
                            granule.native_id,
                            e
                        );
                    } else {
                        log::error!(
                            "Granule {} failed at {} stage: {}",
                            granule.native_id,
                            stage,
                            e
                        );
                    }
                }
            }
        }

        log::info!(
            "Run complete: {} found, {} saved, {} skipped, {} failed.",
            summary.found,
            summary.saved,
            summary.skipped_existing,
            summary.failed
        );
        summary
    }

    /// Download one granule and hand it through the processing stages.
    /// The raw file is removed on every exit path past the download.
    fn process_granule(
        &self,
        granule: &Granule,
        artifact_path: &Path,
    ) -> Result<(), (Stage, PipelineError)> {
        let url = granule.data_urls.first().ok_or_else(|| {
            (
                Stage::Download,
                PipelineError::InvalidGranule(format!(
                    "{} carries no data URL",
                    granule.native_id
                )),
            )
        })?;

        let raw_path = self.ctx.raw_path(granule);
        log::info!("Downloading file from {} to {}.", url, raw_path.display());
        if let Err(e) = self.downloader.fetch(url, &raw_path) {
            // The downloader removes its own partial files; only a leftover
            // from an earlier interrupted run needs cleaning here.
            if raw_path.exists() {
                cleanup_raw(&raw_path);
            }
            return Err((Stage::Download, e));
        }

        let outcome = self.transform_and_persist(granule, &raw_path, artifact_path);
        cleanup_raw(&raw_path);
        outcome
    }

    fn transform_and_persist(
        &self,
        granule: &Granule,
        raw_path: &Path,
        artifact_path: &Path,
    ) -> Result<(), (Stage, PipelineError)> {
        // Grids in an unrecognized projection are read with the canonical
        // tag; the normalizer rejects them before the tag can matter.
        let declared_epsg = match granule.source_projection {
            SourceProjection::Utm { zone } => UtmZone::north(zone).epsg(),
            SourceProjection::Unknown => self.ctx.canonical.epsg(),
        };

        let grid = WseRasterIo::read_wse(raw_path, declared_epsg)
            .map_err(|e| (Stage::Read, e))?;

        let filtered = self.filter.apply(&grid).map_err(|e| (Stage::Filter, e))?;

        let normalized = self
            .normalizer
            .normalize(&filtered, &granule.native_id, granule.source_projection)
            .map_err(|e| (Stage::Normalize, e))?;

        let clipped = SpatialClipper::clip(&normalized, &self.ctx.polygon)
            .map_err(|e| (Stage::Clip, e))?;

        WseRasterIo::write_wse(&clipped, artifact_path).map_err(|e| (Stage::Persist, e))?;
        log::info!("Saved filtered data to {}", artifact_path.display());
        Ok(())
    }
}

/// Delete a raw download; failures are warnings, never run errors
fn cleanup_raw(raw_path: &Path) {
    if raw_path.exists() {
        match std::fs::remove_file(raw_path) {
            Ok(()) => log::info!("Deleted the raw file: {}", raw_path.display()),
            Err(e) => log::warn!("Could not delete {}: {}", raw_path.display(), e),
        }
    } else {
        log::warn!("Raw file not found for cleanup: {}", raw_path.display());
    }
}

/// Trailing discovery window of `days` days, anchored at today (UTC)
pub fn trailing_window(days: i64) -> (NaiveDate, NaiveDate) {
    let end = Utc::now().date_naive();
    let start = end - Duration::days(days);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clip::ReferencePolygon;
    use tempfile::TempDir;

    fn granule() -> Granule {
        Granule {
            native_id:
                "SWOT_L2_HR_Raster_100m_UTM45V_N_x_x_x_009_023_131F_20240310T113044_20240310T113105_PIC0_01"
                    .to_string(),
            tile_id: "009_023_131".to_string(),
            acquisition_date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            source_projection: SourceProjection::Utm { zone: 45 },
            data_urls: vec!["https://example.com/g.nc".to_string()],
        }
    }

    fn context(root: &Path) -> RunContext {
        let polygon = ReferencePolygon::from_rings(vec![vec![vec![
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
            (0.0, 0.0),
        ]]])
        .unwrap();
        RunContext::new(root, UtmZone::north(45), polygon).unwrap()
    }

    #[test]
    fn test_run_directories_created() {
        let dir = TempDir::new().unwrap();
        context(dir.path());
        assert!(dir.path().join(DOWNLOAD_DIR).is_dir());
        assert!(dir.path().join(OUTPUT_DIR).is_dir());
        assert!(dir.path().join(LOG_DIR).is_dir());
    }

    #[test]
    fn test_artifact_naming() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let path = ctx.artifact_path(&granule());
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "SWOT_BD_20240310_009_023_131_wse.nc"
        );
        assert!(path.starts_with(dir.path().join(OUTPUT_DIR)));
    }

    #[test]
    fn test_raw_path_is_under_download_dir() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        assert!(ctx.raw_path(&granule()).starts_with(dir.path().join(DOWNLOAD_DIR)));
    }

    #[test]
    fn test_trailing_window_length() {
        let (start, end) = trailing_window(18);
        assert_eq!((end - start).num_days(), 18);
    }

    #[test]
    fn test_cleanup_missing_file_never_panics() {
        let dir = TempDir::new().unwrap();
        cleanup_raw(&dir.path().join("nothing-here.nc"));
    }
}
