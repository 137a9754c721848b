use crate::types::{PipelineError, PipelineResult, WseGrid};

/// Quantile filter parameters
#[derive(Debug, Clone, Copy)]
pub struct QuantileParams {
    /// Lower quantile bound (fraction in [0, 1])
    pub low: f64,
    /// Upper quantile bound (fraction in [0, 1])
    pub high: f64,
}

impl Default for QuantileParams {
    fn default() -> Self {
        // Per-granule 5th/95th percentile band
        Self { low: 0.05, high: 0.95 }
    }
}

/// Per-granule outlier filter masking wse values outside a quantile band
pub struct QuantileFilter {
    params: QuantileParams,
}

impl QuantileFilter {
    pub fn new() -> Self {
        Self {
            params: QuantileParams::default(),
        }
    }

    pub fn with_params(params: QuantileParams) -> Self {
        Self { params }
    }

    /// Mask every cell outside [p_low, p_high] of the granule's own wse
    /// distribution to NaN. Grid shape is unchanged; quantiles ignore NaN
    /// cells. An all-NaN grid has no defined quantiles and is rejected so
    /// the caller can skip the granule.
    pub fn apply(&self, grid: &WseGrid) -> PipelineResult<WseGrid> {
        if self.params.low < 0.0 || self.params.high > 1.0 || self.params.low > self.params.high {
            return Err(PipelineError::Processing(format!(
                "Invalid quantile band [{}, {}]",
                self.params.low, self.params.high
            )));
        }

        let (low, high) = self.quantile_band(grid).ok_or_else(|| {
            PipelineError::DegenerateQuantiles(
                "wse variable contains no finite values".to_string(),
            )
        })?;

        log::info!("Quantiles for wse: low={}, high={}", low, high);

        let mut out = grid.clone();
        out.data.mapv_inplace(|v| {
            if v.is_nan() || v < low || v > high {
                f32::NAN
            } else {
                v
            }
        });

        Ok(out)
    }

    /// Compute the (p_low, p_high) values over the finite cells only.
    /// Returns None when no finite cell exists.
    fn quantile_band(&self, grid: &WseGrid) -> Option<(f32, f32)> {
        let mut values: Vec<f32> = grid.data.iter().copied().filter(|v| !v.is_nan()).collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let low = percentile_sorted(&values, self.params.low);
        let high = percentile_sorted(&values, self.params.high);
        Some((low, high))
    }
}

impl Default for QuantileFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear-interpolated percentile of an ascending-sorted, NaN-free slice
fn percentile_sorted(sorted: &[f32], q: f64) -> f32 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = (pos - lo as f64) as f32;
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}
