//! Granule processing chain: quantile filter -> CRS normalization -> clip,
//! exercised through the public API the orchestrator uses.

use ndarray::Array2;
use swotpipe::{
    CrsNormalizer, QuantileFilter, ReferencePolygon, SourceProjection, SpatialClipper, UtmZone,
    WseGrid,
};

fn zone46_grid() -> WseGrid {
    // 10x10 grid at 100 m spacing in UTM zone 46N, near the zone-45 boundary.
    // Values are a plausible 1-2 m water surface plus two gross outliers and
    // a no-data hole.
    let x: Vec<f64> = (0..10).map(|j| 200_050.0 + j as f64 * 100.0).collect();
    let y: Vec<f64> = (0..10).map(|i| 2_600_950.0 - i as f64 * 100.0).collect();
    let mut values: Vec<f32> = (0..100).map(|k| 1.0 + (k % 10) as f32 * 0.1).collect();
    values[3] = -500.0;
    values[57] = 1500.0;
    values[42] = f32::NAN;
    WseGrid {
        data: Array2::from_shape_vec((10, 10), values).unwrap(),
        x,
        y,
        epsg: 32646,
    }
}

#[test]
fn test_alternate_zone_granule_end_to_end() {
    let grid = zone46_grid();

    // Quantile filter drops the outliers, keeps the shape
    let filtered = QuantileFilter::new().apply(&grid).unwrap();
    assert_eq!(filtered.dim(), (10, 10));
    assert!(!filtered.data.iter().any(|v| *v == -500.0 || *v == 1500.0));
    assert!(filtered.data[[4, 2]].is_nan());

    // Normalizer resamples into zone 45
    let normalizer = CrsNormalizer::new(UtmZone::north(45), &[44, 46]);
    let normalized = normalizer
        .normalize(
            &filtered,
            "SWOT_L2_HR_Raster_100m_UTM46V_N_x_x_x_010_100_050F_PIC0_01",
            SourceProjection::Utm { zone: 46 },
        )
        .unwrap();
    assert_eq!(normalized.epsg, 32645);

    // Nearest-neighbor only: every finite value existed in the filtered grid
    let inputs: Vec<f32> = filtered
        .data
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .collect();
    for &v in normalized.data.iter() {
        if !v.is_nan() {
            assert!(inputs.contains(&v));
        }
    }

    // Clip to a box covering the western half of the normalized footprint
    let x0 = normalized.x[0];
    let x1 = normalized.x[normalized.x.len() / 2];
    let y_lo = *normalized
        .y
        .last()
        .unwrap();
    let y_hi = normalized.y[0];
    let polygon = ReferencePolygon::from_rings(vec![vec![vec![
        (x0 - 50.0, y_lo - 50.0),
        (x1, y_lo - 50.0),
        (x1, y_hi + 50.0),
        (x0 - 50.0, y_hi + 50.0),
        (x0 - 50.0, y_lo - 50.0),
    ]]])
    .unwrap();

    let clipped = SpatialClipper::clip(&normalized, &polygon).unwrap();
    assert!(clipped.valid_count() > 0);
    for i in 0..clipped.data.nrows() {
        for j in 0..clipped.data.ncols() {
            if !clipped.data[[i, j]].is_nan() {
                assert!(
                    polygon.contains(clipped.x[j], clipped.y[i]),
                    "finite value outside the reference polygon"
                );
            }
        }
    }
}

#[test]
fn test_canonical_zone_granule_is_not_resampled() {
    let mut grid = zone46_grid();
    grid.epsg = 32645;

    let normalizer = CrsNormalizer::new(UtmZone::north(45), &[44, 46]);
    let normalized = normalizer
        .normalize(
            &grid,
            "SWOT_L2_HR_Raster_100m_UTM45V_N_x_x_x_009_023_131F_PIC0_01",
            SourceProjection::Utm { zone: 45 },
        )
        .unwrap();

    assert_eq!(normalized.epsg, 32645);
    assert_eq!(normalized.x, grid.x);
    assert_eq!(normalized.y, grid.y);
    assert!(normalized.data[[4, 2]].is_nan());
    assert_eq!(normalized.data[[0, 0]], grid.data[[0, 0]]);
}
