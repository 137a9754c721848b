use crate::types::{PipelineError, PipelineResult, WseGrid};
use ndarray::s;

/// A closed ring of (x, y) vertices in the canonical projection
pub type Ring = Vec<(f64, f64)>;

/// Clip boundary: one or more polygons, each an exterior ring plus holes.
///
/// Loaded once per run (see `io::polygon`) and shared read-only across all
/// granules. Point containment uses the even-odd rule over every ring, so a
/// point inside a hole counts as outside.
#[derive(Debug, Clone)]
pub struct ReferencePolygon {
    polygons: Vec<Vec<Ring>>,
    envelope: (f64, f64, f64, f64), // min_x, min_y, max_x, max_y
}

impl ReferencePolygon {
    /// Build from rings already expressed in the canonical projection.
    /// `polygons[k][0]` is the exterior ring, the rest are holes.
    pub fn from_rings(polygons: Vec<Vec<Ring>>) -> PipelineResult<Self> {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        let mut vertex_count = 0usize;

        for rings in &polygons {
            for ring in rings {
                for &(x, y) in ring {
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                    vertex_count += 1;
                }
            }
        }

        if vertex_count < 3 {
            return Err(PipelineError::Processing(
                "Reference polygon has fewer than 3 vertices".to_string(),
            ));
        }

        Ok(Self {
            polygons,
            envelope: (min_x, min_y, max_x, max_y),
        })
    }

    /// Bounding envelope as (min_x, min_y, max_x, max_y)
    pub fn envelope(&self) -> (f64, f64, f64, f64) {
        self.envelope
    }

    /// Even-odd containment test for a projected point
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let (min_x, min_y, max_x, max_y) = self.envelope;
        if x < min_x || x > max_x || y < min_y || y > max_y {
            return false;
        }
        self.polygons.iter().any(|rings| {
            let mut crossings = 0usize;
            for ring in rings {
                crossings += ray_crossings(ring, x, y);
            }
            crossings % 2 == 1
        })
    }
}

/// Number of times a leftward horizontal ray from (x, y) crosses ring edges
fn ray_crossings(ring: &Ring, x: f64, y: f64) -> usize {
    let n = ring.len();
    if n < 3 {
        return 0;
    }
    let mut crossings = 0usize;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > y) != (yj > y) {
            let x_cross = (xj - xi) * (y - yi) / (yj - yi) + xi;
            if x < x_cross {
                crossings += 1;
            }
        }
        j = i;
    }
    crossings
}

/// Restricts a canonical-CRS grid to the reference polygon.
pub struct SpatialClipper;

impl SpatialClipper {
    /// Trim the grid to the polygon envelope, then mask every cell whose
    /// center lies outside the polygon to NaN. A granule whose footprint
    /// misses the polygon entirely, or that keeps no finite cell, is a
    /// recoverable per-granule failure.
    pub fn clip(grid: &WseGrid, polygon: &ReferencePolygon) -> PipelineResult<WseGrid> {
        let (rows, cols) = grid.dim();
        let (min_x, min_y, max_x, max_y) = polygon.envelope();

        // Row/column ranges whose cell centers can intersect the envelope
        let col_range: Vec<usize> = (0..cols)
            .filter(|&j| grid.x[j] >= min_x && grid.x[j] <= max_x)
            .collect();
        let row_range: Vec<usize> = (0..rows)
            .filter(|&i| grid.y[i] >= min_y && grid.y[i] <= max_y)
            .collect();

        if col_range.is_empty() || row_range.is_empty() {
            return Err(PipelineError::EmptyIntersection(
                "granule footprint does not overlap the reference polygon".to_string(),
            ));
        }

        let (r0, r1) = (row_range[0], row_range[row_range.len() - 1]);
        let (c0, c1) = (col_range[0], col_range[col_range.len() - 1]);

        let mut data = grid.data.slice(s![r0..=r1, c0..=c1]).to_owned();
        let x: Vec<f64> = grid.x[c0..=c1].to_vec();
        let y: Vec<f64> = grid.y[r0..=r1].to_vec();

        let mut kept = 0usize;
        for i in 0..data.nrows() {
            for j in 0..data.ncols() {
                if polygon.contains(x[j], y[i]) {
                    if !data[[i, j]].is_nan() {
                        kept += 1;
                    }
                } else {
                    data[[i, j]] = f32::NAN;
                }
            }
        }

        if kept == 0 {
            return Err(PipelineError::EmptyIntersection(
                "no finite wse cell inside the reference polygon".to_string(),
            ));
        }

        log::debug!("Clip kept {} finite cells of {}x{}", kept, data.nrows(), data.ncols());

        Ok(WseGrid {
            data,
            x,
            y,
            epsg: grid.epsg,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn square_polygon(x0: f64, y0: f64, x1: f64, y1: f64) -> ReferencePolygon {
        ReferencePolygon::from_rings(vec![vec![vec![
            (x0, y0),
            (x1, y0),
            (x1, y1),
            (x0, y1),
            (x0, y0),
        ]]])
        .unwrap()
    }

    fn grid_4x4() -> WseGrid {
        // Cell centers at x = 50..350, y = 350..50, 100 m spacing
        let x: Vec<f64> = (0..4).map(|j| 50.0 + j as f64 * 100.0).collect();
        let y: Vec<f64> = (0..4).map(|i| 350.0 - i as f64 * 100.0).collect();
        let data = Array2::from_shape_vec((4, 4), (1..=16).map(|v| v as f32).collect()).unwrap();
        WseGrid { data, x, y, epsg: 32645 }
    }

    #[test]
    fn test_point_in_polygon() {
        let poly = square_polygon(0.0, 0.0, 100.0, 100.0);
        assert!(poly.contains(50.0, 50.0));
        assert!(!poly.contains(150.0, 50.0));
        assert!(!poly.contains(-1.0, 50.0));
    }

    #[test]
    fn test_hole_counts_as_outside() {
        let poly = ReferencePolygon::from_rings(vec![vec![
            vec![(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0), (0.0, 0.0)],
            vec![(40.0, 40.0), (60.0, 40.0), (60.0, 60.0), (40.0, 60.0), (40.0, 40.0)],
        ]])
        .unwrap();
        assert!(poly.contains(20.0, 20.0));
        assert!(!poly.contains(50.0, 50.0));
    }

    #[test]
    fn test_no_finite_values_outside_polygon() {
        // Polygon covers only the lower-left quadrant of the grid
        let poly = square_polygon(0.0, 0.0, 200.0, 200.0);
        let grid = grid_4x4();
        let clipped = SpatialClipper::clip(&grid, &poly).unwrap();

        for i in 0..clipped.data.nrows() {
            for j in 0..clipped.data.ncols() {
                let inside = poly.contains(clipped.x[j], clipped.y[i]);
                if !inside {
                    assert!(
                        clipped.data[[i, j]].is_nan(),
                        "cell at ({}, {}) outside polygon is finite",
                        clipped.x[j],
                        clipped.y[i]
                    );
                }
            }
        }
        assert!(clipped.valid_count() > 0);
    }

    #[test]
    fn test_extent_trimmed_to_envelope() {
        let poly = square_polygon(0.0, 0.0, 200.0, 200.0);
        let grid = grid_4x4();
        let clipped = SpatialClipper::clip(&grid, &poly).unwrap();
        // Only the two lower rows / two left columns survive the trim
        assert_eq!(clipped.dim(), (2, 2));
        assert!(clipped.x.iter().all(|&x| x <= 200.0));
        assert!(clipped.y.iter().all(|&y| y <= 200.0));
    }

    #[test]
    fn test_disjoint_footprint_is_empty_intersection() {
        let poly = square_polygon(10_000.0, 10_000.0, 20_000.0, 20_000.0);
        let grid = grid_4x4();
        let err = SpatialClipper::clip(&grid, &poly).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyIntersection(_)));
    }

    #[test]
    fn test_all_nan_inside_polygon_is_empty_intersection() {
        let poly = square_polygon(0.0, 0.0, 200.0, 200.0);
        let mut grid = grid_4x4();
        grid.data.fill(f32::NAN);
        let err = SpatialClipper::clip(&grid, &poly).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyIntersection(_)));
    }
}
