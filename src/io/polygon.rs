use crate::core::clip::{ReferencePolygon, Ring};
use crate::core::reproject::spatial_ref_for_epsg;
use crate::types::{PipelineResult, UtmZone};
use gdal::spatial_ref::CoordTransform;
use gdal::vector::{Geometry, LayerAccess};
use gdal::Dataset;
use gdal_sys::OGRwkbGeometryType;
use std::path::Path;

/// Loads the clip boundary from a vector file (GeoJSON, Shapefile, ...)
/// and expresses it in the canonical projection.
pub struct PolygonReader;

impl PolygonReader {
    /// Read every polygon feature of the first layer, reproject it from the
    /// layer CRS (assumed WGS84 when undeclared) into the canonical zone,
    /// and collapse the result into one multi-polygon clip boundary.
    pub fn load<P: AsRef<Path>>(path: P, canonical: UtmZone) -> PipelineResult<ReferencePolygon> {
        let path = path.as_ref();
        log::info!("Loading reference polygon from {}", path.display());

        let dataset = Dataset::open(path)?;
        let mut layer = dataset.layer(0)?;

        let source_srs = match layer.spatial_ref() {
            Some(srs) => {
                srs.set_axis_mapping_strategy(
                    gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER,
                );
                srs
            }
            None => {
                log::warn!(
                    "Polygon file {} declares no CRS, assuming EPSG:4326",
                    path.display()
                );
                spatial_ref_for_epsg(4326)?
            }
        };
        let target_srs = spatial_ref_for_epsg(canonical.epsg())?;
        let transform = CoordTransform::new(&source_srs, &target_srs)?;

        let mut polygons: Vec<Vec<Ring>> = Vec::new();
        for feature in layer.features() {
            let Some(geometry) = feature.geometry() else {
                continue;
            };
            collect_polygons(geometry, &mut polygons);
        }

        for rings in polygons.iter_mut() {
            for ring in rings.iter_mut() {
                transform_ring(&transform, ring)?;
            }
        }

        log::info!(
            "Reference polygon: {} polygon(s) reprojected to {}",
            polygons.len(),
            canonical
        );
        ReferencePolygon::from_rings(polygons)
    }
}

/// Reproject one ring's vertices in place
fn transform_ring(transform: &CoordTransform, ring: &mut Ring) -> PipelineResult<()> {
    let mut xs: Vec<f64> = ring.iter().map(|&(x, _)| x).collect();
    let mut ys: Vec<f64> = ring.iter().map(|&(_, y)| y).collect();
    let mut zs = vec![0.0; ring.len()];
    transform.transform_coords(&mut xs, &mut ys, &mut zs)?;
    for (vertex, (x, y)) in ring.iter_mut().zip(xs.into_iter().zip(ys)) {
        *vertex = (x, y);
    }
    Ok(())
}

/// Walk a geometry tree collecting polygon rings; non-areal parts are skipped
fn collect_polygons(geometry: &Geometry, out: &mut Vec<Vec<Ring>>) {
    let geometry_type = geometry.geometry_type();
    if geometry_type == OGRwkbGeometryType::wkbPolygon
        || geometry_type == OGRwkbGeometryType::wkbPolygon25D
    {
        let mut rings: Vec<Ring> = Vec::new();
        for i in 0..geometry.geometry_count() {
            let ring = geometry.get_geometry(i);
            let points: Ring = ring
                .get_point_vec()
                .into_iter()
                .map(|(x, y, _z)| (x, y))
                .collect();
            if points.len() >= 3 {
                rings.push(points);
            }
        }
        if !rings.is_empty() {
            out.push(rings);
        }
    } else if geometry_type == OGRwkbGeometryType::wkbMultiPolygon
        || geometry_type == OGRwkbGeometryType::wkbMultiPolygon25D
        || geometry_type == OGRwkbGeometryType::wkbGeometryCollection
    {
        for i in 0..geometry.geometry_count() {
            collect_polygons(&geometry.get_geometry(i), out);
        }
    } else {
        log::warn!(
            "Skipping non-polygon geometry (type {}) in reference file",
            geometry_type
        );
    }
}
