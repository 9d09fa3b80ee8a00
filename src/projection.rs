// projection.rs

use crate::mesh::Mesh;
use log::debug;
use proj::Proj;
use thiserror::Error;

/// Every mesh is drawn in geographic longitude/latitude.
pub const TARGET_CRS: &str = "EPSG:4326";

#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("Cannot build transformation from {from} to {to}: {message}")]
    Create {
        from: String,
        to: String,
        message: String,
    },

    #[error("Failed to reproject coordinates: {0}")]
    Convert(#[from] proj::ProjError),
}

/// Whether coordinates in `crs` are already longitude/latitude on WGS84.
pub fn is_geographic(crs: &str) -> bool {
    matches!(
        crs.trim().to_uppercase().as_str(),
        "EPSG:4326" | "OGC:CRS84" | "CRS:84" | "WGS84"
    )
}

/// Reprojects every ring of the mesh to `TARGET_CRS` in place.
pub fn to_geographic(mesh: &mut Mesh) -> Result<(), ProjectionError> {
    if is_geographic(&mesh.crs) {
        debug!("Mesh already in {}, no reprojection needed", mesh.crs);
        return Ok(());
    }

    // new_known_crs normalizes axis order, so output is (longitude, latitude).
    let transform =
        Proj::new_known_crs(&mesh.crs, TARGET_CRS, None).map_err(|e| ProjectionError::Create {
            from: mesh.crs.clone(),
            to: TARGET_CRS.to_string(),
            message: e.to_string(),
        })?;

    let mut converted = 0usize;
    for feature in mesh.features.iter_mut() {
        for polygon in feature.polygons.iter_mut() {
            for ring in polygon.rings_mut() {
                transform.convert_array(ring.as_mut_slice())?;
                converted += ring.len();
            }
        }
    }

    debug!("Reprojected {} coordinates from {} to {}", converted, mesh.crs, TARGET_CRS);
    mesh.crs = TARGET_CRS.to_string();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MeshFeature, MeshPolygon};
    use approx::assert_abs_diff_eq;

    fn single_square(crs: &str, ring: Vec<(f64, f64)>) -> Mesh {
        Mesh {
            crs: crs.to_string(),
            features: vec![MeshFeature {
                polygons: vec![MeshPolygon {
                    exterior: ring,
                    interiors: Vec::new(),
                }],
                ..Default::default()
            }],
            skipped_geometries: 0,
        }
    }

    #[test]
    fn geographic_crs_names() {
        assert!(is_geographic("EPSG:4326"));
        assert!(is_geographic("ogc:crs84"));
        assert!(!is_geographic("EPSG:3031"));
    }

    #[test]
    fn geographic_mesh_is_untouched() {
        let ring = vec![(-60.0, -70.0), (-59.0, -70.0), (-59.0, -69.0)];
        let mut mesh = single_square("OGC:CRS84", ring.clone());
        to_geographic(&mut mesh).unwrap();
        assert_eq!(mesh.features[0].polygons[0].exterior, ring);
        assert_eq!(mesh.crs, "OGC:CRS84");
    }

    #[test]
    fn web_mercator_is_reprojected() {
        // Origin and a point one degree east on the equator.
        let mut mesh = single_square("EPSG:3857", vec![(0.0, 0.0), (111_319.490_793_273_6, 0.0)]);
        to_geographic(&mut mesh).unwrap();

        let ring = &mesh.features[0].polygons[0].exterior;
        assert_abs_diff_eq!(ring[0].0, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ring[0].1, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ring[1].0, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ring[1].1, 0.0, epsilon = 1e-6);
        assert_eq!(mesh.crs, TARGET_CRS);
    }

    #[test]
    fn unknown_crs_is_an_error() {
        let mut mesh = single_square("EPSG:999999", vec![(0.0, 0.0)]);
        assert!(matches!(to_geographic(&mut mesh), Err(ProjectionError::Create { .. })));
    }
}
