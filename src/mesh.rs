// mesh.rs

use geojson::{GeoJson, JsonObject, Value};
use log::debug;
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// CRS assumed for GeoJSON documents that do not declare one.
pub const DEFAULT_CRS: &str = "EPSG:4326";

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("GeoJSON parse error: {0}")]
    Parse(#[from] geojson::Error),
}

/// A polygon as an exterior ring followed by zero or more holes.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPolygon {
    pub exterior: Vec<(f64, f64)>,
    pub interiors: Vec<Vec<(f64, f64)>>,
}

impl MeshPolygon {
    pub fn rings(&self) -> impl Iterator<Item = &Vec<(f64, f64)>> {
        std::iter::once(&self.exterior).chain(self.interiors.iter())
    }

    pub fn rings_mut(&mut self) -> impl Iterator<Item = &mut Vec<(f64, f64)>> {
        std::iter::once(&mut self.exterior).chain(self.interiors.iter_mut())
    }
}

/// One mesh cell: its polygonal geometry and its attribute columns.
#[derive(Debug, Clone, Default)]
pub struct MeshFeature {
    pub polygons: Vec<MeshPolygon>,
    pub properties: JsonObject,
}

#[derive(Debug, Clone)]
pub struct Mesh {
    pub crs: String,
    pub features: Vec<MeshFeature>,
    /// Geometries that are neither polygons nor collections of polygons.
    pub skipped_geometries: usize,
}

/// The values of one attribute across every feature of a mesh.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Categorical {
        values: Vec<Option<String>>,
        categories: Vec<String>,
    },
}

pub fn read_mesh(path: &Path) -> Result<Mesh, MeshError> {
    let file = fs::File::open(path)?;
    let reader = io::BufReader::new(file);
    let geojson = GeoJson::from_reader(reader).map_err(geojson::Error::from)?;
    Ok(Mesh::from_geojson(geojson))
}

impl Mesh {
    pub fn from_geojson(geojson: GeoJson) -> Self {
        let mut mesh = Mesh {
            crs: DEFAULT_CRS.to_string(),
            features: Vec::new(),
            skipped_geometries: 0,
        };

        match geojson {
            GeoJson::FeatureCollection(collection) => {
                if let Some(crs) = collection.foreign_members.as_ref().and_then(declared_crs) {
                    mesh.crs = crs;
                }
                for feature in collection.features {
                    let properties = feature.properties.unwrap_or_default();
                    mesh.push_feature(feature.geometry.as_ref(), properties);
                }
            }
            GeoJson::Feature(feature) => {
                if let Some(crs) = feature.foreign_members.as_ref().and_then(declared_crs) {
                    mesh.crs = crs;
                }
                let properties = feature.properties.unwrap_or_default();
                mesh.push_feature(feature.geometry.as_ref(), properties);
            }
            GeoJson::Geometry(geometry) => {
                // A bare geometry is a single feature without attributes.
                mesh.push_feature(Some(&geometry), JsonObject::new());
            }
        }

        debug!(
            "Read {} features (crs {}, {} non-polygon geometries skipped)",
            mesh.features.len(),
            mesh.crs,
            mesh.skipped_geometries
        );
        mesh
    }

    fn push_feature(&mut self, geometry: Option<&geojson::Geometry>, properties: JsonObject) {
        let mut polygons = Vec::new();
        if let Some(geometry) = geometry {
            self.skipped_geometries += collect_polygons(&geometry.value, &mut polygons);
        }
        self.features.push(MeshFeature { polygons, properties });
    }

    /// [min_x, min_y, max_x, max_y] over every ring coordinate.
    pub fn bounds(&self) -> Option<[f64; 4]> {
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;

        for polygon in self.features.iter().flat_map(|f| f.polygons.iter()) {
            for &(x, y) in polygon.rings().flatten() {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }

        if min_x == f64::MAX {
            None
        } else {
            Some([min_x, min_y, max_x, max_y])
        }
    }

    /// Collects the named property across all features, or `None` if no
    /// feature carries it.
    pub fn column(&self, name: &str) -> Option<Column> {
        if !self.features.iter().any(|f| f.properties.contains_key(name)) {
            return None;
        }

        let raw: Vec<Option<&JsonValue>> = self
            .features
            .iter()
            .map(|f| f.properties.get(name).filter(|v| !v.is_null()))
            .collect();

        let all_numeric = raw
            .iter()
            .flatten()
            .all(|v| v.is_number() || v.is_boolean());

        if all_numeric {
            let values = raw.iter().map(|v| v.and_then(numeric_value)).collect();
            return Some(Column::Numeric(values));
        }

        let values: Vec<Option<String>> = raw.iter().map(|v| v.map(category_label)).collect();
        let categories: Vec<String> = values
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Some(Column::Categorical { values, categories })
    }
}

impl Column {
    /// Normalizes every value onto [0, 1]. Numeric columns use `vmin`/`vmax`
    /// when given and the data range otherwise. Categorical columns work on
    /// the index of each value among the sorted categories, with the limits
    /// defaulting to the first and last index.
    pub fn normalized(&self, vmin: Option<f64>, vmax: Option<f64>) -> Vec<Option<f64>> {
        match self {
            Column::Numeric(values) => {
                let (data_min, data_max) = values
                    .iter()
                    .flatten()
                    .copied()
                    .filter(|v| v.is_finite())
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                        (lo.min(v), hi.max(v))
                    });
                let lo = vmin.unwrap_or(data_min);
                let hi = vmax.unwrap_or(data_max);

                values
                    .iter()
                    .map(|v| (*v).filter(|v| v.is_finite()).map(|v| scale(v, lo, hi)))
                    .collect()
            }
            Column::Categorical { values, categories } => {
                let lo = vmin.unwrap_or(0.0);
                let hi = vmax.unwrap_or(categories.len().saturating_sub(1) as f64);
                values
                    .iter()
                    .map(|v| {
                        let code = categories.binary_search(v.as_ref()?).ok()?;
                        Some(scale(code as f64, lo, hi))
                    })
                    .collect()
            }
        }
    }

    /// Whether each value counts as set: non-zero numbers, `true` and
    /// non-empty strings.
    pub fn truthy(&self) -> Vec<bool> {
        match self {
            Column::Numeric(values) => values
                .iter()
                .map(|v| matches!(v, Some(x) if *x != 0.0 && !x.is_nan()))
                .collect(),
            Column::Categorical { values, .. } => values
                .iter()
                .map(|v| matches!(v, Some(s) if !s.is_empty()))
                .collect(),
        }
    }
}

// A degenerate range maps everything to the low end.
fn scale(v: f64, lo: f64, hi: f64) -> f64 {
    if hi > lo { (v - lo) / (hi - lo) } else { 0.0 }
}

fn numeric_value(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        JsonValue::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn category_label(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Appends every polygon found in `value` to `out` and returns the number of
/// geometries that could not be drawn as polygons.
fn collect_polygons(value: &Value, out: &mut Vec<MeshPolygon>) -> usize {
    match value {
        Value::Polygon(rings) => {
            out.extend(to_polygon(rings));
            0
        }
        Value::MultiPolygon(polygons) => {
            out.extend(polygons.iter().filter_map(|rings| to_polygon(rings)));
            0
        }
        Value::GeometryCollection(geometries) => geometries
            .iter()
            .map(|geometry| collect_polygons(&geometry.value, out))
            .sum(),
        _ => 1,
    }
}

fn to_polygon(rings: &[Vec<Vec<f64>>]) -> Option<MeshPolygon> {
    let mut rings = rings.iter().map(|ring| {
        ring.iter()
            .filter(|position| position.len() >= 2)
            .map(|position| (position[0], position[1]))
            .collect::<Vec<_>>()
    });
    let exterior = rings.next()?;
    Some(MeshPolygon {
        exterior,
        interiors: rings.collect(),
    })
}

/// Reads the legacy `crs` member, e.g.
/// `{"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3031"}}`.
fn declared_crs(members: &JsonObject) -> Option<String> {
    let name = members.get("crs")?.get("properties")?.get("name")?.as_str()?;
    Some(normalize_crs_name(name))
}

/// Rewrites OGC URNs into the short `AUTHORITY:CODE` form PROJ accepts.
pub fn normalize_crs_name(name: &str) -> String {
    let trimmed = name.trim();
    if let Some(rest) = trimmed.strip_prefix("urn:ogc:def:crs:") {
        // urn:ogc:def:crs:{authority}:{version}:{code}, the version may be empty.
        let parts: Vec<&str> = rest.split(':').collect();
        if let (Some(authority), Some(code)) = (parts.first(), parts.last()) {
            if parts.len() >= 2 {
                return format!("{}:{}", authority.to_uppercase(), code);
            }
        }
    }
    trimmed.to_string()
}
