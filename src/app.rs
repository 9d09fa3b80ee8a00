// app.rs

use crate::colormap::{Colormap, Rgba};
use crate::mesh::read_mesh;
use crate::projection::to_geographic;
use crate::render::{Figure, Layer, render_mesh};
use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const DEFAULT_XSCALE: f64 = 40.0;
pub const DEFAULT_YSCALE: f64 = 30.0;
pub const DEFAULT_DPI: u32 = 180;
pub const DEFAULT_CRITERIA: &str = "SIC";

/// Criteria that switches to the fuel colormap and adds the inaccessible layer.
pub const FUEL_CRITERIA: &str = "fuel";

const DEFAULT_COLORMAP: &str = "coolwarm";
const FUEL_COLORMAP: &str = "Wistia";
const INACCESSIBLE_COLUMN: &str = "inaccessible";
const INACCESSIBLE_COLORMAP: &str = "RdYlBu";
const LAND_COLUMN: &str = "land";
const LAND_COLORMAP: &str = "copper";

const CELL_EDGE_COLOR: Rgba = Rgba::new(128.0 / 255.0, 128.0 / 255.0, 128.0 / 255.0, 1.0); // grey
const LAND_EDGE_COLOR: Rgba = Rgba::new(165.0 / 255.0, 42.0 / 255.0, 42.0 / 255.0, 1.0); // brown
const EDGE_WIDTH: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Palette {
    Default,
    Amsr2,
}

/// Everything needed to turn a mesh file into an image.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub xscale: f64,
    pub yscale: f64,
    pub dpi: u32,
    pub palette: Palette,
    pub criteria: String,
    pub vmin: Option<f64>,
    pub vmax: Option<f64>,
    pub draw_axes: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            xscale: DEFAULT_XSCALE,
            yscale: DEFAULT_YSCALE,
            dpi: DEFAULT_DPI,
            palette: Palette::Default,
            criteria: DEFAULT_CRITERIA.to_string(),
            vmin: None,
            vmax: None,
            draw_axes: true,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<()> {
        if let (Some(vmin), Some(vmax)) = (self.vmin, self.vmax) {
            if vmin >= vmax {
                bail!("vmin ({}) must be lower than vmax ({})", vmin, vmax);
            }
        }
        self.figure()?;
        Ok(())
    }

    pub fn figure(&self) -> Result<Figure> {
        Ok(Figure::new(self.xscale, self.yscale, self.dpi as f64)?)
    }

    pub fn is_fuel(&self) -> bool {
        self.criteria == FUEL_CRITERIA
    }

    /// The layers drawn for every file, bottom first.
    ///
    /// The land overlay only paints cells whose `land` value is set. Painting
    /// every cell, as a plain `copper` pass over the whole column would, turns
    /// sea cells black and hides the criteria layer underneath.
    pub fn layers(&self) -> Result<Vec<Layer>> {
        let mut layers = Vec::new();

        if self.is_fuel() {
            layers.push(Layer::new(
                INACCESSIBLE_COLUMN,
                Colormap::named(INACCESSIBLE_COLORMAP)?,
            ));
        }

        let colormap = match self.palette {
            Palette::Amsr2 => Colormap::amsr2(),
            Palette::Default if self.is_fuel() => Colormap::named(FUEL_COLORMAP)?,
            Palette::Default => Colormap::named(DEFAULT_COLORMAP)?,
        };
        layers.push(
            Layer::new(&self.criteria, colormap)
                .edges(CELL_EDGE_COLOR, EDGE_WIDTH)
                .limits(self.vmin, self.vmax)
                .required(),
        );

        layers.push(
            Layer::new(LAND_COLUMN, Colormap::named(LAND_COLORMAP)?)
                .edges(LAND_EDGE_COLOR, EDGE_WIDTH)
                .mask_unset(),
        );

        Ok(layers)
    }
}

/// From the command-line arguments, keep the files that actually exist.
pub fn check_input_filenames(input_filenames: &[PathBuf]) -> Vec<PathBuf> {
    let mut existing = Vec::new();

    for filename in input_filenames {
        if !filename.is_file() {
            println!(
                "Filename {} is not a file (or doesn't exist): Ignoring",
                filename.display()
            );
            continue;
        }

        match std::path::absolute(filename) {
            Ok(path) => {
                println!("Including filename: {}", filename.display());
                existing.push(path);
            }
            Err(e) => println!(
                "Filename {} cannot be resolved ({}): Ignoring",
                filename.display(),
                e
            ),
        }
    }

    existing
}

/// The image is written next to its input as `<input>.png`.
pub fn output_path(input: &Path) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(".png");
    PathBuf::from(name)
}

/// Reads, reprojects and renders one mesh file. Returns the written image path.
pub fn convert_to_png(geojson_path: &Path, config: &RenderConfig) -> Result<PathBuf> {
    let mut mesh = read_mesh(geojson_path)
        .with_context(|| format!("Failed to read {}", geojson_path.display()))?;
    debug!(
        "{}: {} features in {}",
        geojson_path.display(),
        mesh.features.len(),
        mesh.crs
    );
    if mesh.skipped_geometries > 0 {
        warn!(
            "{}: ignoring {} non-polygon geometries",
            geojson_path.display(),
            mesh.skipped_geometries
        );
    }

    to_geographic(&mut mesh)
        .with_context(|| format!("Failed to reproject {}", geojson_path.display()))?;

    let figure = config.figure()?;
    let layers = config.layers()?;
    for layer in &layers {
        debug!(
            "Layer '{}' with {} ({} colors)",
            layer.column,
            layer.colormap.name(),
            layer.colormap.len()
        );
    }
    let output = output_path(geojson_path);
    render_mesh(&mesh, &layers, &figure, config.draw_axes, &output)
        .with_context(|| format!("Failed to render {}", geojson_path.display()))?;

    info!("Wrote {} ({}x{} px)", output.display(), figure.width, figure.height);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SIC_MESH: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-60, -70], [-59, -70], [-59, -69], [-60, -69], [-60, -70]]]
                },
                "properties": {"SIC": 42.0, "land": false, "fuel": 1.5, "inaccessible": false}
            },
            {
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-59, -70], [-58, -70], [-58, -69], [-59, -69], [-59, -70]]]
                },
                "properties": {"SIC": 0.0, "land": true, "fuel": null, "inaccessible": true}
            }
        ]
    }"#;

    fn small_config() -> RenderConfig {
        RenderConfig {
            xscale: 2.0,
            yscale: 1.5,
            dpi: 40,
            draw_axes: false,
            ..Default::default()
        }
    }

    #[test]
    fn defaults_match_cli_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.xscale, 40.0);
        assert_eq!(config.yscale, 30.0);
        assert_eq!(config.dpi, 180);
        assert_eq!(config.criteria, "SIC");
        assert_eq!(config.palette, Palette::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_layer_stack() {
        let layers = RenderConfig::default().layers().unwrap();
        let columns: Vec<&str> = layers.iter().map(|l| l.column.as_str()).collect();
        assert_eq!(columns, ["SIC", "land"]);
        assert_eq!(layers[0].colormap.name(), "coolwarm");
        assert_eq!(layers[0].edge_color, Some(CELL_EDGE_COLOR));
        assert!(layers[0].required);
        assert_eq!(layers[1].colormap.name(), "copper");
        assert_eq!(layers[1].edge_color, Some(LAND_EDGE_COLOR));
        assert!(layers[1].mask_unset);
        assert!(!layers[1].required);
    }

    #[test]
    fn fuel_adds_inaccessible_underlay() {
        let config = RenderConfig {
            criteria: FUEL_CRITERIA.to_string(),
            ..Default::default()
        };
        let layers = config.layers().unwrap();
        let columns: Vec<&str> = layers.iter().map(|l| l.column.as_str()).collect();
        assert_eq!(columns, ["inaccessible", "fuel", "land"]);
        assert_eq!(layers[0].colormap.name(), "RdYlBu");
        assert!(layers[0].edge_color.is_none());
        assert_eq!(layers[1].colormap.name(), "Wistia");
    }

    #[test]
    fn amsr_palette_overrides_fuel_colormap() {
        let config = RenderConfig {
            criteria: FUEL_CRITERIA.to_string(),
            palette: Palette::Amsr2,
            ..Default::default()
        };
        let layers = config.layers().unwrap();
        assert_eq!(layers[1].colormap.name(), "amsr2");
        assert_eq!(layers[1].colormap.len(), 100);
    }

    #[test]
    fn inverted_limits_are_rejected() {
        let config = RenderConfig {
            vmin: Some(50.0),
            vmax: Some(10.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let zero_width = RenderConfig {
            xscale: 0.0,
            ..Default::default()
        };
        assert!(zero_width.validate().is_err());
    }

    #[test]
    fn output_path_appends_png() {
        assert_eq!(
            output_path(Path::new("/data/mesh.vessel.json")),
            PathBuf::from("/data/mesh.vessel.json.png")
        );
        assert_eq!(output_path(Path::new("mesh")), PathBuf::from("mesh.png"));
    }

    #[test]
    fn only_existing_files_survive() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("mesh.geojson");
        fs::write(&present, SIC_MESH).unwrap();
        let missing = dir.path().join("missing.geojson");

        let checked = check_input_filenames(&[missing, present.clone(), dir.path().to_path_buf()]);
        assert_eq!(checked, vec![present]);
        assert!(checked[0].is_absolute());
    }

    #[test]
    fn convert_writes_png_next_to_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("mesh.geojson");
        fs::write(&input, SIC_MESH).unwrap();

        let written = convert_to_png(&input, &small_config()).unwrap();
        assert_eq!(written, dir.path().join("mesh.geojson.png"));
        let bytes = fs::read(&written).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn convert_fuel_with_amsr_palette() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("fuel.geojson");
        fs::write(&input, SIC_MESH).unwrap();

        let config = RenderConfig {
            criteria: FUEL_CRITERIA.to_string(),
            palette: Palette::Amsr2,
            ..small_config()
        };
        assert!(convert_to_png(&input, &config).unwrap().exists());
    }

    #[test]
    fn convert_fails_on_unknown_criteria() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("mesh.geojson");
        fs::write(&input, SIC_MESH).unwrap();

        let config = RenderConfig {
            criteria: "speed".to_string(),
            ..small_config()
        };
        let err = convert_to_png(&input, &config).unwrap_err();
        assert!(format!("{:#}", err).contains("speed"));
        assert!(!output_path(&input).exists());
    }

    #[test]
    fn convert_fails_on_invalid_geojson() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.geojson");
        fs::write(&input, "{\"type\": \"FeatureCollection\"").unwrap();
        assert!(convert_to_png(&input, &small_config()).is_err());
    }
}
