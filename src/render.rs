// render.rs

use crate::colormap::{Colormap, Rgba};
use crate::mesh::{Column, Mesh};
use log::{debug, info, warn};
use plotters::prelude::*;
use std::fmt::Display;
use std::ops::Range;
use std::path::Path;
use thiserror::Error;

const POINTS_PER_INCH: f64 = 72.0;
const MAX_DIMENSION: u32 = 65_535;

// Axes box as fractions of the figure, measured from the left and bottom.
const AXES_LEFT: f64 = 0.125;
const AXES_RIGHT: f64 = 0.9;
const AXES_BOTTOM: f64 = 0.11;
const AXES_TOP: f64 = 0.88;

const DATA_MARGIN: f64 = 0.05;
const TICK_LABEL_POINTS: f64 = 10.0;
const FRAME_POINTS: f64 = 0.8;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid figure size {width}x{height} in at {dpi} dpi")]
    InvalidSize { width: f64, height: f64, dpi: f64 },

    #[error("Column '{0}' not found in any feature")]
    MissingColumn(String),

    #[error("Failed to draw figure: {0}")]
    Draw(String),
}

fn draw_err<E: Display>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

/// One pass over the mesh, coloring every feature by a single column.
#[derive(Debug, Clone)]
pub struct Layer {
    pub column: String,
    pub colormap: Colormap,
    pub edge_color: Option<Rgba>,
    pub line_width: f64, // points
    pub vmin: Option<f64>,
    pub vmax: Option<f64>,
    /// Only paint features whose value is set (non-zero, true).
    pub mask_unset: bool,
    /// A missing column fails the render instead of skipping the layer.
    pub required: bool,
}

impl Layer {
    pub fn new(column: &str, colormap: Colormap) -> Self {
        Self {
            column: column.to_string(),
            colormap,
            edge_color: None,
            line_width: 0.5,
            vmin: None,
            vmax: None,
            mask_unset: false,
            required: false,
        }
    }

    pub fn edges(mut self, color: Rgba, width: f64) -> Self {
        self.edge_color = Some(color);
        self.line_width = width;
        self
    }

    pub fn limits(mut self, vmin: Option<f64>, vmax: Option<f64>) -> Self {
        self.vmin = vmin;
        self.vmax = vmax;
        self
    }

    pub fn mask_unset(mut self) -> Self {
        self.mask_unset = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// The fill color of every feature, `None` where the feature is masked.
    fn feature_colors(&self, column: &Column) -> Vec<Option<Rgba>> {
        let normalized = column.normalized(self.vmin, self.vmax);
        let visible = if self.mask_unset {
            column.truthy()
        } else {
            vec![true; normalized.len()]
        };

        normalized
            .into_iter()
            .zip(visible)
            .map(|(value, visible)| visible.then(|| self.colormap.lookup(value)))
            .collect()
    }
}

/// Output image dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Figure {
    pub width: u32,
    pub height: u32,
    pub dpi: f64,
}

impl Figure {
    pub fn new(width_in: f64, height_in: f64, dpi: f64) -> Result<Self, RenderError> {
        let invalid = || RenderError::InvalidSize {
            width: width_in,
            height: height_in,
            dpi,
        };
        let pixels = |inches: f64| -> Result<u32, RenderError> {
            let px = (inches * dpi).round();
            if !px.is_finite() || px < 1.0 || px > MAX_DIMENSION as f64 {
                return Err(invalid());
            }
            Ok(px as u32)
        };

        Ok(Self {
            width: pixels(width_in)?,
            height: pixels(height_in)?,
            dpi,
        })
    }

    pub fn points_to_pixels(&self, points: f64) -> f64 {
        points * self.dpi / POINTS_PER_INCH
    }

    pub fn stroke_width(&self, points: f64) -> u32 {
        (self.points_to_pixels(points).round() as u32).max(1)
    }
}

/// Data limits and the y/x scale ratio of the axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub x: Range<f64>,
    pub y: Range<f64>,
    pub aspect: f64,
}

impl Viewport {
    /// Pads the bounds by 5% per side and derives the aspect of a
    /// longitude/latitude plot at the mean latitude.
    pub fn from_bounds(bounds: Option<[f64; 4]>) -> Self {
        let Some([min_x, min_y, max_x, max_y]) = bounds else {
            return Self {
                x: -180.0..180.0,
                y: -90.0..90.0,
                aspect: 1.0,
            };
        };

        let epsilon = 0.001;
        let x_span = (max_x - min_x).max(epsilon);
        let y_span = (max_y - min_y).max(epsilon);
        let x_center = (min_x + max_x) / 2.0;
        let y_center = (min_y + max_y) / 2.0;
        let x_half = x_span / 2.0 + x_span * DATA_MARGIN;
        let y_half = y_span / 2.0 + y_span * DATA_MARGIN;

        let cos_lat = y_center.to_radians().cos();
        let aspect = if cos_lat > 1e-6 { 1.0 / cos_lat } else { 1.0 };

        Self {
            x: (x_center - x_half)..(x_center + x_half),
            y: (y_center - y_half)..(y_center + y_half),
            aspect,
        }
    }

    fn width(&self) -> f64 {
        self.x.end - self.x.start
    }

    fn height(&self) -> f64 {
        self.y.end - self.y.start
    }
}

/// Pixel rectangle of the axes inside the figure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxesBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl AxesBox {
    /// Places the axes in the default subplot slot, shrunk around its center
    /// so one data unit keeps the viewport aspect.
    pub fn fit(figure: &Figure, viewport: &Viewport) -> Self {
        let fig_w = figure.width as f64;
        let fig_h = figure.height as f64;
        let slot_left = AXES_LEFT * fig_w;
        let slot_top = (1.0 - AXES_TOP) * fig_h;
        let slot_w = (AXES_RIGHT - AXES_LEFT) * fig_w;
        let slot_h = (AXES_TOP - AXES_BOTTOM) * fig_h;

        let ratio = viewport.aspect * viewport.height() / viewport.width();
        let (w, h) = if slot_h / slot_w > ratio {
            (slot_w, slot_w * ratio)
        } else {
            (slot_h / ratio, slot_h)
        };

        Self {
            left: (slot_left + (slot_w - w) / 2.0).round() as u32,
            top: (slot_top + (slot_h - h) / 2.0).round() as u32,
            width: w.round().max(1.0) as u32,
            height: h.round().max(1.0) as u32,
        }
    }
}

fn tick_precision(span: f64) -> usize {
    match span {
        s if s >= 10.0 => 0,
        s if s >= 1.0 => 1,
        s if s >= 0.1 => 2,
        _ => 3,
    }
}

fn closed(ring: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut points = ring.to_vec();
    if let (Some(first), Some(last)) = (ring.first(), ring.last()) {
        if first != last {
            points.push(*first);
        }
    }
    points
}

/// Draws the layers over the mesh and writes the result to `output` as PNG.
pub fn render_mesh(
    mesh: &Mesh,
    layers: &[Layer],
    figure: &Figure,
    draw_axes: bool,
    output: &Path,
) -> Result<(), RenderError> {
    // Resolve columns before touching the output file.
    let mut resolved = Vec::with_capacity(layers.len());
    for layer in layers {
        match mesh.column(&layer.column) {
            Some(column) => resolved.push((layer, layer.feature_colors(&column))),
            None if layer.required => return Err(RenderError::MissingColumn(layer.column.clone())),
            None => warn!("Column '{}' not present, skipping its layer", layer.column),
        }
    }

    let bounds = mesh.bounds();
    if bounds.is_none() {
        warn!("No polygon coordinates found. Using default global view.");
    }
    let viewport = Viewport::from_bounds(bounds);
    let axes = AxesBox::fit(figure, &viewport);
    debug!(
        "Figure {}x{} px, axes {:?}, viewport {:?}",
        figure.width, figure.height, axes, viewport
    );

    let root = BitMapBackend::new(output, (figure.width, figure.height)).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let font_px = figure.points_to_pixels(TICK_LABEL_POINTS).round().max(1.0) as u32;
    let (x_label_area, y_label_area) = if draw_axes {
        (font_px * 3, font_px * 6)
    } else {
        (0, 0)
    };

    let right = figure.width.saturating_sub(axes.left + axes.width);
    let bottom = figure.height.saturating_sub(axes.top + axes.height);
    let plot_area = root.margin(
        axes.top,
        bottom.saturating_sub(x_label_area),
        axes.left.saturating_sub(y_label_area),
        right,
    );

    let mut chart = ChartBuilder::on(&plot_area)
        .x_label_area_size(x_label_area)
        .y_label_area_size(y_label_area)
        .build_cartesian_2d(viewport.x.clone(), viewport.y.clone())
        .map_err(draw_err)?;

    if draw_axes {
        let x_precision = tick_precision(viewport.width());
        let y_precision = tick_precision(viewport.height());
        let x_formatter = move |v: &f64| format!("{:.*}", x_precision, v);
        let y_formatter = move |v: &f64| format!("{:.*}", y_precision, v);

        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(8)
            .y_labels(8)
            .label_style(("sans-serif", font_px as f64).into_font())
            .x_label_formatter(&x_formatter)
            .y_label_formatter(&y_formatter)
            .draw()
            .map_err(draw_err)?;
    }

    for (layer, colors) in &resolved {
        let mut painted = 0usize;
        for (feature, color) in mesh.features.iter().zip(colors) {
            let Some(color) = color else { continue };

            if !color.is_transparent() {
                let fill = ShapeStyle {
                    color: color.to_rgba_color(),
                    filled: true,
                    stroke_width: 0,
                };
                chart
                    .draw_series(
                        feature
                            .polygons
                            .iter()
                            .map(|polygon| Polygon::new(polygon.exterior.clone(), fill)),
                    )
                    .map_err(draw_err)?;
                painted += 1;
            }

            if let Some(edge) = layer.edge_color {
                let stroke = ShapeStyle {
                    color: edge.to_rgba_color(),
                    filled: false,
                    stroke_width: figure.stroke_width(layer.line_width),
                };
                chart
                    .draw_series(
                        feature
                            .polygons
                            .iter()
                            .flat_map(|polygon| polygon.rings())
                            .map(|ring| PathElement::new(closed(ring), stroke)),
                    )
                    .map_err(draw_err)?;
            }
        }
        info!(
            "Layer '{}' ({}): painted {} of {} features",
            layer.column,
            layer.colormap.name(),
            painted,
            mesh.features.len()
        );
    }

    if draw_axes {
        let frame = ShapeStyle {
            color: BLACK.to_rgba(),
            filled: false,
            stroke_width: figure.stroke_width(FRAME_POINTS),
        };
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(viewport.x.start, viewport.y.start), (viewport.x.end, viewport.y.end)],
                frame,
            )))
            .map_err(draw_err)?;
    }

    root.present().map_err(draw_err)?;
    Ok(())
}
