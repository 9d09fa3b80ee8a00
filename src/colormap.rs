// colormap.rs

use plotters::prelude::RGBAColor;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ColormapError {
    #[error("Invalid hex color '{0}': expected #rrggbb or #rrggbbaa")]
    InvalidHex(String),

    #[error("Unknown colormap: {0}")]
    UnknownColormap(String),
}

/// An RGBA color with every channel normalized to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::new(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Rgba = Rgba::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }

    fn lerp(self, other: Rgba, t: f64) -> Rgba {
        Rgba {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    pub fn to_rgba_color(self) -> RGBAColor {
        let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        RGBAColor(channel(self.r), channel(self.g), channel(self.b), self.a.clamp(0.0, 1.0))
    }
}

/// Convert a hexadecimal color string to normalized RGBA.
pub fn hex_to_rgba(hex: &str) -> Result<Rgba, ColormapError> {
    let digits = hex.trim_start_matches('#');
    if !(digits.len() == 6 || digits.len() == 8) || !digits.is_ascii() {
        return Err(ColormapError::InvalidHex(hex.to_string()));
    }

    let channel = |i: usize| -> Result<f64, ColormapError> {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .map(|v| v as f64 / 255.0)
            .map_err(|_| ColormapError::InvalidHex(hex.to_string()))
    };

    let alpha = if digits.len() == 8 { channel(6)? } else { 1.0 };
    Ok(Rgba::new(channel(0)?, channel(2)?, channel(4)?, alpha))
}

// Percent buckets of the AMSR2 sea-ice palette: [start, end) -> color.
const AMSR2_BUCKETS: [(usize, usize, &str); 13] = [
    (0, 10, "#00008b00"),
    (10, 20, "#1e90ffff"),
    (20, 30, "#1efaa0ff"),
    (30, 40, "#228b22ff"),
    (40, 50, "#00fa00ff"),
    (50, 60, "#7dfa00ff"),
    (60, 70, "#adff2fff"),
    (70, 80, "#fafa00ff"),
    (80, 85, "#fa7d00ff"),
    (85, 90, "#fa0000ff"),
    (90, 95, "#ba55d3ff"),
    (95, 99, "#9400d3ff"),
    (99, 100, "#78005aff"),
];

const LINEAR_LUT_SIZE: usize = 256;

/// A discrete color lookup table with a dedicated color for missing values.
#[derive(Debug, Clone)]
pub struct Colormap {
    name: String,
    lut: Vec<Rgba>,
    bad: Rgba,
}

impl Colormap {
    /// Builds a colormap that uses `colors` as-is, one entry per bin.
    pub fn listed(name: &str, colors: Vec<Rgba>) -> Self {
        Self {
            name: name.to_string(),
            lut: colors,
            bad: Rgba::TRANSPARENT,
        }
    }

    /// Builds an `n`-entry colormap by interpolating linearly between
    /// evenly spaced anchor colors.
    pub fn linear(name: &str, anchors: &[Rgba], n: usize) -> Self {
        let positions: Vec<f64> = (0..anchors.len())
            .map(|i| i as f64 / (anchors.len().max(2) - 1) as f64)
            .collect();
        let stops: Vec<(f64, Rgba)> = positions
            .into_iter()
            .zip(anchors.iter().copied())
            .collect();
        Self::from_stops(name, &stops, n)
    }

    fn from_stops(name: &str, stops: &[(f64, Rgba)], n: usize) -> Self {
        let lut = (0..n)
            .map(|i| {
                let x = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
                interpolate(stops, x)
            })
            .collect();
        Self::listed(name, lut)
    }

    pub fn with_bad(mut self, bad: Rgba) -> Self {
        self.bad = bad;
        self
    }

    /// The fixed 100-entry AMSR2 sea-ice palette. Missing values are black.
    pub fn amsr2() -> Self {
        let mut colors = vec![Rgba::new(1.0, 1.0, 1.0, 1.0); 100];
        for (start, end, hex) in AMSR2_BUCKETS {
            // The table is a compile-time constant, every entry parses.
            let color = hex_to_rgba(hex).unwrap_or(Rgba::BLACK);
            colors[start..end].fill(color);
        }
        Self::listed("amsr2", colors).with_bad(Rgba::BLACK)
    }

    /// Looks up one of the standard colormaps by name (case-insensitive).
    pub fn named(name: &str) -> Result<Self, ColormapError> {
        let rgb = |r: u8, g: u8, b: u8| {
            Rgba::new(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0, 1.0)
        };

        match name.to_lowercase().as_str() {
            // Diverging blue-white-red ramp, 33 evenly spaced control points.
            "coolwarm" => Ok(Self::linear(
                "coolwarm",
                &[
                    rgb(59, 76, 192),
                    rgb(68, 90, 204),
                    rgb(77, 104, 215),
                    rgb(87, 117, 225),
                    rgb(98, 130, 234),
                    rgb(108, 142, 241),
                    rgb(119, 154, 247),
                    rgb(130, 165, 251),
                    rgb(141, 176, 254),
                    rgb(152, 185, 255),
                    rgb(163, 194, 255),
                    rgb(174, 201, 253),
                    rgb(184, 208, 249),
                    rgb(194, 213, 244),
                    rgb(204, 217, 238),
                    rgb(213, 219, 230),
                    rgb(221, 221, 221),
                    rgb(229, 216, 209),
                    rgb(236, 211, 197),
                    rgb(241, 204, 185),
                    rgb(245, 196, 173),
                    rgb(247, 187, 160),
                    rgb(247, 177, 148),
                    rgb(247, 166, 135),
                    rgb(244, 154, 123),
                    rgb(241, 141, 111),
                    rgb(236, 127, 99),
                    rgb(229, 112, 88),
                    rgb(222, 96, 77),
                    rgb(213, 80, 66),
                    rgb(203, 62, 56),
                    rgb(192, 40, 47),
                    rgb(180, 4, 38),
                ],
                LINEAR_LUT_SIZE,
            )),
            "rdylbu" => Ok(Self::linear(
                "RdYlBu",
                &[
                    rgb(0xa5, 0x00, 0x26),
                    rgb(0xd7, 0x30, 0x27),
                    rgb(0xf4, 0x6d, 0x43),
                    rgb(0xfd, 0xae, 0x61),
                    rgb(0xfe, 0xe0, 0x90),
                    rgb(0xff, 0xff, 0xbf),
                    rgb(0xe0, 0xf3, 0xf8),
                    rgb(0xab, 0xd9, 0xe9),
                    rgb(0x74, 0xad, 0xd1),
                    rgb(0x45, 0x75, 0xb4),
                    rgb(0x31, 0x36, 0x95),
                ],
                LINEAR_LUT_SIZE,
            )),
            "wistia" => Ok(Self::linear(
                "Wistia",
                &[
                    rgb(0xe4, 0xff, 0x7a),
                    rgb(0xff, 0xe8, 0x1a),
                    rgb(0xff, 0xbd, 0x00),
                    rgb(0xff, 0xa0, 0x00),
                    rgb(0xfc, 0x7f, 0x00),
                ],
                LINEAR_LUT_SIZE,
            )),
            // Red saturates at 0.809524 while green and blue keep rising.
            "copper" => Ok(Self::from_stops(
                "copper",
                &[
                    (0.0, Rgba::new(0.0, 0.0, 0.0, 1.0)),
                    (0.809524, Rgba::new(1.0, 0.7812 * 0.809524, 0.4975 * 0.809524, 1.0)),
                    (1.0, Rgba::new(1.0, 0.7812, 0.4975, 1.0)),
                ],
                LINEAR_LUT_SIZE,
            )),
            _ => Err(ColormapError::UnknownColormap(name.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.lut.len()
    }

    /// Maps a normalized value to a color. Values outside [0, 1] take the
    /// first or last entry; missing and non-finite values take the bad color.
    pub fn lookup(&self, x: Option<f64>) -> Rgba {
        let n = self.lut.len();
        let x = match x {
            Some(x) if x.is_finite() && n > 0 => x,
            _ => return self.bad,
        };

        let scaled = x * n as f64;
        let index = if scaled >= n as f64 {
            n - 1
        } else if scaled < 0.0 {
            0
        } else {
            scaled as usize
        };
        self.lut[index]
    }
}

fn interpolate(stops: &[(f64, Rgba)], x: f64) -> Rgba {
    match stops {
        [] => Rgba::TRANSPARENT,
        [(_, only)] => *only,
        _ => {
            for pair in stops.windows(2) {
                let (x0, c0) = pair[0];
                let (x1, c1) = pair[1];
                if x <= x1 {
                    let t = if x1 > x0 { ((x - x0) / (x1 - x0)).clamp(0.0, 1.0) } else { 0.0 };
                    return c0.lerp(c1, t);
                }
            }
            stops[stops.len() - 1].1
        }
    }
}
