// main.rs for geojson2png: PNG summary images from sea-ice mesh GeoJSON
use anyhow::{Result, bail};
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;

mod app;
mod colormap;
mod mesh;
mod projection;
mod render;

use app::{
    DEFAULT_CRITERIA, DEFAULT_DPI, DEFAULT_XSCALE, DEFAULT_YSCALE, Palette, RenderConfig,
    check_input_filenames, convert_to_png,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Generate PNG summary image(s) from mesh GeoJSON input file(s)"
)]
struct Cli {
    /// Width in inches
    #[arg(short = 'x', long = "xscale", default_value_t = DEFAULT_XSCALE)]
    xscale: f64,

    /// Height in inches
    #[arg(short = 'y', long = "yscale", default_value_t = DEFAULT_YSCALE)]
    yscale: f64,

    /// Output resolution in dots per inch
    #[arg(
        short = 'd',
        long,
        default_value_t = DEFAULT_DPI,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    dpi: u32,

    /// Use the AMSR2 colormap palette instead of the default
    #[arg(short = 'p', long = "palette_amsr")]
    palette_amsr: bool,

    /// Feature column to color by; "fuel" also draws the inaccessible layer
    #[arg(short = 'c', long, default_value = DEFAULT_CRITERIA)]
    criteria: String,

    /// Lower bound of the color scale (defaults to the data minimum)
    #[arg(long, allow_negative_numbers = true)]
    vmin: Option<f64>,

    /// Upper bound of the color scale (defaults to the data maximum)
    #[arg(long, allow_negative_numbers = true)]
    vmax: Option<f64>,

    /// Leave out axis ticks, labels and frame
    #[arg(long)]
    no_axes: bool,

    /// One or more mesh GeoJSON file path(s)
    #[arg(required = true, num_args = 1..)]
    files: Vec<PathBuf>,
}

impl Cli {
    fn render_config(&self) -> Result<RenderConfig> {
        let config = RenderConfig {
            xscale: self.xscale,
            yscale: self.yscale,
            dpi: self.dpi,
            palette: if self.palette_amsr {
                Palette::Amsr2
            } else {
                Palette::Default
            },
            criteria: self.criteria.clone(),
            vmin: self.vmin,
            vmax: self.vmax,
            draw_axes: !self.no_axes,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Converts every existing file in `files`, carrying on past failures.
/// Returns the number of files that existed but could not be converted.
fn run(files: &[PathBuf], config: &RenderConfig) -> usize {
    let checked_files = check_input_filenames(files);

    let mut failed = 0usize;
    for geojson_path in &checked_files {
        info!(
            "Converting {} (criteria {})",
            geojson_path.display(),
            config.criteria
        );
        if let Err(e) = convert_to_png(geojson_path, config) {
            error!("{:#}", e);
            failed += 1;
        }
    }
    failed
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let cli = Cli::parse();
    let config = cli.render_config()?;

    let failed = run(&cli.files, &config);
    if failed > 0 {
        bail!("{} file(s) could not be converted", failed);
    }
    Ok(())
}
