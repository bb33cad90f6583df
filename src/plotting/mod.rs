mod density;
mod downsample;
mod manhattan;

use anyhow::Result;
use plotters::prelude::*;
use std::path::Path;

use crate::dashboard::ManhattanLayout;
use crate::filters::WindowDensity;

/// Output format for plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotFormat {
    Png,
    Svg,
}

impl PlotFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            PlotFormat::Png => "png",
            PlotFormat::Svg => "svg",
        }
    }
}

/// Configuration for plot generation.
#[derive(Debug, Clone)]
pub struct PlotConfig {
    pub width: u32,
    pub height: u32,
    pub format: PlotFormat,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 1800,
            height: 600,
            format: PlotFormat::Png,
        }
    }
}

// Alternating chromosome colours
pub const COLOR_DARK_BLUE: RGBColor = RGBColor(31, 78, 121);
pub const COLOR_LIGHT_BLUE: RGBColor = RGBColor(91, 155, 213);
pub const COLOR_RED: RGBColor = RGBColor(220, 50, 50);
pub const COLOR_BLUE: RGBColor = RGBColor(46, 134, 171);
pub const COLOR_GRID: RGBColor = RGBColor(200, 200, 200);

/// Genome-wide significance line, as -log10(p)
pub const GENOMEWIDE_LINE: f64 = 7.301_029_995_663_981; // -log10(5e-8)
/// Suggestive significance line, as -log10(p)
pub const SUGGESTIVE_LINE: f64 = 5.0; // -log10(1e-5)

/// Draw a genome-wide -log10(p) Manhattan plot.
pub fn plot_manhattan(layout: &ManhattanLayout, title: &str, path: &Path, config: &PlotConfig) -> Result<()> {
    if layout.points.iter().all(|p| p.score.is_none()) {
        anyhow::bail!("No p-values to plot");
    }

    match config.format {
        PlotFormat::Png => {
            let root = BitMapBackend::new(path, (config.width, config.height)).into_drawing_area();
            manhattan::draw_manhattan(&root, layout, title)?;
            root.present()?;
        }
        PlotFormat::Svg => {
            let root = SVGBackend::new(path, (config.width, config.height)).into_drawing_area();
            manhattan::draw_manhattan(&root, layout, title)?;
            root.present()?;
        }
    }

    log::info!("Plot saved to: {}", path.display());
    Ok(())
}

/// Scatter of per-window SNP counts before (x) and after (y) filtering.
pub fn plot_filter_effect(density: &[WindowDensity], path: &Path, config: &PlotConfig) -> Result<()> {
    if density.is_empty() {
        anyhow::bail!("No windows to plot");
    }
    // square canvas
    let side = config.height;

    match config.format {
        PlotFormat::Png => {
            let root = BitMapBackend::new(path, (side, side)).into_drawing_area();
            density::draw_filter_effect(&root, density)?;
            root.present()?;
        }
        PlotFormat::Svg => {
            let root = SVGBackend::new(path, (side, side)).into_drawing_area();
            density::draw_filter_effect(&root, density)?;
            root.present()?;
        }
    }

    log::info!("Plot saved to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn suggestive_line_is_below_genomewide() {
        assert_relative_eq!(GENOMEWIDE_LINE, -(5e-8_f64).log10(), epsilon = 1e-12);
        assert_relative_eq!(SUGGESTIVE_LINE, -(1e-5_f64).log10(), epsilon = 1e-12);
        assert!(SUGGESTIVE_LINE < GENOMEWIDE_LINE);
    }
}
