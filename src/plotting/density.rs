use anyhow::Result;
use plotters::prelude::*;

use super::{COLOR_BLUE, COLOR_GRID, COLOR_RED};
use crate::filters::WindowDensity;

/// One point per window: SNPs before filtering against SNPs kept.
pub fn draw_filter_effect<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    density: &[WindowDensity],
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let max_n = density.iter().map(|d| d.n).max().unwrap_or(0).max(1) as f64 * 1.05;

    let mut chart = ChartBuilder::on(root)
        .caption("SNP density before and after filtering", ("sans-serif", 18).into_font().color(&BLACK))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..max_n, 0.0..max_n)?;

    chart
        .configure_mesh()
        .x_desc("SNPs per window")
        .y_desc("SNPs per window after filtering")
        .light_line_style(COLOR_GRID.mix(0.3))
        .draw()?;

    // y = x: nothing removed
    chart.draw_series(DashedLineSeries::new(
        vec![(0.0, 0.0), (max_n, max_n)],
        5,
        3,
        COLOR_RED.mix(0.5).into(),
    ))?;

    chart.draw_series(
        density
            .iter()
            .map(|d| Circle::new((d.n as f64, d.n_filtered as f64), 3, COLOR_BLUE.mix(0.6).filled())),
    )?;

    Ok(())
}
