use anyhow::Result;
use plotters::prelude::*;

use super::downsample;
use super::{COLOR_BLUE, COLOR_DARK_BLUE, COLOR_GRID, COLOR_LIGHT_BLUE, COLOR_RED, GENOMEWIDE_LINE, SUGGESTIVE_LINE};
use crate::dashboard::ManhattanLayout;

/// Draw a -log10(p) Manhattan plot on the given drawing area.
pub fn draw_manhattan<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    layout: &ManhattanLayout,
    title: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let x_max = layout.genome_length().max(1) as f64;
    let y_max = layout.max_score().unwrap_or(0.0).max(GENOMEWIDE_LINE) * 1.05;

    let key_points: Vec<f64> = layout.ticks.iter().map(|(_, x)| *x as f64).collect();
    let label_of = |x: &f64| {
        layout
            .ticks
            .iter()
            .find(|(_, t)| (*t as f64 - *x).abs() < 0.5)
            .map_or_else(String::new, |(chrom, _)| chrom.clone())
    };

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 22).into_font().color(&BLACK))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d((0.0..x_max).with_key_points(key_points), 0.0..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Chromosome")
        .y_desc("-log10(p)")
        .x_label_formatter(&label_of)
        .x_label_style(("sans-serif", 11))
        .y_label_style(("sans-serif", 11))
        .light_line_style(COLOR_GRID.mix(0.3))
        .draw()?;

    let pixel_width = downsample::plot_pixel_width(root.dim_in_pixel().0);
    let n_chroms = layout.offsets.len().max(1);

    for (idx, (chrom, _)) in layout.offsets.iter().enumerate() {
        let points: Vec<(f64, f64)> = layout
            .points
            .iter()
            .filter(|p| &p.chromosome == chrom)
            .filter_map(|p| p.score.map(|s| (p.x as f64, s)))
            .collect();
        if points.is_empty() {
            continue;
        }
        let ds = downsample::peak_downsample(&points, pixel_width / n_chroms);
        let draw = ds.as_deref().unwrap_or(&points);

        let color = if idx % 2 == 0 { COLOR_DARK_BLUE } else { COLOR_LIGHT_BLUE };
        chart.draw_series(draw.iter().map(|&(x, y)| Circle::new((x, y), 2, color.mix(0.8).filled())))?;
    }

    for (value, color) in [(GENOMEWIDE_LINE, COLOR_RED), (SUGGESTIVE_LINE, COLOR_BLUE)] {
        chart.draw_series(DashedLineSeries::new(
            vec![(0.0, value), (x_max, value)],
            5,
            3,
            color.mix(0.6).into(),
        ))?;
    }

    Ok(())
}
