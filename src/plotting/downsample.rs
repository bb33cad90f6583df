/// Drawable pixel columns left once axis labels and margins are taken.
pub fn plot_pixel_width(total_width: u32) -> usize {
    (total_width as usize).saturating_sub(100)
}

/// Thin a scatter sorted by x down to at most one point per pixel column,
/// keeping the highest-scoring point of each column.
///
/// Manhattan plots are read for their peaks, so the minimum of a column is
/// dropped. Returns `None` when the input already fits.
pub fn peak_downsample(points: &[(f64, f64)], n_columns: usize) -> Option<Vec<(f64, f64)>> {
    if n_columns == 0 || points.len() <= n_columns {
        return None;
    }
    let x_min = points.first()?.0;
    let x_max = points.last()?.0;
    let span = x_max - x_min;
    if span <= 0.0 {
        let top = points.iter().copied().fold(points[0], |a, b| if b.1 > a.1 { b } else { a });
        return Some(vec![top]);
    }

    let column_width = span / n_columns as f64;
    let mut out: Vec<(f64, f64)> = Vec::with_capacity(n_columns);
    let mut current: Option<(usize, (f64, f64))> = None;
    for &(x, y) in points {
        let col = (((x - x_min) / column_width) as usize).min(n_columns - 1);
        current = match current {
            Some((c, best)) if c == col => Some((c, if y > best.1 { (x, y) } else { best })),
            Some((_, best)) => {
                out.push(best);
                Some((col, (x, y)))
            }
            None => Some((col, (x, y))),
        };
    }
    if let Some((_, best)) = current {
        out.push(best);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_input_returns_none() {
        let pts: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 1.0)).collect();
        assert!(peak_downsample(&pts, 10).is_none());
    }

    #[test]
    fn one_point_per_column() {
        let pts: Vec<(f64, f64)> = (0..10_000).map(|i| (i as f64, (i % 7) as f64)).collect();
        let ds = peak_downsample(&pts, 100).unwrap();
        assert!(ds.len() <= 100);
        assert!(ds.iter().all(|&(_, y)| y == 6.0));
    }

    #[test]
    fn keeps_isolated_peak() {
        let mut pts: Vec<(f64, f64)> = (0..1000).map(|i| (i as f64, 1.0)).collect();
        pts[500] = (500.0, 40.0);
        let ds = peak_downsample(&pts, 50).unwrap();
        assert!(ds.contains(&(500.0, 40.0)));
    }

    #[test]
    fn pixel_width_leaves_margin() {
        assert_eq!(plot_pixel_width(1800), 1700);
        assert_eq!(plot_pixel_width(50), 0);
    }
}
