use statrs::statistics::Statistics;

fn present(values: impl IntoIterator<Item = Option<f64>>) -> Vec<f64> {
    values
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .collect()
}

/// Nearest-rank quantile over the non-null values.
///
/// Sorted values are indexed at `round((n - 1) * q)`, halves rounding away
/// from zero. Returns `None` when no value is present.
pub fn quantile(values: impl IntoIterator<Item = Option<f64>>, q: f64) -> Option<f64> {
    let mut sorted = present(values);
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    Some(sorted[idx.min(sorted.len() - 1)])
}

/// Arithmetic mean of the non-null values.
pub fn mean(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let data = present(values);
    if data.is_empty() {
        None
    } else {
        Some(data.iter().mean())
    }
}

/// Sample standard deviation (N - 1 denominator) of the non-null values.
///
/// Undefined, and therefore `None`, for fewer than two values.
pub fn sample_std(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let data = present(values);
    if data.len() < 2 {
        None
    } else {
        Some(data.iter().std_dev())
    }
}

/// Alternate allele frequency AO / (RO + AO). Null when either count is null
/// or the depth is zero.
pub fn allele_frequency(ro: Option<u32>, ao: Option<u32>) -> Option<f64> {
    let (ro, ao) = (u64::from(ro?), u64::from(ao?));
    let depth = ro + ao;
    if depth == 0 {
        None
    } else {
        Some(ao as f64 / depth as f64)
    }
}

/// Widen optional integer counts for the float statistics above.
pub fn as_f64<I>(values: I) -> impl Iterator<Item = Option<f64>>
where
    I: IntoIterator<Item = Option<u32>>,
{
    values.into_iter().map(|v| v.map(f64::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quantile_nearest_rank() {
        let v: Vec<Option<f64>> = (1..=10).map(|i| Some(i as f64)).collect();
        // (10 - 1) * 0.9 = 8.1 -> index 8
        assert_eq!(quantile(v.clone(), 0.9), Some(9.0));
        assert_eq!(quantile(v.clone(), 0.0), Some(1.0));
        assert_eq!(quantile(v.clone(), 1.0), Some(10.0));
        // (10 - 1) * 0.05 = 0.45 -> index 0
        assert_eq!(quantile(v, 0.05), Some(1.0));
    }

    #[test]
    fn test_quantile_ignores_nulls_and_order() {
        let v = vec![Some(3.0), None, Some(1.0), Some(2.0), None];
        assert_eq!(quantile(v, 0.5), Some(2.0));
        assert_eq!(quantile(vec![None, None], 0.5), None);
    }

    #[test]
    fn test_mean_skips_nulls() {
        assert_relative_eq!(mean(vec![Some(1.0), None, Some(3.0)]).unwrap(), 2.0);
        assert_eq!(mean(Vec::new()), None);
    }

    #[test]
    fn test_sample_std_uses_n_minus_one() {
        let s = sample_std(vec![Some(2.0), Some(4.0), Some(4.0), Some(4.0), Some(5.0), Some(5.0), Some(7.0), Some(9.0)]).unwrap();
        assert_relative_eq!(s, 2.138089935, epsilon = 1e-8);
    }

    #[test]
    fn test_sample_std_singleton_is_null() {
        assert_eq!(sample_std(vec![Some(12.0)]), None);
        assert_eq!(sample_std(vec![Some(12.0), None]), None);
    }

    #[test]
    fn test_allele_frequency() {
        assert_relative_eq!(allele_frequency(Some(3), Some(1)).unwrap(), 0.25);
        assert_eq!(allele_frequency(Some(0), Some(0)), None);
        assert_eq!(allele_frequency(None, Some(4)), None);
        assert_relative_eq!(allele_frequency(Some(3_000_000_000), Some(3_000_000_000)).unwrap(), 0.5);
    }
}
