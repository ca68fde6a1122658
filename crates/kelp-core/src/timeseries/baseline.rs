//! Historical baseline median.

use crate::config::BaselineWindow;

/// Nearest-rank median: the value at 1-based rank `ceil(n / 2)` of the
/// sorted sample, i.e. the lower middle value for even `n`.
/// `None` for an empty sample.
pub fn nearest_rank_median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = sorted.len().div_ceil(2);
    Some(sorted[rank - 1])
}

/// Median of the `(year, value)` pairs whose year lies in `window`.
pub fn historical_median<I>(pairs: I, window: &BaselineWindow) -> Option<f64>
where
    I: IntoIterator<Item = (i32, f64)>,
{
    let in_window: Vec<f64> = pairs
        .into_iter()
        .filter(|&(year, _)| window.contains(year))
        .map(|(_, v)| v)
        .collect();
    nearest_rank_median(&in_window)
}
