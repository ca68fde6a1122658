//! Group-wise reductions of one segment's pixel rows, in square metres.
//!
//! Missing observations count as zero in every sum, so a segment whose
//! pixels were never imaged in a slot sums to 0 rather than null.

use crate::assign::AssignedPixel;
use crate::config::AnnualizationMethod;
use crate::raster::{TimeIndex, QUARTERS_PER_YEAR};

/// Per-slot sum over all pixels of the segment.
pub fn quarterly_sums(rows: &[AssignedPixel], index: &TimeIndex) -> Vec<f64> {
    let mut sums = vec![0.0f64; index.len()];
    for row in rows {
        for (s, v) in sums.iter_mut().zip(&row.observations) {
            *s += v.unwrap_or(0.0);
        }
    }
    sums
}

/// Per-year value of the segment under `method`, one entry per year of
/// `index`.
pub fn annual_values(
    rows: &[AssignedPixel],
    index: &TimeIndex,
    method: AnnualizationMethod,
) -> Vec<f64> {
    let n_years = index.years().len();
    match method {
        AnnualizationMethod::MaxFirst => {
            let mut totals = vec![0.0f64; n_years];
            for row in rows {
                for (t, year) in totals.iter_mut().zip(row.observations.chunks(QUARTERS_PER_YEAR)) {
                    *t += year.iter().flatten().copied().fold(0.0, f64::max);
                }
            }
            totals
        }
        AnnualizationMethod::SumFirst => quarterly_sums(rows, index)
            .chunks(QUARTERS_PER_YEAR)
            .map(|q| q.iter().copied().fold(0.0, f64::max))
            .collect(),
        AnnualizationMethod::Q1
        | AnnualizationMethod::Q2
        | AnnualizationMethod::Q3
        | AnnualizationMethod::Q4 => {
            let offset = method.quarter().map_or(0, |q| q as usize - 1);
            quarterly_sums(rows, index)
                .chunks(QUARTERS_PER_YEAR)
                .map(|q| q[offset])
                .collect()
        }
    }
}
