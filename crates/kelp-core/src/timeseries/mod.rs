//! Segment-level quarterly and annual kelp area series.
//!
//! Pipeline per segment:
//!   quarterly sums or annualized values (m²) → km² →
//!   attach max-occupiable ceiling and historical median →
//!   derive percent-of-median and percent-of-ceiling.
//!
//! The historical median is taken over the output series itself, so it
//! follows the chosen frequency and annualization method.

pub mod aggregate;
pub mod baseline;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assign::AssignedTable;
use crate::config::{AnnualizationMethod, BaselineWindow, Frequency, SegmentSelection, M2_PER_KM2};
use crate::error::KelpResult;
use crate::occupiable::MaxOccupiable;

use aggregate::{annual_values, quarterly_sums};
use baseline::historical_median;

/// Frequency, method and baseline of an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SeriesSpec {
    pub frequency: Frequency,
    /// Ignored for quarterly output.
    pub method: AnnualizationMethod,
    pub baseline: BaselineWindow,
}

impl SeriesSpec {
    pub fn annual(method: AnnualizationMethod) -> Self {
        Self { frequency: Frequency::Annual, method, baseline: BaselineWindow::default() }
    }

    pub fn quarterly() -> Self {
        Self { frequency: Frequency::Quarterly, ..Self::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    pub segment_id: String,
    pub year: i32,
    /// Present for quarterly rows only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub quarter: Option<u8>,
    /// First day of the quarter, or January 1 for annual rows.
    pub date: NaiveDate,
    /// Constant across a segment's rows.
    pub max_occupiable_km2: f64,
    /// Constant across a segment's rows. Null without baseline rows.
    pub historical_median: Option<f64>,
    pub area_abs_km2: f64,
    /// `area_abs / historical_median × 100`; null when the median is null or 0.
    pub area_hist_pct: Option<f64>,
    /// `area_abs / max_occupiable × 100`; null when the ceiling is 0.
    pub area_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub spec: SeriesSpec,
    pub records: Vec<TimeSeriesRecord>,
}

impl TimeSeries {
    pub fn segment(&self, segment_id: &str) -> impl Iterator<Item = &TimeSeriesRecord> + '_ {
        let id = segment_id.to_string();
        self.records.iter().filter(move |r| r.segment_id == id)
    }

    /// Distinct segment ids, in row order.
    pub fn segment_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for r in &self.records {
            if !ids.contains(&r.segment_id.as_str()) {
                ids.push(&r.segment_id);
            }
        }
        ids
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.records.iter().map(|r| r.year)
    }

    /// The annual row of `segment_id` for `year`.
    pub fn annual_row(&self, segment_id: &str, year: i32) -> Option<&TimeSeriesRecord> {
        self.records
            .iter()
            .find(|r| r.segment_id == segment_id && r.year == year && r.quarter.is_none())
    }
}

fn ratio_pct(value: f64, reference: Option<f64>) -> Option<f64> {
    reference.filter(|&r| r != 0.0).map(|r| value / r * 100.0)
}

/// Extract the series of the selected segments of `table`.
///
/// `ceilings` supplies each segment's max-occupiable area (see
/// [`crate::occupiable::max_occupiable`]); a segment without an entry gets 0.
/// Fails if `selection` names a segment absent from `table`.
pub fn extract_time_series(
    table: &AssignedTable,
    ceilings: &[MaxOccupiable],
    selection: &SegmentSelection,
    spec: SeriesSpec,
) -> KelpResult<TimeSeries> {
    let ids = selection.resolve(table.segment_ids())?;
    let index = table.index();
    let mut records = Vec::new();

    for id in &ids {
        let rows = table.segment(id).unwrap_or_default();
        let max_occupiable_km2 = ceilings
            .iter()
            .find(|c| c.segment_id == *id)
            .map_or(0.0, |c| c.max_occupiable_km2);

        // (year, quarter, date, area m²)
        let points: Vec<(i32, Option<u8>, NaiveDate, f64)> = match spec.frequency {
            Frequency::Quarterly => index
                .slots()
                .iter()
                .zip(quarterly_sums(rows, index))
                .map(|(s, v)| (s.year, Some(s.quarter), s.date, v))
                .collect(),
            Frequency::Annual => index
                .years()
                .iter()
                .zip(annual_values(rows, index, spec.method))
                .enumerate()
                .map(|(k, (&year, v))| (year, None, index.year_start(k), v))
                .collect(),
        };

        let areas_km2: Vec<(i32, f64)> =
            points.iter().map(|&(year, _, _, v)| (year, v / M2_PER_KM2)).collect();
        let median = historical_median(areas_km2.iter().copied(), &spec.baseline);
        let ceiling = Some(max_occupiable_km2);

        records.extend(points.iter().zip(&areas_km2).map(
            |(&(year, quarter, date, _), &(_, area_abs_km2))| TimeSeriesRecord {
                segment_id: id.clone(),
                year,
                quarter,
                date,
                max_occupiable_km2,
                historical_median: median,
                area_abs_km2,
                area_hist_pct: ratio_pct(area_abs_km2, median),
                area_pct: ratio_pct(area_abs_km2, ceiling),
            },
        ));
    }

    debug!(
        segments = ids.len(),
        rows = records.len(),
        frequency = %spec.frequency,
        method = %spec.method,
        "time series extracted"
    );
    Ok(TimeSeries { spec, records })
}
