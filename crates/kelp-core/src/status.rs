//! Kelp status: a year's annual area relative to the historical median.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{Frequency, SegmentSelection, MISSING_STATUS};
use crate::error::{KelpError, KelpResult};
use crate::presence::{PresenceCategory, PresenceTable};
use crate::timeseries::TimeSeries;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub segment_id: String,
    pub status_year: i32,
    pub presence: PresenceCategory,
    pub area_abs_km2: f64,
    pub historical_median: Option<f64>,
    /// `area_abs / historical_median`, or [`MISSING_STATUS`] when the median
    /// is null or zero.
    pub status: f64,
}

impl StatusRecord {
    pub fn has_baseline(&self) -> bool {
        self.status != MISSING_STATUS
    }
}

/// A selected segment with no annual row for the status year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingStatus {
    pub segment_id: String,
    pub status_year: i32,
}

impl From<MissingStatus> for KelpError {
    fn from(m: MissingStatus) -> Self {
        KelpError::NotFound { segment_id: m.segment_id, year: m.status_year }
    }
}

/// Per-segment outcome of a status computation. Segments without a row for
/// the status year are listed in `missing` instead of aborting the batch, so
/// every selected segment appears in exactly one of the two lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub records: Vec<StatusRecord>,
    pub missing: Vec<MissingStatus>,
}

impl StatusReport {
    /// All records, or a `NotFound` for the first segment without a row.
    pub fn into_strict(self) -> KelpResult<Vec<StatusRecord>> {
        match self.missing.into_iter().next() {
            Some(miss) => Err(miss.into()),
            None => Ok(self.records),
        }
    }
}

/// Status ratio from a resolved median; [`MISSING_STATUS`] for null or 0.
pub fn status_ratio(area_abs_km2: f64, historical_median: Option<f64>) -> f64 {
    match historical_median {
        Some(m) if m != 0.0 => area_abs_km2 / m,
        _ => MISSING_STATUS,
    }
}

/// Compute the status of each selected segment for `status_year`.
///
/// `series` must be annual. Fails with a configuration error if `selection`
/// names a segment absent from `presence` or if `series` is quarterly.
pub fn compute_status(
    series: &TimeSeries,
    presence: &PresenceTable,
    selection: &SegmentSelection,
    status_year: i32,
) -> KelpResult<StatusReport> {
    if series.spec.frequency != Frequency::Annual {
        return Err(KelpError::Configuration(
            "status requires an annual time series".into(),
        ));
    }
    let ids = selection.resolve(presence.ids())?;

    let mut report = StatusReport::default();
    for id in ids {
        let Some(p) = presence.get(&id) else { continue };
        match series.annual_row(&id, status_year) {
            Some(row) => report.records.push(StatusRecord {
                segment_id: id,
                status_year,
                presence: p.presence,
                area_abs_km2: row.area_abs_km2,
                historical_median: row.historical_median,
                status: status_ratio(row.area_abs_km2, row.historical_median),
            }),
            None => {
                warn!(segment_id = %id, status_year, "no annual row for status year");
                report.missing.push(MissingStatus { segment_id: id, status_year });
            }
        }
    }

    debug!(
        segments = report.records.len(),
        missing = report.missing.len(),
        no_baseline = report.records.iter().filter(|r| !r.has_baseline()).count(),
        status_year,
        "status computed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnnualizationMethod;
    use crate::presence::PresenceRecord;
    use crate::timeseries::{SeriesSpec, TimeSeriesRecord};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn row(id: &str, year: i32, area: f64, median: Option<f64>) -> TimeSeriesRecord {
        TimeSeriesRecord {
            segment_id: id.into(),
            year,
            quarter: None,
            date: NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
            max_occupiable_km2: 1.0,
            historical_median: median,
            area_abs_km2: area,
            area_hist_pct: None,
            area_pct: None,
        }
    }

    fn presence(ids: &[&str]) -> PresenceTable {
        PresenceTable {
            records: ids
                .iter()
                .map(|id| PresenceRecord {
                    segment_id: id.to_string(),
                    segment_area_km2: 10.0,
                    num_pixels: 1,
                    num_pixels_detected: 1,
                    pixel_area_km2: 0.0009,
                    pixel_percent: Some(0.009),
                    presence: PresenceCategory::NoHistoricalKelp,
                })
                .collect(),
        }
    }

    fn series(records: Vec<TimeSeriesRecord>) -> TimeSeries {
        TimeSeries { spec: SeriesSpec::annual(AnnualizationMethod::MaxFirst), records }
    }

    #[test]
    fn status_is_ratio_to_median() {
        let ts = series(vec![row("a", 2019, 0.001, Some(1.87e-5)), row("a", 2020, 0.0024, Some(1.87e-5))]);
        let report = compute_status(&ts, &presence(&["a"]), &SegmentSelection::All, 2020).unwrap();
        let r = &report.records[0];
        assert_relative_eq!(r.status, 128.342, epsilon = 1e-3);
        assert!(r.has_baseline());
    }

    #[test]
    fn null_or_zero_median_gives_sentinel() {
        let ts = series(vec![row("a", 2020, 0.5, None), row("b", 2020, 0.0, Some(0.0)), row("c", 2020, 0.0, Some(2.0))]);
        let report =
            compute_status(&ts, &presence(&["a", "b", "c"]), &SegmentSelection::All, 2020).unwrap();
        let got: Vec<f64> = report.records.iter().map(|r| r.status).collect();
        assert_eq!(got, vec![MISSING_STATUS, MISSING_STATUS, 0.0]);
        assert!(!report.records[0].has_baseline());
    }

    #[test]
    fn missing_year_is_reported_per_segment() {
        let ts = series(vec![row("a", 2020, 1.0, Some(1.0)), row("b", 2019, 1.0, Some(1.0))]);
        let report = compute_status(&ts, &presence(&["a", "b"]), &SegmentSelection::All, 2020).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(
            report.missing,
            vec![MissingStatus { segment_id: "b".into(), status_year: 2020 }]
        );
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"missing\":[{\"segment_id\":\"b\""), "{json}");
        assert_eq!(
            report.into_strict(),
            Err(KelpError::NotFound { segment_id: "b".into(), year: 2020 })
        );
    }

    #[test]
    fn unknown_segment_is_configuration_error() {
        let ts = series(vec![row("a", 2020, 1.0, Some(1.0))]);
        let err = compute_status(&ts, &presence(&["a"]), &SegmentSelection::only(["zz"]), 2020);
        assert!(matches!(err, Err(KelpError::Configuration(_))));
    }

    #[test]
    fn quarterly_series_is_rejected() {
        let ts = TimeSeries { spec: SeriesSpec::quarterly(), records: Vec::new() };
        let err = compute_status(&ts, &presence(&["a"]), &SegmentSelection::All, 2020);
        assert!(matches!(err, Err(KelpError::Configuration(_))));
    }
}
