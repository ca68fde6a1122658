//! Indicator pipeline: runs every component in dependency order.
//!
//! Stages:
//!   assignment (fractional, plus whole-pixel when configured) →
//!   presence + max-occupiable → time series → status.
//!
//! Data-dependent defaults (the latest status year) are resolved here, so the
//! component functions only ever see explicit values.

use serde::Serialize;
use tracing::info;

use crate::assign::{assign_pixels, AssignedTable, PixelMode};
use crate::config::{Frequency, IndicatorConfig, SegmentSelection};
use crate::error::KelpResult;
use crate::occupiable::{max_occupiable, MaxOccupiable};
use crate::presence::{classify_presence, PresenceTable};
use crate::raster::PixelGrid;
use crate::segments::SegmentSet;
use crate::status::{compute_status, StatusReport};
use crate::timeseries::{extract_time_series, SeriesSpec, TimeSeries};

/// Every output of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct Indicators {
    pub presence: PresenceTable,
    pub max_occupiable: Vec<MaxOccupiable>,
    pub time_series: TimeSeries,
    /// Resolved status year; `None` for quarterly output or an empty series.
    pub status_year: Option<i32>,
    pub status: Option<StatusReport>,
}

/// Validated inputs shared by all stages.
pub struct Pipeline<'a> {
    grid: &'a PixelGrid,
    segments: SegmentSet,
    config: IndicatorConfig,
}

impl<'a> Pipeline<'a> {
    /// Validate the config and resolve the segment selection up front.
    pub fn new(grid: &'a PixelGrid, segments: &SegmentSet, config: IndicatorConfig) -> KelpResult<Self> {
        config.validate()?;
        let segments = segments.subset(&config.segments)?;
        Ok(Self { grid, segments, config })
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    pub fn series_spec(&self) -> SeriesSpec {
        SeriesSpec {
            frequency: self.config.frequency,
            method: self.config.annualization_method,
            baseline: self.config.baseline,
        }
    }

    pub fn assign(&self, mode: PixelMode) -> KelpResult<AssignedTable> {
        assign_pixels(self.grid, &self.segments, &SegmentSelection::All, mode)
    }

    pub fn presence(&self, fractional: &AssignedTable) -> KelpResult<PresenceTable> {
        classify_presence(fractional, &self.segments, &self.config.bounds)
    }

    pub fn time_series(&self, fractional: &AssignedTable) -> KelpResult<TimeSeries> {
        let ceilings = max_occupiable(fractional);
        let whole;
        let table = if self.config.fractional_pixels {
            fractional
        } else {
            whole = self.assign(PixelMode::Whole)?;
            &whole
        };
        extract_time_series(table, &ceilings, &SegmentSelection::All, self.series_spec())
    }

    /// Resolve the status year against `series` and compute status. `None`
    /// when the series is quarterly or has no rows.
    pub fn status(
        &self,
        series: &TimeSeries,
        presence: &PresenceTable,
    ) -> KelpResult<Option<(i32, StatusReport)>> {
        if series.spec.frequency != Frequency::Annual {
            return Ok(None);
        }
        let Some(year) = self.config.status_year.resolve(series.years()) else {
            return Ok(None);
        };
        let report = compute_status(series, presence, &SegmentSelection::All, year)?;
        Ok(Some((year, report)))
    }

    pub fn run(&self) -> KelpResult<Indicators> {
        let fractional = self.assign(PixelMode::Fractional)?;
        info!(rows = fractional.rows().len(), segments = self.segments.len(), "assignment done");

        let presence = self.presence(&fractional)?;
        let ceilings = max_occupiable(&fractional);
        info!(segments = presence.records.len(), "presence and max-occupiable done");

        let time_series = self.time_series(&fractional)?;
        info!(rows = time_series.records.len(), "time series done");

        let (status_year, status) = match self.status(&time_series, &presence)? {
            Some((year, report)) => {
                info!(status_year = year, segments = report.records.len(), "status done");
                (Some(year), Some(report))
            }
            None => (None, None),
        };

        Ok(Indicators {
            presence,
            max_occupiable: ceilings,
            time_series,
            status_year,
            status,
        })
    }
}

/// Run the whole pipeline in one call.
pub fn run_indicators(
    grid: &PixelGrid,
    segments: &SegmentSet,
    config: &IndicatorConfig,
) -> KelpResult<Indicators> {
    Pipeline::new(grid, segments, config.clone())?.run()
}
