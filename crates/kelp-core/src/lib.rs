//! Coastal kelp-canopy area indicators.
//!
//! Quarterly satellite pixel areas are assigned to coastal management
//! segments, classified for historical presence, aggregated into segment
//! time series and compared against a 1984–2013 baseline.

pub mod assign;
pub mod config;
pub mod error;
pub mod occupiable;
pub mod pipeline;
pub mod presence;
pub mod raster;
pub mod segments;
pub mod status;
pub mod timeseries;

pub use assign::{assign_pixels, AssignedPixel, AssignedTable, PixelMode};
pub use config::{
    AnnualizationMethod, BaselineWindow, Frequency, IndicatorConfig, PresenceBounds,
    SegmentSelection, StatusYear,
};
pub use error::{KelpError, KelpResult};
pub use occupiable::{max_occupiable, MaxOccupiable};
pub use pipeline::{run_indicators, Indicators, Pipeline};
pub use presence::{classify_presence, PresenceCategory, PresenceRecord, PresenceTable};
pub use raster::{PixelGrid, QuarterSlot, RasterSource, TimeIndex};
pub use segments::{SegmentFeature, SegmentPolygon, SegmentSet, SegmentSource};
pub use status::{compute_status, MissingStatus, StatusRecord, StatusReport};
pub use timeseries::{extract_time_series, SeriesSpec, TimeSeries, TimeSeriesRecord};
