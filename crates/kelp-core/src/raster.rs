//! Quarterly pixel-area raster: ingestion, validation and time indexing.
//!
//! The raw source exposes four variables (longitude, latitude, area, year).
//! Area is pixel × time-slot, in square metres, with `null` for slots where
//! the pixel was not imaged. Slot `i` belongs to year `year[i / 4]` and
//! quarter `i % 4 + 1`; that label is attached once here and every later
//! stage indexes through [`TimeIndex`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PIXEL_FOOTPRINT_M2;
use crate::error::{KelpError, KelpResult};

pub const QUARTERS_PER_YEAR: usize = 4;

/// Raw raster variables as read from the source file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RasterSource {
    pub longitude: Vec<f64>,
    pub latitude: Vec<f64>,
    /// Pixel × time-slot area in square metres.
    pub area: Vec<Vec<Option<f64>>>,
    /// One entry per group of four time-slots, chronological.
    pub year: Vec<i32>,
}

/// One quarterly time-slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuarterSlot {
    pub year: i32,
    /// 1..=4.
    pub quarter: u8,
    /// First calendar day of the quarter.
    pub date: NaiveDate,
}

/// First calendar day of a quarter (1 → Jan, 2 → Apr, 3 → Jul, 4 → Oct).
pub fn quarter_start(year: i32, quarter: u8) -> Option<NaiveDate> {
    if !(1..=4).contains(&quarter) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, 3 * (quarter as u32 - 1) + 1, 1)
}

/// Explicit (year, quarter) label for every observation column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeIndex {
    years: Vec<i32>,
    slots: Vec<QuarterSlot>,
}

impl TimeIndex {
    /// Build the positional index: the first slot is quarter 1 of `years[0]`.
    pub fn new(years: &[i32]) -> KelpResult<Self> {
        if years.is_empty() {
            return Err(KelpError::Format("year variable is empty".into()));
        }
        if let Some(w) = years.windows(2).find(|w| w[1] <= w[0]) {
            return Err(KelpError::Format(format!(
                "year variable is not strictly increasing ({} then {})",
                w[0], w[1]
            )));
        }

        let mut slots = Vec::with_capacity(years.len() * QUARTERS_PER_YEAR);
        for &year in years {
            for quarter in 1..=QUARTERS_PER_YEAR as u8 {
                let date = quarter_start(year, quarter).ok_or_else(|| {
                    KelpError::Format(format!("year {year} is outside the calendar range"))
                })?;
                slots.push(QuarterSlot { year, quarter, date });
            }
        }
        Ok(Self { years: years.to_vec(), slots })
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn slots(&self) -> &[QuarterSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// January 1 of the `k`-th year.
    pub fn year_start(&self, k: usize) -> NaiveDate {
        self.slots[k * QUARTERS_PER_YEAR].date
    }
}

/// Validated pixel grid. Observations are stored row-major, one row of
/// `index.len()` slots per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelGrid {
    pub longitude: Vec<f64>,
    pub latitude: Vec<f64>,
    observations: Vec<Option<f64>>,
    index: TimeIndex,
}

impl PixelGrid {
    /// Validate shapes and values of a raw source.
    ///
    /// `NaN` areas are read as not imaged; negative or infinite areas are
    /// rejected.
    pub fn from_source(src: RasterSource) -> KelpResult<Self> {
        let n = src.area.len();
        if src.longitude.len() != n || src.latitude.len() != n {
            return Err(KelpError::Format(format!(
                "variable shapes differ: {} longitudes, {} latitudes, {} area rows",
                src.longitude.len(),
                src.latitude.len(),
                n
            )));
        }
        let index = TimeIndex::new(&src.year)?;
        let width = index.len();

        let mut observations = Vec::with_capacity(n * width);
        for (p, row) in src.area.into_iter().enumerate() {
            if row.len() != width {
                return Err(KelpError::Format(format!(
                    "pixel {p} has {} time-slots, expected {} ({} years × {QUARTERS_PER_YEAR})",
                    row.len(),
                    width,
                    index.years().len()
                )));
            }
            for (slot, v) in row.into_iter().enumerate() {
                let v = match v {
                    Some(a) if a.is_nan() => None,
                    Some(a) if a < 0.0 || a.is_infinite() => {
                        return Err(KelpError::Format(format!(
                            "pixel {p} slot {slot} has invalid area {a}"
                        )));
                    }
                    other => other,
                };
                observations.push(v);
            }
        }

        debug!(pixels = n, slots = width, "raster ingested");
        Ok(Self {
            longitude: src.longitude,
            latitude: src.latitude,
            observations,
            index,
        })
    }

    pub fn index(&self) -> &TimeIndex {
        &self.index
    }

    pub fn n_pixels(&self) -> usize {
        self.longitude.len()
    }

    /// The observation row of pixel `p`, aligned with [`Self::index`].
    pub fn observations(&self, p: usize) -> &[Option<f64>] {
        let w = self.index.len();
        &self.observations[p * w..(p + 1) * w]
    }

    /// Replace every positive area with the full pixel footprint.
    ///
    /// Lossy; applying it twice gives the same grid as applying it once.
    pub fn to_whole_pixels(&self) -> Self {
        Self {
            longitude: self.longitude.clone(),
            latitude: self.latitude.clone(),
            observations: self.observations.iter().map(|&v| whole_pixel(v)).collect(),
            index: self.index.clone(),
        }
    }
}

pub(crate) fn whole_pixel(v: Option<f64>) -> Option<f64> {
    v.map(|a| if a > 0.0 { PIXEL_FOOTPRINT_M2 } else { a })
}
