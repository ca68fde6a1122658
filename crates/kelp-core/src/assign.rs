//! Pixel-to-segment assignment.
//!
//! Every pixel is tagged with the first segment whose interior strictly
//! contains its point; pixels outside every selected segment are dropped.
//! The result is then reconciled against the selected segment ids so that a
//! segment owning no pixel is still represented, by one placeholder row with
//! null coordinates and null observations.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SegmentSelection;
use crate::error::{KelpError, KelpResult};
use crate::raster::{PixelGrid, TimeIndex};
use crate::segments::{SegmentPolygon, SegmentSet};

/// Area treatment applied before the spatial join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelMode {
    /// Areas as observed.
    #[default]
    Fractional,
    /// Every positive area replaced by the full pixel footprint.
    Whole,
}

impl PixelMode {
    pub fn from_fractional(fractional_pixels: bool) -> Self {
        if fractional_pixels {
            Self::Fractional
        } else {
            Self::Whole
        }
    }
}

/// One pixel tagged with its owning segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedPixel {
    pub segment_id: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    /// Chronological, aligned with the table's [`TimeIndex`].
    pub observations: Vec<Option<f64>>,
}

impl AssignedPixel {
    /// Placeholder for a segment that owns no pixel.
    pub fn placeholder(segment_id: &str, n_slots: usize) -> Self {
        Self {
            segment_id: segment_id.to_string(),
            longitude: None,
            latitude: None,
            observations: vec![None; n_slots],
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.longitude.is_none() && self.latitude.is_none()
    }

    /// True when any observation is strictly positive.
    pub fn ever_detected(&self) -> bool {
        self.observations.iter().flatten().any(|&a| a > 0.0)
    }
}

/// Fill in a placeholder for every key in `keys` that `present` lacks,
/// keeping `keys` order.
pub(crate) fn reconcile<T>(
    keys: &[String],
    mut present: impl FnMut(&str) -> Option<T>,
    mut missing: impl FnMut(&str) -> T,
) -> Vec<T> {
    keys.iter()
        .map(|k| present(k).unwrap_or_else(|| missing(k)))
        .collect()
}

/// Assigned pixels grouped contiguously by segment, in segment order.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignedTable {
    index: TimeIndex,
    rows: Vec<AssignedPixel>,
    spans: Vec<(String, Range<usize>)>,
}

impl AssignedTable {
    /// Build a table from pre-assigned rows. Segments in `segment_ids` with no
    /// row receive a placeholder; rows naming a segment outside `segment_ids`
    /// or lacking coordinates are rejected.
    pub fn from_rows(
        index: TimeIndex,
        segment_ids: &[String],
        rows: Vec<AssignedPixel>,
    ) -> KelpResult<Self> {
        let mut buckets: Vec<Vec<AssignedPixel>> = vec![Vec::new(); segment_ids.len()];
        for row in rows {
            if row.observations.len() != index.len() {
                return Err(KelpError::Format(format!(
                    "row for segment {} has {} slots, expected {}",
                    row.segment_id,
                    row.observations.len(),
                    index.len()
                )));
            }
            if row.longitude.is_none() || row.latitude.is_none() {
                return Err(KelpError::Format(format!(
                    "row for segment {} has no coordinates",
                    row.segment_id
                )));
            }
            let pos = segment_ids
                .iter()
                .position(|id| *id == row.segment_id)
                .ok_or_else(|| KelpError::unknown_segments(&[row.segment_id.clone()]))?;
            buckets[pos].push(row);
        }
        Ok(Self::from_buckets(index, segment_ids, buckets))
    }

    fn from_buckets(
        index: TimeIndex,
        segment_ids: &[String],
        mut buckets: Vec<Vec<AssignedPixel>>,
    ) -> Self {
        let n_slots = index.len();
        let grouped = reconcile(
            segment_ids,
            |id| {
                let pos = segment_ids.iter().position(|s| s == id)?;
                let bucket = std::mem::take(&mut buckets[pos]);
                (!bucket.is_empty()).then_some(bucket)
            },
            |id| vec![AssignedPixel::placeholder(id, n_slots)],
        );

        let mut rows = Vec::with_capacity(grouped.iter().map(Vec::len).sum());
        let mut spans = Vec::with_capacity(grouped.len());
        for (id, bucket) in segment_ids.iter().zip(grouped) {
            let start = rows.len();
            rows.extend(bucket);
            spans.push((id.clone(), start..rows.len()));
        }
        Self { index, rows, spans }
    }

    pub fn index(&self) -> &TimeIndex {
        &self.index
    }

    pub fn rows(&self) -> &[AssignedPixel] {
        &self.rows
    }

    pub fn segment_ids(&self) -> impl Iterator<Item = &str> {
        self.spans.iter().map(|(id, _)| id.as_str())
    }

    /// Each segment's rows, in segment order.
    pub fn segments(&self) -> impl Iterator<Item = (&str, &[AssignedPixel])> {
        self.spans
            .iter()
            .map(|(id, r)| (id.as_str(), &self.rows[r.clone()]))
    }

    pub fn segment(&self, segment_id: &str) -> Option<&[AssignedPixel]> {
        self.spans
            .iter()
            .find(|(id, _)| id == segment_id)
            .map(|(_, r)| &self.rows[r.clone()])
    }

}

fn owner(segments: &[&SegmentPolygon], lon: f64, lat: f64) -> Option<usize> {
    segments.iter().position(|s| s.contains(lon, lat))
}

#[cfg(feature = "threading")]
fn owners(grid: &PixelGrid, segments: &[&SegmentPolygon]) -> Vec<Option<usize>> {
    use rayon::prelude::*;
    (0..grid.n_pixels())
        .into_par_iter()
        .map(|p| owner(segments, grid.longitude[p], grid.latitude[p]))
        .collect()
}

#[cfg(not(feature = "threading"))]
fn owners(grid: &PixelGrid, segments: &[&SegmentPolygon]) -> Vec<Option<usize>> {
    (0..grid.n_pixels())
        .map(|p| owner(segments, grid.longitude[p], grid.latitude[p]))
        .collect()
}

/// Join pixels to the selected segments.
///
/// Fails if `selection` names a segment absent from `segments`.
pub fn assign_pixels(
    grid: &PixelGrid,
    segments: &SegmentSet,
    selection: &SegmentSelection,
    mode: PixelMode,
) -> KelpResult<AssignedTable> {
    let selected = segments.select(selection)?;
    let coerced;
    let grid = match mode {
        PixelMode::Fractional => grid,
        PixelMode::Whole => {
            coerced = grid.to_whole_pixels();
            &coerced
        }
    };

    let mut buckets: Vec<Vec<AssignedPixel>> = vec![Vec::new(); selected.len()];
    let mut dropped = 0usize;
    for (p, owner) in owners(grid, &selected).into_iter().enumerate() {
        let Some(s) = owner else {
            dropped += 1;
            continue;
        };
        buckets[s].push(AssignedPixel {
            segment_id: selected[s].segment_id.clone(),
            longitude: Some(grid.longitude[p]),
            latitude: Some(grid.latitude[p]),
            observations: grid.observations(p).to_vec(),
        });
    }

    let ids: Vec<String> = selected.iter().map(|s| s.segment_id.clone()).collect();
    let empty = buckets.iter().filter(|b| b.is_empty()).count();
    debug!(
        pixels = grid.n_pixels(),
        dropped,
        segments = ids.len(),
        empty_segments = empty,
        ?mode,
        "pixels assigned"
    );
    Ok(AssignedTable::from_buckets(grid.index().clone(), &ids, buckets))
}
