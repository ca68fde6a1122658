//! Max-occupiable area: per-segment sum of each pixel's all-time maximum.
//!
//! This is a pixel-independent ceiling, not an area ever observed at once.

use serde::{Deserialize, Serialize};

use crate::assign::{AssignedPixel, AssignedTable};
use crate::config::M2_PER_KM2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxOccupiable {
    pub segment_id: String,
    pub max_occupiable_km2: f64,
}

/// All-time maximum of one pixel's observations; 0 when never observed.
pub fn pixel_max_observed(pixel: &AssignedPixel) -> f64 {
    pixel
        .observations
        .iter()
        .flatten()
        .copied()
        .fold(0.0, f64::max)
}

/// Max-occupiable area of every segment in `table`, in segment order.
///
/// `table` should carry fractional areas.
pub fn max_occupiable(table: &AssignedTable) -> Vec<MaxOccupiable> {
    table
        .segments()
        .map(|(id, rows)| MaxOccupiable {
            segment_id: id.to_string(),
            max_occupiable_km2: rows.iter().map(pixel_max_observed).sum::<f64>() / M2_PER_KM2,
        })
        .collect()
}
