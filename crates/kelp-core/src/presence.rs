//! Historical kelp presence per segment.
//!
//! A pixel counts as detected when any of its observations is strictly
//! positive. Detected pixels are converted to area with the full pixel
//! footprint regardless of the observed fraction, then expressed as a
//! percent of the segment's geodesic area and classified against two
//! inclusive upper bounds.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assign::{reconcile, AssignedTable};
use crate::config::{PresenceBounds, M2_PER_KM2, PIXEL_FOOTPRINT_M2};
use crate::error::KelpResult;
use crate::segments::SegmentSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PresenceCategory {
    #[serde(rename = "No Historical Kelp")]
    NoHistoricalKelp,
    #[serde(rename = "Ephemeral Kelp")]
    EphemeralKelp,
    #[serde(rename = "Kelp")]
    Kelp,
}

impl PresenceCategory {
    /// First matching rule wins: null or ≤ `no_kelp_bound` → none,
    /// ≤ `ephemeral_kelp_bound` → ephemeral, otherwise kelp.
    pub fn classify(pixel_percent: Option<f64>, bounds: &PresenceBounds) -> Self {
        match pixel_percent {
            None => Self::NoHistoricalKelp,
            Some(p) if p <= bounds.no_kelp_bound => Self::NoHistoricalKelp,
            Some(p) if p <= bounds.ephemeral_kelp_bound => Self::EphemeralKelp,
            Some(_) => Self::Kelp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub segment_id: String,
    pub segment_area_km2: f64,
    /// Real (non-placeholder) pixels joined to the segment.
    pub num_pixels: usize,
    pub num_pixels_detected: usize,
    pub pixel_area_km2: f64,
    /// Null when the segment area is zero or no pixel was ever joined.
    pub pixel_percent: Option<f64>,
    pub presence: PresenceCategory,
}

/// Presence table keyed by segment id, in segment order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresenceTable {
    pub records: Vec<PresenceRecord>,
}

impl PresenceTable {
    pub fn get(&self, segment_id: &str) -> Option<&PresenceRecord> {
        self.records.iter().find(|r| r.segment_id == segment_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.segment_id.as_str())
    }
}

/// Classify every segment of `segments`, left-joining the pixel counts from
/// `table`. Segments absent from `table` are treated as owning no pixel.
///
/// `table` should carry fractional areas; detection only depends on sign,
/// so whole-pixel input gives the same result.
pub fn classify_presence(
    table: &AssignedTable,
    segments: &SegmentSet,
    bounds: &PresenceBounds,
) -> KelpResult<PresenceTable> {
    let ids: Vec<String> = segments.ids().map(str::to_string).collect();

    let counts = reconcile(
        &ids,
        |id| {
            let rows = table.segment(id)?;
            let real = rows.iter().filter(|r| !r.is_placeholder()).count();
            let detected = rows.iter().filter(|r| r.ever_detected()).count();
            Some((real, detected))
        },
        |_| (0, 0),
    );

    let records: Vec<PresenceRecord> = segments
        .iter()
        .zip(counts)
        .map(|(seg, (num_pixels, num_pixels_detected))| {
            let segment_area_km2 = seg.area_km2();
            let pixel_area_km2 = num_pixels_detected as f64 * PIXEL_FOOTPRINT_M2 / M2_PER_KM2;
            let pixel_percent = (segment_area_km2 > 0.0 && num_pixels > 0)
                .then(|| pixel_area_km2 / segment_area_km2 * 100.0);
            PresenceRecord {
                segment_id: seg.segment_id.clone(),
                segment_area_km2,
                num_pixels,
                num_pixels_detected,
                pixel_area_km2,
                pixel_percent,
                presence: PresenceCategory::classify(pixel_percent, bounds),
            }
        })
        .collect();

    debug!(
        segments = records.len(),
        kelp = records.iter().filter(|r| r.presence == PresenceCategory::Kelp).count(),
        "presence classified"
    );
    Ok(PresenceTable { records })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assign::AssignedPixel;
    use crate::raster::TimeIndex;
    use crate::segments::tests::square;
    use crate::segments::SegmentSource;
    use approx::assert_relative_eq;

    fn pixel(id: &str, obs: Vec<Option<f64>>) -> AssignedPixel {
        AssignedPixel {
            segment_id: id.into(),
            longitude: Some(0.0),
            latitude: Some(0.0),
            observations: obs,
        }
    }

    #[test]
    fn classification_bounds_are_inclusive() {
        let b = PresenceBounds::default();
        assert_eq!(PresenceCategory::classify(None, &b), PresenceCategory::NoHistoricalKelp);
        assert_eq!(PresenceCategory::classify(Some(0.02), &b), PresenceCategory::NoHistoricalKelp);
        assert_eq!(PresenceCategory::classify(Some(0.0201), &b), PresenceCategory::EphemeralKelp);
        assert_eq!(PresenceCategory::classify(Some(0.15), &b), PresenceCategory::EphemeralKelp);
        assert_eq!(PresenceCategory::classify(Some(0.1501), &b), PresenceCategory::Kelp);
    }

    #[test]
    fn detected_pixels_use_full_footprint() {
        // ~0.01° box at the equator ≈ 1.23 km².
        let segments = SegmentSet::from_source(SegmentSource {
            segments: vec![square("a", 0.0, 0.0, 0.01), square("b", 1.0, 0.0, 0.01)],
        })
        .unwrap();
        let idx = TimeIndex::new(&[2000]).unwrap();
        let ids: Vec<String> = segments.ids().map(str::to_string).collect();
        let rows = vec![
            pixel("a", vec![Some(0.5), None, None, None]),
            pixel("a", vec![None, None, None, None]),
            pixel("a", vec![Some(0.0), Some(13.0), None, Some(0.0)]),
            pixel("b", vec![Some(0.0); 4]),
        ];
        let table = AssignedTable::from_rows(idx, &ids, rows).unwrap();
        let presence = classify_presence(&table, &segments, &PresenceBounds::default()).unwrap();

        let a = presence.get("a").unwrap();
        assert_eq!(a.num_pixels, 3);
        assert_eq!(a.num_pixels_detected, 2);
        assert_relative_eq!(a.pixel_area_km2, 0.0018, max_relative = 1e-12);
        let expected = a.pixel_area_km2 / a.segment_area_km2 * 100.0;
        assert_relative_eq!(a.pixel_percent.unwrap(), expected);
        assert_eq!(a.presence, PresenceCategory::classify(Some(expected), &PresenceBounds::default()));

        // Real pixels that never detected kelp give a zero percent, not null.
        let b = presence.get("b").unwrap();
        assert_eq!(b.num_pixels_detected, 0);
        assert_eq!(b.pixel_percent, Some(0.0));
        assert_eq!(b.presence, PresenceCategory::NoHistoricalKelp);
    }

    #[test]
    fn segment_without_pixels_has_null_percent() {
        // ~0.057° square at the equator ≈ 40 km².
        let segments = SegmentSet::from_source(SegmentSource {
            segments: vec![square("empty", 0.0, 0.0, 0.0572)],
        })
        .unwrap();
        let idx = TimeIndex::new(&[2000]).unwrap();
        let ids = vec!["empty".to_string()];
        let table = AssignedTable::from_rows(idx, &ids, Vec::new()).unwrap();
        let presence = classify_presence(&table, &segments, &PresenceBounds::default()).unwrap();

        let r = presence.get("empty").unwrap();
        assert_relative_eq!(r.segment_area_km2, 40.1, max_relative = 0.01);
        assert_eq!(r.num_pixels_detected, 0);
        assert_eq!(r.pixel_percent, None);
        assert_eq!(r.presence, PresenceCategory::NoHistoricalKelp);
    }

    #[test]
    fn segments_missing_from_table_still_appear() {
        let segments = SegmentSet::from_source(SegmentSource {
            segments: vec![square("a", 0.0, 0.0, 0.01), square("b", 1.0, 0.0, 0.01)],
        })
        .unwrap();
        let idx = TimeIndex::new(&[2000]).unwrap();
        let ids = vec!["a".to_string()];
        let table =
            AssignedTable::from_rows(idx, &ids, vec![pixel("a", vec![Some(900.0); 4])]).unwrap();
        let presence = classify_presence(&table, &segments, &PresenceBounds::default()).unwrap();
        assert_eq!(presence.ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(presence.get("b").unwrap().pixel_percent, None);
    }

    #[test]
    fn categories_partition_segments() {
        let b = PresenceBounds::default();
        let samples = [None, Some(0.0), Some(0.01), Some(0.1), Some(0.2), Some(50.0)];
        let cats: Vec<PresenceCategory> =
            samples.iter().map(|&p| PresenceCategory::classify(p, &b)).collect();
        assert_eq!(
            cats,
            vec![
                PresenceCategory::NoHistoricalKelp,
                PresenceCategory::NoHistoricalKelp,
                PresenceCategory::NoHistoricalKelp,
                PresenceCategory::EphemeralKelp,
                PresenceCategory::Kelp,
                PresenceCategory::Kelp,
            ]
        );
    }
}
