//! Coastal management segment polygons (WGS84 lon/lat).

use geo::{BoundingRect, Contains, Coord, GeodesicArea, LineString, Point, Polygon, Rect};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{SegmentSelection, M2_PER_KM2};
use crate::error::{KelpError, KelpResult};

/// Raw polygon layer as read from the source file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentSource {
    pub segments: Vec<SegmentFeature>,
}

/// One feature of the polygon layer. Rings are `[lon, lat]` vertex lists;
/// closing the ring is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentFeature {
    #[serde(alias = "Segment_ID")]
    pub segment_id: String,
    pub exterior: Vec<[f64; 2]>,
    #[serde(default)]
    pub interiors: Vec<Vec<[f64; 2]>>,
}

/// A segment polygon with its derived bounding box and geodesic area.
#[derive(Debug, Clone)]
pub struct SegmentPolygon {
    pub segment_id: String,
    pub polygon: Polygon<f64>,
    bbox: Rect<f64>,
    area_km2: f64,
}

impl SegmentPolygon {
    pub fn new(segment_id: impl Into<String>, polygon: Polygon<f64>) -> KelpResult<Self> {
        let segment_id = segment_id.into();
        let bbox = polygon.bounding_rect().ok_or_else(|| {
            KelpError::Format(format!("segment {segment_id} has an empty polygon"))
        })?;
        let area_km2 = polygon.geodesic_area_unsigned() / M2_PER_KM2;
        Ok(Self { segment_id, polygon, bbox, area_km2 })
    }

    /// Geodesic area on the WGS84 ellipsoid, in square kilometres.
    pub fn area_km2(&self) -> f64 {
        self.area_km2
    }

    /// True when `(lon, lat)` lies strictly inside the polygon. Points on the
    /// boundary (or inside a hole) are outside.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let (min, max) = (self.bbox.min(), self.bbox.max());
        if lon <= min.x || lon >= max.x || lat <= min.y || lat >= max.y {
            return false;
        }
        self.polygon.contains(&Point::new(lon, lat))
    }
}

fn ring(segment_id: &str, pts: &[[f64; 2]]) -> KelpResult<LineString<f64>> {
    if pts.iter().flatten().any(|v| !v.is_finite()) {
        return Err(KelpError::Format(format!(
            "segment {segment_id} has a non-finite vertex"
        )));
    }
    let mut coords: Vec<Coord<f64>> = pts.iter().map(|&[x, y]| Coord { x, y }).collect();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    if coords.len() < 3 {
        return Err(KelpError::Format(format!(
            "segment {segment_id} has a ring with fewer than 3 distinct vertices"
        )));
    }
    // `Polygon::new` closes the ring.
    Ok(LineString::new(coords))
}

/// The full set of segments, in source order.
#[derive(Debug, Clone, Default)]
pub struct SegmentSet {
    segments: Vec<SegmentPolygon>,
}

impl SegmentSet {
    pub fn new(segments: Vec<SegmentPolygon>) -> KelpResult<Self> {
        for (i, s) in segments.iter().enumerate() {
            if segments[..i].iter().any(|o| o.segment_id == s.segment_id) {
                return Err(KelpError::Format(format!(
                    "duplicate Segment_ID {}",
                    s.segment_id
                )));
            }
        }
        Ok(Self { segments })
    }

    pub fn from_source(src: SegmentSource) -> KelpResult<Self> {
        let mut segments = Vec::with_capacity(src.segments.len());
        for f in src.segments {
            let exterior = ring(&f.segment_id, &f.exterior)?;
            let interiors = f
                .interiors
                .iter()
                .map(|r| ring(&f.segment_id, r))
                .collect::<KelpResult<Vec<_>>>()?;
            segments.push(SegmentPolygon::new(f.segment_id, Polygon::new(exterior, interiors))?);
        }
        debug!(segments = segments.len(), "segment polygons loaded");
        Self::new(segments)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SegmentPolygon> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|s| s.segment_id.as_str())
    }

    pub fn get(&self, segment_id: &str) -> Option<&SegmentPolygon> {
        self.segments.iter().find(|s| s.segment_id == segment_id)
    }

    /// The selected segments, in resolution order. Fails if any requested id
    /// is not in the set.
    pub fn select(&self, selection: &SegmentSelection) -> KelpResult<Vec<&SegmentPolygon>> {
        let ids = selection.resolve(self.ids())?;
        Ok(ids.iter().filter_map(|id| self.get(id)).collect())
    }

    /// Owned subset of the selected segments.
    pub fn subset(&self, selection: &SegmentSelection) -> KelpResult<Self> {
        let segments = self.select(selection)?.into_iter().cloned().collect();
        Ok(Self { segments })
    }
}
