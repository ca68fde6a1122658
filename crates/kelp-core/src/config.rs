//! Configuration surface shared by all components.
//!
//! Every selector parses from its user-facing string via `FromStr`; an
//! unsupported value is a [`KelpError::Configuration`]. `IndicatorConfig`
//! round-trips through JSON with the same names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KelpError, KelpResult};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Footprint of one full Landsat pixel (30 m × 30 m), in square metres.
pub const PIXEL_FOOTPRINT_M2: f64 = 900.0;

/// Square metres per square kilometre.
pub const M2_PER_KM2: f64 = 1.0e6;

/// Status value reported when a segment has no usable historical baseline.
pub const MISSING_STATUS: f64 = -999.0;

/// Default presence bounds, in percent of segment area.
pub const DEFAULT_NO_KELP_BOUND: f64 = 0.02;
pub const DEFAULT_EPHEMERAL_KELP_BOUND: f64 = 0.15;

// ── Selectors ─────────────────────────────────────────────────────────────────

/// Output frequency of an extracted time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Quarterly,
    #[default]
    Annual,
}

impl FromStr for Frequency {
    type Err = KelpError;

    fn from_str(s: &str) -> KelpResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quarterly" => Ok(Self::Quarterly),
            "annual" => Ok(Self::Annual),
            other => Err(KelpError::Configuration(format!(
                "unsupported frequency '{other}' (expected quarterly or annual)"
            ))),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Quarterly => "quarterly",
            Self::Annual => "annual",
        })
    }
}

/// Rule collapsing four quarterly observations into one yearly value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnualizationMethod {
    /// Per-pixel yearly maximum, then summed over the segment.
    #[default]
    MaxFirst,
    /// Per-segment quarterly sums, then the yearly maximum of those sums.
    SumFirst,
    #[serde(alias = "Q1")]
    Q1,
    #[serde(alias = "Q2")]
    Q2,
    #[serde(alias = "Q3")]
    Q3,
    #[serde(alias = "Q4")]
    Q4,
}

impl AnnualizationMethod {
    pub const ALL: [AnnualizationMethod; 6] = [
        Self::MaxFirst,
        Self::SumFirst,
        Self::Q1,
        Self::Q2,
        Self::Q3,
        Self::Q4,
    ];

    /// The single quarter this method selects, if it is a quarter selector.
    pub fn quarter(self) -> Option<u8> {
        match self {
            Self::Q1 => Some(1),
            Self::Q2 => Some(2),
            Self::Q3 => Some(3),
            Self::Q4 => Some(4),
            Self::MaxFirst | Self::SumFirst => None,
        }
    }
}

impl FromStr for AnnualizationMethod {
    type Err = KelpError;

    fn from_str(s: &str) -> KelpResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "max_first" => Ok(Self::MaxFirst),
            "sum_first" => Ok(Self::SumFirst),
            "q1" => Ok(Self::Q1),
            "q2" => Ok(Self::Q2),
            "q3" => Ok(Self::Q3),
            "q4" => Ok(Self::Q4),
            other => Err(KelpError::Configuration(format!(
                "unsupported annualization method '{other}' \
                 (expected max_first, sum_first, Q1, Q2, Q3 or Q4)"
            ))),
        }
    }
}

impl fmt::Display for AnnualizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MaxFirst => "max_first",
            Self::SumFirst => "sum_first",
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
        })
    }
}

/// Which segments a component should report on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "SelectionRepr", into = "SelectionRepr")]
pub enum SegmentSelection {
    #[default]
    All,
    Only(Vec<String>),
}

impl SegmentSelection {
    pub fn only<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(ids.into_iter().map(Into::into).collect())
    }

    /// Resolve against the known segment ids, preserving the known order for
    /// `All` and the requested order for `Only`.
    ///
    /// Fails if any requested id is not known.
    pub fn resolve<'a, I>(&self, known: I) -> KelpResult<Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let known: Vec<&str> = known.into_iter().collect();
        match self {
            Self::All => Ok(known.iter().map(|s| s.to_string()).collect()),
            Self::Only(ids) => {
                let missing: Vec<String> = ids
                    .iter()
                    .filter(|id| !known.contains(&id.as_str()))
                    .cloned()
                    .collect();
                if !missing.is_empty() {
                    return Err(KelpError::unknown_segments(&missing));
                }
                let mut out: Vec<String> = Vec::with_capacity(ids.len());
                for id in ids {
                    if !out.contains(id) {
                        out.push(id.clone());
                    }
                }
                Ok(out)
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SelectionRepr {
    Keyword(String),
    List(Vec<String>),
}

impl TryFrom<SelectionRepr> for SegmentSelection {
    type Error = KelpError;

    fn try_from(repr: SelectionRepr) -> KelpResult<Self> {
        match repr {
            SelectionRepr::Keyword(k) if k.eq_ignore_ascii_case("all") => Ok(Self::All),
            SelectionRepr::Keyword(k) => Ok(Self::Only(vec![k])),
            SelectionRepr::List(ids) => Ok(Self::Only(ids)),
        }
    }
}

impl From<SegmentSelection> for SelectionRepr {
    fn from(sel: SegmentSelection) -> Self {
        match sel {
            SegmentSelection::All => SelectionRepr::Keyword("all".into()),
            SegmentSelection::Only(ids) => SelectionRepr::List(ids),
        }
    }
}

/// Year whose annual value a status is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "StatusYearRepr", into = "StatusYearRepr")]
pub enum StatusYear {
    /// The maximum year present in the series.
    #[default]
    Latest,
    Year(i32),
}

impl StatusYear {
    /// Resolve `Latest` against the years present in a series.
    pub fn resolve(self, years: impl IntoIterator<Item = i32>) -> Option<i32> {
        match self {
            Self::Year(y) => Some(y),
            Self::Latest => years.into_iter().max(),
        }
    }
}

impl FromStr for StatusYear {
    type Err = KelpError;

    fn from_str(s: &str) -> KelpResult<Self> {
        if s.eq_ignore_ascii_case("latest") {
            return Ok(Self::Latest);
        }
        s.parse::<i32>()
            .map(Self::Year)
            .map_err(|_| KelpError::Configuration(format!("invalid status year '{s}'")))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StatusYearRepr {
    Year(i32),
    Keyword(String),
}

impl TryFrom<StatusYearRepr> for StatusYear {
    type Error = KelpError;

    fn try_from(repr: StatusYearRepr) -> KelpResult<Self> {
        match repr {
            StatusYearRepr::Year(y) => Ok(Self::Year(y)),
            StatusYearRepr::Keyword(k) => k.parse(),
        }
    }
}

impl From<StatusYear> for StatusYearRepr {
    fn from(y: StatusYear) -> Self {
        match y {
            StatusYear::Latest => StatusYearRepr::Keyword("latest".into()),
            StatusYear::Year(y) => StatusYearRepr::Year(y),
        }
    }
}

/// Inclusive year range used as the historical reference period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineWindow {
    pub first_year: i32,
    pub last_year: i32,
}

impl BaselineWindow {
    pub fn contains(&self, year: i32) -> bool {
        (self.first_year..=self.last_year).contains(&year)
    }
}

impl Default for BaselineWindow {
    fn default() -> Self {
        Self { first_year: 1984, last_year: 2013 }
    }
}

/// Presence thresholds, both inclusive upper bounds in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceBounds {
    pub no_kelp_bound: f64,
    pub ephemeral_kelp_bound: f64,
}

impl Default for PresenceBounds {
    fn default() -> Self {
        Self {
            no_kelp_bound: DEFAULT_NO_KELP_BOUND,
            ephemeral_kelp_bound: DEFAULT_EPHEMERAL_KELP_BOUND,
        }
    }
}

// ── Top-level config ──────────────────────────────────────────────────────────

/// User-facing indicator parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub frequency: Frequency,
    /// Only consulted when `frequency` is annual.
    pub annualization_method: AnnualizationMethod,
    /// When false, every positive area is replaced with the full pixel
    /// footprint before the time series is extracted.
    pub fractional_pixels: bool,
    #[serde(flatten)]
    pub bounds: PresenceBounds,
    pub segments: SegmentSelection,
    pub status_year: StatusYear,
    pub baseline: BaselineWindow,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            frequency: Frequency::Annual,
            annualization_method: AnnualizationMethod::MaxFirst,
            fractional_pixels: true,
            bounds: PresenceBounds::default(),
            segments: SegmentSelection::All,
            status_year: StatusYear::Latest,
            baseline: BaselineWindow::default(),
        }
    }
}

impl IndicatorConfig {
    pub fn from_json(text: &str) -> KelpResult<Self> {
        let cfg: Self = serde_json::from_str(text)
            .map_err(|e| KelpError::Configuration(format!("invalid config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> KelpResult<()> {
        let b = &self.bounds;
        if !(b.no_kelp_bound.is_finite() && b.ephemeral_kelp_bound.is_finite()) {
            return Err(KelpError::Configuration("presence bounds must be finite".into()));
        }
        if b.no_kelp_bound > b.ephemeral_kelp_bound {
            return Err(KelpError::Configuration(format!(
                "no_kelp_bound {} exceeds ephemeral_kelp_bound {}",
                b.no_kelp_bound, b.ephemeral_kelp_bound
            )));
        }
        if self.baseline.first_year > self.baseline.last_year {
            return Err(KelpError::Configuration(format!(
                "baseline {}..={} is empty",
                self.baseline.first_year, self.baseline.last_year
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parses_both_cases() {
        assert_eq!("Q3".parse::<AnnualizationMethod>().unwrap(), AnnualizationMethod::Q3);
        assert_eq!("q3".parse::<AnnualizationMethod>().unwrap(), AnnualizationMethod::Q3);
        assert_eq!(
            "sum_first".parse::<AnnualizationMethod>().unwrap(),
            AnnualizationMethod::SumFirst
        );
    }

    #[test]
    fn unsupported_selectors_are_configuration_errors() {
        assert!(matches!(
            "median_first".parse::<AnnualizationMethod>(),
            Err(KelpError::Configuration(_))
        ));
        assert!(matches!("monthly".parse::<Frequency>(), Err(KelpError::Configuration(_))));
        assert!(matches!("soon".parse::<StatusYear>(), Err(KelpError::Configuration(_))));
    }

    #[test]
    fn selection_rejects_unknown_ids() {
        let known = ["a", "b", "c"];
        let sel = SegmentSelection::only(["c", "z", "a"]);
        match sel.resolve(known.iter().copied()) {
            Err(KelpError::Configuration(msg)) => assert!(msg.contains('z'), "msg = {msg}"),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn selection_keeps_requested_order() {
        let known = ["a", "b", "c"];
        let ids = SegmentSelection::only(["c", "a", "c"]).resolve(known.iter().copied()).unwrap();
        assert_eq!(ids, vec!["c", "a"]);
        let all = SegmentSelection::All.resolve(known.iter().copied()).unwrap();
        assert_eq!(all, vec!["a", "b", "c"]);
    }

    #[test]
    fn config_json_defaults_and_overrides() {
        let cfg = IndicatorConfig::from_json(
            r#"{ "annualization_method": "q2", "segments": ["s1"], "status_year": 2020 }"#,
        )
        .unwrap();
        assert_eq!(cfg.annualization_method, AnnualizationMethod::Q2);
        assert_eq!(cfg.segments, SegmentSelection::only(["s1"]));
        assert_eq!(cfg.status_year, StatusYear::Year(2020));
        assert!(cfg.fractional_pixels);
        assert_eq!(cfg.bounds, PresenceBounds::default());

        let round = serde_json::to_string(&IndicatorConfig::default()).unwrap();
        assert!(round.contains("\"segments\":\"all\""), "{round}");
        assert!(round.contains("\"status_year\":\"latest\""), "{round}");
        assert_eq!(IndicatorConfig::from_json(&round).unwrap(), IndicatorConfig::default());
    }

    #[test]
    fn config_rejects_inverted_bounds() {
        let err = IndicatorConfig::from_json(
            r#"{ "no_kelp_bound": 0.5, "ephemeral_kelp_bound": 0.1 }"#,
        );
        assert!(matches!(err, Err(KelpError::Configuration(_))));
    }

    #[test]
    fn latest_status_year_resolves_to_max() {
        assert_eq!(StatusYear::Latest.resolve([1990, 2021, 2005]), Some(2021));
        assert_eq!(StatusYear::Year(2000).resolve([1990]), Some(2000));
        assert_eq!(StatusYear::Latest.resolve(std::iter::empty()), None);
    }
}
