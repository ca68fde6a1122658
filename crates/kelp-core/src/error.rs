//! Error kinds shared by every component.

/// Failure raised by a kelp indicator component.
///
/// Configuration and format errors abort the whole invocation of the
/// component that detects them. `NotFound` is reported per segment.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KelpError {
    /// Unknown segment id requested, or an unsupported selector value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed or shape-inconsistent source data.
    #[error("format error: {0}")]
    Format(String),

    /// The requested status year has no row for a segment.
    #[error("no row for segment {segment_id} in year {year}")]
    NotFound { segment_id: String, year: i32 },
}

pub type KelpResult<T> = Result<T, KelpError>;

impl KelpError {
    pub(crate) fn unknown_segments(missing: &[String]) -> Self {
        Self::Configuration(format!("unknown segment id(s): {}", missing.join(", ")))
    }
}
