//! Segment planning: how many pieces to cut a source into, and how long
//! each piece is.

use serde::Serialize;

use crate::{Error, Result};

/// How a source of a given duration is cut into segments.
///
/// `unit_duration = max(min_segment_secs, ceil(total_duration / target_count))`
/// and `segment_count = ceil(total_duration / unit_duration)`. The last
/// segment may be shorter than `unit_duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegmentPlan {
    /// Length of each segment in whole seconds.
    pub unit_duration: u64,
    /// Number of segments the split is expected to produce.
    pub segment_count: usize,
}

impl SegmentPlan {
    /// Compute the plan for `total_duration` seconds split `target_count`
    /// ways, never cutting segments shorter than `min_segment_secs`.
    ///
    /// `target_count` and `min_segment_secs` are clamped to at least 1.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] if `total_duration` is not a positive, finite
    /// number of seconds.
    pub fn compute(total_duration: f64, target_count: usize, min_segment_secs: u64) -> Result<Self> {
        if !total_duration.is_finite() || total_duration <= 0.0 {
            return Err(Error::Validation(format!(
                "cannot plan segments for a duration of {total_duration}s"
            )));
        }

        let target = target_count.max(1) as f64;
        let per_target = (total_duration / target).ceil() as u64;
        let unit_duration = per_target.max(min_segment_secs.max(1));
        let segment_count = (total_duration / unit_duration as f64).ceil() as usize;

        Ok(Self {
            unit_duration,
            segment_count,
        })
    }
}
