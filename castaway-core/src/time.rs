//! Duration conversions with explicit saturation.
//!
//! Positions and lengths are stored as integer milliseconds and reported to the
//! sync service as whole seconds; these helpers keep those conversions lossless
//! for any realistic episode and saturating otherwise.

use std::time::Duration;

/// Extension trait for saturating Duration conversions.
pub trait DurationExt {
    /// Milliseconds as u64, saturating at `u64::MAX`.
    fn as_millis_u64(&self) -> u64;

    /// Milliseconds as i64, saturating at `i64::MAX`. Used for database columns.
    fn as_millis_i64(&self) -> i64;

    /// Whole seconds as u32, saturating at `u32::MAX` (about 136 years).
    fn as_secs_u32(&self) -> u32;
}

impl DurationExt for Duration {
    fn as_millis_u64(&self) -> u64 {
        u64::try_from(self.as_millis()).unwrap_or(u64::MAX)
    }

    fn as_millis_i64(&self) -> i64 {
        i64::try_from(self.as_millis()).unwrap_or(i64::MAX)
    }

    fn as_secs_u32(&self) -> u32 {
        u32::try_from(self.as_secs()).unwrap_or(u32::MAX)
    }
}

/// Convert a stored millisecond column back into a duration.
///
/// Negative values (never written by this crate) clamp to zero.
#[must_use]
pub fn duration_from_millis_i64(ms: i64) -> Duration {
    Duration::from_millis(u64::try_from(ms).unwrap_or(0))
}
