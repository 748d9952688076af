//! Session time synchronization
//!
//! Sensor timestamps are device-uptime based with an arbitrary offset. Only the
//! distance from the first captured frame of a session is meaningful for replay,
//! so every absolute timestamp is converted to an offset from that origin.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Sub;
use thiserror::Error;

/// Preferred timescale for capture timestamps (millisecond ticks)
pub const PREFERRED_TIMESCALE: i32 = 1000;

/// Time synchronization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("No time origin has been established for this session")]
    NoOrigin,
}

/// A rational media time: `value / timescale` seconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: i32,
}

impl MediaTime {
    /// Zero at the preferred timescale
    pub const ZERO: MediaTime = MediaTime {
        value: 0,
        timescale: PREFERRED_TIMESCALE,
    };

    pub fn new(value: i64, timescale: i32) -> Self {
        Self {
            value,
            timescale: timescale.max(1),
        }
    }

    /// Build a media time from seconds, rounded to the nearest tick
    pub fn from_seconds(seconds: f64, timescale: i32) -> Self {
        let timescale = timescale.max(1);
        Self {
            value: (seconds * timescale as f64).round() as i64,
            timescale,
        }
    }

    /// Value in seconds
    pub fn as_secs_f64(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }

    /// Convert to another timescale, rounding to the nearest tick
    pub fn rescale(self, timescale: i32) -> Self {
        if timescale == self.timescale {
            return self;
        }
        Self::from_seconds(self.as_secs_f64(), timescale)
    }

    pub fn is_negative(&self) -> bool {
        self.value < 0
    }

    /// Nearest slot on a constant-rate grid of `fps` frames per second
    pub fn frame_index(&self, fps: u32) -> i64 {
        let scaled = self.value as i128 * fps as i128;
        let timescale = self.timescale as i128;
        // Half a slot rounds up
        (2 * scaled + timescale).div_euclid(2 * timescale) as i64
    }

    fn cross(&self, other: &MediaTime) -> (i128, i128) {
        (
            self.value as i128 * other.timescale as i128,
            other.value as i128 * self.timescale as i128,
        )
    }
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = self.cross(other);
        a == b
    }
}

impl Eq for MediaTime {}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaTime {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = self.cross(other);
        a.cmp(&b)
    }
}

impl Sub for MediaTime {
    type Output = MediaTime;

    /// Result carries the left-hand timescale
    fn sub(self, rhs: MediaTime) -> MediaTime {
        let rhs = rhs.rescale(self.timescale);
        MediaTime {
            value: self.value - rhs.value,
            timescale: self.timescale,
        }
    }
}

/// Renders seconds in shortest round-trip form (`0`, `0.033`, `12.5`)
impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_secs_f64())
    }
}

/// Tracks the time origin of one recording session
#[derive(Debug, Clone, Default)]
pub struct TimeSynchronizer {
    origin: Option<MediaTime>,
}

impl TimeSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `timestamp` as the session origin unless one is already set.
    ///
    /// Returns `true` when this call established the origin.
    pub fn establish_origin(&mut self, timestamp: MediaTime) -> bool {
        if self.origin.is_some() {
            return false;
        }
        tracing::debug!("Session time origin established at {}s", timestamp);
        self.origin = Some(timestamp);
        true
    }

    /// The current origin, if any
    pub fn origin(&self) -> Option<MediaTime> {
        self.origin
    }

    /// Offset of `timestamp` from the session origin
    pub fn to_relative(&self, timestamp: MediaTime) -> Result<MediaTime, SyncError> {
        let origin = self.origin.ok_or(SyncError::NoOrigin)?;
        Ok(timestamp - origin)
    }

    /// Establish the origin if needed, then return the offset of `timestamp` from it
    pub fn synchronize(&mut self, timestamp: MediaTime) -> MediaTime {
        self.establish_origin(timestamp);
        let origin = self.origin.unwrap_or(timestamp);
        timestamp - origin
    }

    /// Forget the origin (end of session)
    pub fn reset(&mut self) {
        self.origin = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(seconds: f64) -> MediaTime {
        MediaTime::from_seconds(seconds, PREFERRED_TIMESCALE)
    }

    #[test]
    fn test_relative_before_origin_fails() {
        let sync = TimeSynchronizer::new();
        assert_eq!(sync.to_relative(ms(1.0)), Err(SyncError::NoOrigin));
    }

    #[test]
    fn test_origin_is_immutable() {
        let mut sync = TimeSynchronizer::new();
        assert!(sync.establish_origin(ms(1042.5)));

        for later in [0.0, 1042.4, 1042.6, 99999.0] {
            assert!(!sync.establish_origin(ms(later)));
            assert_eq!(sync.origin(), Some(ms(1042.5)));
        }
    }

    #[test]
    fn test_relative_offsets_strictly_increase() {
        let mut sync = TimeSynchronizer::new();
        let timestamps = [503.117, 503.150, 503.184, 503.217, 504.0, 610.25];
        sync.establish_origin(ms(timestamps[0]));

        let relative: Vec<MediaTime> = timestamps
            .iter()
            .map(|&t| sync.to_relative(ms(t)).unwrap())
            .collect();

        assert_eq!(relative[0], MediaTime::ZERO);
        for pair in relative.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_reset_clears_origin() {
        let mut sync = TimeSynchronizer::new();
        sync.establish_origin(ms(5.0));
        sync.reset();
        assert_eq!(sync.origin(), None);
        assert!(sync.establish_origin(ms(9.0)));
        assert_eq!(sync.to_relative(ms(9.5)).unwrap(), ms(0.5));
    }

    #[test]
    fn test_synchronize_starts_at_zero() {
        let mut sync = TimeSynchronizer::new();
        assert_eq!(sync.synchronize(ms(77.0)), MediaTime::ZERO);
        assert_eq!(sync.synchronize(ms(77.033)), ms(0.033));
        assert_eq!(sync.origin(), Some(ms(77.0)));
    }

    #[test]
    fn test_display_uses_shortest_seconds() {
        assert_eq!(MediaTime::ZERO.to_string(), "0");
        assert_eq!(ms(0.033).to_string(), "0.033");
        assert_eq!((ms(100.066) - ms(100.0)).to_string(), "0.066");
        assert_eq!(ms(12.5).to_string(), "12.5");
    }

    #[test]
    fn test_frame_index_rounds_to_nearest_slot() {
        assert_eq!(MediaTime::ZERO.frame_index(30), 0);
        assert_eq!(ms(0.033).frame_index(30), 1);
        assert_eq!(ms(0.066).frame_index(30), 2);
        assert_eq!(ms(0.5).frame_index(60), 30);
        // 0.025s is exactly half a slot at 20 fps
        assert_eq!(ms(0.025).frame_index(20), 1);
        assert_eq!(ms(0.024).frame_index(20), 0);
    }

    #[test]
    fn test_mixed_timescales_compare_by_value() {
        let a = MediaTime::new(1, 2);
        let b = MediaTime::new(500, 1000);
        assert_eq!(a, b);
        assert!(MediaTime::new(1, 3) < b);
        assert_eq!((b - a).value, 0);
    }
}
