//! Deterministic period derivation.
//!
//! Pure functions of wall-clock time and track: independent processes agree
//! on period boundaries without any coordination. A period closes the instant
//! its remaining time reaches 0 and the next period id begins.

use crate::game::types::Track;
use serde::Serialize;

/// Current unix time in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Period identifier for a track at a given instant:
/// `floor(unix_millis / window_ms)`. Monotonically increasing, never reused,
/// numbered independently per track.
pub fn period_id(track: Track, now_ms: i64) -> u64 {
    (now_ms / track.window_ms()) as u64
}

/// Whole seconds left in the currently open period, ceiling-rounded for
/// display. Equals the full duration at the instant a period opens.
pub fn secs_remaining(track: Track, now_ms: i64) -> u64 {
    let window = track.window_ms();
    let elapsed = now_ms.rem_euclid(window);
    ((window - elapsed) as u64 + 999) / 1000
}

/// Clock reading exposed to clients.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodSnapshot {
    pub track: Track,
    pub period_id: u64,
    pub secs_remaining: u64,
}

pub fn snapshot(track: Track, now_ms: i64) -> PeriodSnapshot {
    PeriodSnapshot {
        track,
        period_id: period_id(track, now_ms),
        secs_remaining: secs_remaining(track, now_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_id_advances_once_per_window() {
        let start = 1_700_000_100_000i64;
        for track in Track::ALL {
            let window = track.window_ms();
            let base = period_id(track, start);
            assert_eq!(period_id(track, start + window - 1), base);
            assert_eq!(period_id(track, start + window), base + 1);
            assert_eq!(period_id(track, start + 2 * window), base + 2);
        }
    }

    #[test]
    fn test_period_id_non_decreasing() {
        let start = 1_700_000_000_000i64;
        for track in Track::ALL {
            let mut last = period_id(track, start);
            for step in 1..600 {
                let current = period_id(track, start + step * 500);
                assert!(current >= last);
                last = current;
            }
        }
    }

    #[test]
    fn test_secs_remaining_ceiling() {
        // Period start: full duration remains.
        let start = 30_000i64 * 1000;
        assert_eq!(secs_remaining(Track::Sec30, start), 30);
        // 2.5s left rounds up to 3 for display.
        assert_eq!(secs_remaining(Track::Sec30, start + 27_500), 3);
        // Final millisecond still shows 1.
        assert_eq!(secs_remaining(Track::Sec30, start + 29_999), 1);
    }

    #[test]
    fn test_tracks_numbered_independently() {
        let now = 1_700_000_000_000i64;
        assert_ne!(
            period_id(Track::Sec30, now),
            period_id(Track::Min5, now),
        );
    }

    #[test]
    fn test_snapshot_matches_parts() {
        let now = 1_700_000_123_456i64;
        let snap = snapshot(Track::Min1, now);
        assert_eq!(snap.period_id, period_id(Track::Min1, now));
        assert_eq!(snap.secs_remaining, secs_remaining(Track::Min1, now));
    }
}
