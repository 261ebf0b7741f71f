//! Half-open time windows and the canonical dashboard presets.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// A half-open interval `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub from: Timestamp,
    pub to: Timestamp,
}

impl TimeRange {
    /// Build a range, rejecting one that ends before it starts.
    pub fn new(from: Timestamp, to: Timestamp) -> Result<Self, CoreError> {
        if to < from {
            return Err(CoreError::Validation(format!(
                "range end {to} is before range start {from}"
            )));
        }
        Ok(Self { from, to })
    }

    /// A range covering `lookback` before `at`, including `at` itself.
    ///
    /// Store timestamps have microsecond precision, so the exclusive end is
    /// one microsecond past `at`.
    pub fn through(at: Timestamp, lookback: Duration) -> Self {
        Self {
            from: at - lookback,
            to: at + Duration::microseconds(1),
        }
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        self.from <= ts && ts < self.to
    }
}

/// Window presets offered by the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowPreset {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[default]
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
}

impl WindowPreset {
    pub const ALL: [WindowPreset; 4] = [
        WindowPreset::OneHour,
        WindowPreset::SixHours,
        WindowPreset::OneDay,
        WindowPreset::SevenDays,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WindowPreset::OneHour => "1h",
            WindowPreset::SixHours => "6h",
            WindowPreset::OneDay => "24h",
            WindowPreset::SevenDays => "7d",
        }
    }

    pub fn duration(self) -> Duration {
        match self {
            WindowPreset::OneHour => Duration::hours(1),
            WindowPreset::SixHours => Duration::hours(6),
            WindowPreset::OneDay => Duration::hours(24),
            WindowPreset::SevenDays => Duration::days(7),
        }
    }

    /// `[now - duration, now)`.
    pub fn range_ending_at(self, now: Timestamp) -> TimeRange {
        TimeRange {
            from: now - self.duration(),
            to: now,
        }
    }

    pub fn current_range(self) -> TimeRange {
        self.range_ending_at(Utc::now())
    }
}

impl fmt::Display for WindowPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindowPreset {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "unknown window '{s}', expected one of 1h, 6h, 24h, 7d"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn preset_durations() {
        assert_eq!(WindowPreset::OneHour.duration(), Duration::seconds(3_600));
        assert_eq!(WindowPreset::SixHours.duration(), Duration::seconds(21_600));
        assert_eq!(WindowPreset::OneDay.duration(), Duration::seconds(86_400));
        assert_eq!(WindowPreset::SevenDays.duration(), Duration::seconds(604_800));
    }

    #[test]
    fn preset_range_ends_at_now() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let range = WindowPreset::SixHours.range_ending_at(now);
        assert_eq!(range.to, now);
        assert_eq!(range.from, Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap());
    }

    #[test]
    fn presets_parse_and_render() {
        for preset in WindowPreset::ALL {
            assert_eq!(preset.as_str().parse::<WindowPreset>().unwrap(), preset);
        }
        assert_matches!("2h".parse::<WindowPreset>(), Err(CoreError::Validation(_)));
        assert_eq!(WindowPreset::default(), WindowPreset::OneDay);
    }

    #[test]
    fn range_is_half_open() {
        let from = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2025, 3, 1, 1, 0, 0).unwrap();
        let range = TimeRange::new(from, to).unwrap();
        assert!(range.contains(from));
        assert!(!range.contains(to));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let from = Utc.with_ymd_and_hms(2025, 3, 1, 1, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert_matches!(TimeRange::new(from, to), Err(CoreError::Validation(_)));
    }

    #[test]
    fn through_includes_the_evaluation_instant() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 1, 0, 0).unwrap();
        let range = TimeRange::through(at, Duration::hours(1));
        assert!(range.contains(at));
        assert!(range.contains(at - Duration::hours(1)));
    }
}
