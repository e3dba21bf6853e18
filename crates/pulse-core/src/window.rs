//! Date-window arithmetic for segment classification.
//!
//! Every window is a closed interval of calendar dates. When tested against
//! timestamped events, a boundary date expands to `[00:00:00, 23:59:59]`, so
//! an event late on the last day of a window still falls inside it. No
//! timezone normalization is performed; all timestamps share one clock.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration rejected before any query is issued.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A day-count parameter was negative.
    #[error("negative day count for {parameter}: {value}")]
    NegativeDayCount {
        parameter: &'static str,
        value: i64,
    },
    /// The qualifying behavior label was blank.
    #[error("behavior label must not be blank")]
    EmptyBehavior,
    /// A window offset reaches past the start of the calendar.
    #[error("offset of {days} day(s) before {date} underflows the calendar")]
    DateUnderflow { date: NaiveDate, days: i64 },
}

/// Immutable parameters for one segmentation run.
///
/// All day counts are trailing offsets relative to the observation date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// The behavior label that counts as activity (e.g. `login`).
    pub behavior: String,
    /// The date the snapshot is computed for.
    pub observation_date: NaiveDate,
    /// Lookback, in days, for the active test.
    pub active_window: i64,
    /// Base period, in days, for the retention test.
    pub retention_base_period: i64,
    /// Target period, in days, for the retention test.
    pub retention_target_period: i64,
    /// Days of trailing inactivity that count as churn.
    pub churn_threshold: i64,
    /// Days of inactivity required, directly before the active window, for a
    /// reappearance to count as a return.
    pub return_churn_period: i64,
}

impl SegmentationConfig {
    /// Rejects malformed parameters before any query runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.behavior.trim().is_empty() {
            return Err(ConfigError::EmptyBehavior);
        }
        let day_counts = [
            ("active_window", self.active_window),
            ("retention_base_period", self.retention_base_period),
            ("retention_target_period", self.retention_target_period),
            ("churn_threshold", self.churn_threshold),
            ("return_churn_period", self.return_churn_period),
        ];
        for (parameter, value) in day_counts {
            if value < 0 {
                return Err(ConfigError::NegativeDayCount { parameter, value });
            }
        }
        Ok(())
    }
}

/// A closed interval of calendar dates.
///
/// A window whose end precedes its start is empty and contains nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// The first instant covered by the window.
    pub fn start_ts(&self) -> NaiveDateTime {
        self.start.and_time(NaiveTime::MIN)
    }

    /// The last instant covered by the window, at second granularity.
    pub fn end_ts(&self) -> NaiveDateTime {
        self.end
            .and_hms_opt(23, 59, 59)
            .expect("23:59:59 is a valid wall-clock time")
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        !self.is_empty() && ts >= self.start_ts() && ts <= self.end_ts()
    }
}

/// The date ranges each classification predicate tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentWindows {
    /// Trailing range for the active test: `[D - active_window, D]`.
    pub active: DateWindow,
    /// Earlier half of the retention test.
    pub retention_base: DateWindow,
    /// Later half of the retention test. Shares its first day with the last
    /// day of the base window; a single event on that day satisfies both
    /// halves. Kept that way deliberately.
    pub retention_target: DateWindow,
    /// Trailing range whose emptiness, given prior life, means churn.
    pub churn: DateWindow,
    /// Inactivity gap directly before the active window that a returning
    /// user must have. Empty when `return_churn_period` is zero.
    pub return_dead_zone: DateWindow,
}

impl SegmentWindows {
    /// Validates the configuration and derives all windows from it.
    pub fn for_config(config: &SegmentationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let date = config.observation_date;
        let target_start = days_before(date, config.retention_target_period)?;
        let base_start = days_before(
            date,
            config.retention_base_period + config.retention_target_period,
        )?;
        let dead_zone_start =
            days_before(date, config.active_window + config.return_churn_period)?;
        let dead_zone_end = days_before(date, config.active_window + 1)?;
        Ok(Self {
            active: DateWindow::new(days_before(date, config.active_window)?, date),
            retention_base: DateWindow::new(base_start, target_start),
            retention_target: DateWindow::new(target_start, date),
            churn: DateWindow::new(days_before(date, config.churn_threshold)?, date),
            return_dead_zone: DateWindow::new(dead_zone_start, dead_zone_end),
        })
    }
}

fn days_before(date: NaiveDate, days: i64) -> Result<NaiveDate, ConfigError> {
    u64::try_from(days)
        .ok()
        .and_then(|days| date.checked_sub_days(Days::new(days)))
        .ok_or(ConfigError::DateUnderflow { date, days })
}
