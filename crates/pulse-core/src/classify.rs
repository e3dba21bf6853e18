//! The four segment classification predicates.
//!
//! Active and Retained are range-membership tests over independently queried
//! user sets. Returning and Churned each AND conditions across disjoint
//! temporal partitions of one user's history, so both are evaluated in a
//! single pass over that history; decomposing them into separately fetched
//! window sets could combine inconsistent snapshots of the same user.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::window::SegmentWindows;

/// All qualifying event timestamps for one user, ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserHistory {
    pub user_id: String,
    pub timestamps: Vec<NaiveDateTime>,
}

/// Everything the classifier needs from the event store for one run.
#[derive(Debug, Default, Clone)]
pub struct ClassifierInput {
    /// Distinct users with a qualifying event in the active window.
    pub active_users: HashSet<String>,
    /// Distinct users with a qualifying event in the retention base window.
    pub retention_base_users: HashSet<String>,
    /// Distinct users with a qualifying event in the retention target window.
    pub retention_target_users: HashSet<String>,
    /// Full qualifying history per user, one snapshot per run.
    pub histories: Vec<UserHistory>,
}

/// The four classification sets for one run. Not mutually exclusive: a user
/// active every day is both active and retained.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SegmentSets {
    pub active: HashSet<String>,
    pub retained: HashSet<String>,
    pub returning: HashSet<String>,
    pub churned: HashSet<String>,
}

/// One snapshot row: four independent flags for a user on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub user_id: String,
    pub calc_date: NaiveDate,
    pub is_active: bool,
    pub is_retained: bool,
    pub is_returning: bool,
    pub is_churned: bool,
}

/// Applies the four predicates to the fetched store outputs.
pub fn classify(windows: &SegmentWindows, input: &ClassifierInput) -> SegmentSets {
    let mut sets = SegmentSets {
        active: input.active_users.clone(),
        retained: input
            .retention_base_users
            .intersection(&input.retention_target_users)
            .cloned()
            .collect(),
        ..SegmentSets::default()
    };

    for history in &input.histories {
        let verdict = scan_history(windows, &history.timestamps);
        if verdict.returning {
            sets.returning.insert(history.user_id.clone());
        }
        if verdict.churned {
            sets.churned.insert(history.user_id.clone());
        }
    }

    tracing::debug!(
        active = sets.active.len(),
        retained = sets.retained.len(),
        returning = sets.returning.len(),
        churned = sets.churned.len(),
        "classified segment sets"
    );
    sets
}

struct HistoryVerdict {
    returning: bool,
    churned: bool,
}

/// Evaluates the history-partition predicates in one pass per user.
///
/// Returning: active now, no event in the dead zone, and at least one event
/// strictly before the dead zone opens. Churned: nothing in the churn
/// window, and at least one event strictly before it opens. An empty
/// history satisfies neither; absence of history is not churn.
fn scan_history(windows: &SegmentWindows, timestamps: &[NaiveDateTime]) -> HistoryVerdict {
    let dead_zone_opens = windows.return_dead_zone.start_ts();
    let churn_window_opens = windows.churn.start_ts();

    let mut active = false;
    let mut in_dead_zone = false;
    let mut before_dead_zone = false;
    let mut in_churn_window = false;
    let mut before_churn_window = false;

    for &ts in timestamps {
        active |= windows.active.contains(ts);
        in_dead_zone |= windows.return_dead_zone.contains(ts);
        before_dead_zone |= ts < dead_zone_opens;
        in_churn_window |= windows.churn.contains(ts);
        before_churn_window |= ts < churn_window_opens;
    }

    HistoryVerdict {
        returning: active && !in_dead_zone && before_dead_zone,
        churned: !in_churn_window && before_churn_window,
    }
}

/// Merges the classification sets with the user universe: exactly one
/// record per known user, flags by set membership, absent users all-false.
pub fn build_snapshot(
    users: &[String],
    calc_date: NaiveDate,
    sets: &SegmentSets,
) -> Vec<SegmentRecord> {
    users
        .iter()
        .map(|user_id| SegmentRecord {
            user_id: user_id.clone(),
            calc_date,
            is_active: sets.active.contains(user_id),
            is_retained: sets.retained.contains(user_id),
            is_returning: sets.returning.contains(user_id),
            is_churned: sets.churned.contains(user_id),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::SegmentationConfig;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn demo_windows() -> SegmentWindows {
        SegmentWindows::for_config(&SegmentationConfig {
            behavior: "login".to_string(),
            observation_date: date("2023-06-30"),
            active_window: 1,
            retention_base_period: 1,
            retention_target_period: 1,
            churn_threshold: 7,
            return_churn_period: 7,
        })
        .unwrap()
    }

    fn history(user_id: &str, timestamps: &[&str]) -> UserHistory {
        UserHistory {
            user_id: user_id.to_string(),
            timestamps: timestamps.iter().map(|s| ts(s)).collect(),
        }
    }

    fn users(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| (*id).to_string()).collect()
    }

    #[test]
    fn daily_active_user_is_both_active_and_retained() {
        let input = ClassifierInput {
            active_users: users(&["user_001"]),
            retention_base_users: users(&["user_001"]),
            retention_target_users: users(&["user_001"]),
            histories: vec![history(
                "user_001",
                &[
                    "2023-06-28 09:30:00",
                    "2023-06-29 10:15:00",
                    "2023-06-30 11:00:00",
                ],
            )],
        };

        let sets = classify(&demo_windows(), &input);
        assert!(sets.active.contains("user_001"));
        assert!(sets.retained.contains("user_001"));
        assert!(!sets.returning.contains("user_001"));
        assert!(!sets.churned.contains("user_001"));
    }

    #[test]
    fn retained_requires_both_halves() {
        let input = ClassifierInput {
            active_users: users(&["base_only", "target_only", "both"]),
            retention_base_users: users(&["base_only", "both"]),
            retention_target_users: users(&["target_only", "both"]),
            histories: Vec::new(),
        };

        let sets = classify(&demo_windows(), &input);
        assert_eq!(sets.retained, users(&["both"]));
    }

    #[test]
    fn returning_requires_dead_zone_and_prior_life() {
        // Active on the observation date, silent through the dead zone
        // [06-22, 06-28], with proof of life before it.
        let windows = demo_windows();
        let input = ClassifierInput {
            active_users: users(&["user_004"]),
            histories: vec![history(
                "user_004",
                &["2023-06-20 13:30:00", "2023-06-30 16:20:00"],
            )],
            ..ClassifierInput::default()
        };
        let sets = classify(&windows, &input);
        assert!(sets.returning.contains("user_004"));

        // Same shape without the earlier event: no proof of prior life.
        let input = ClassifierInput {
            active_users: users(&["user_007"]),
            histories: vec![history("user_007", &["2023-06-30 08:30:00"])],
            ..ClassifierInput::default()
        };
        let sets = classify(&windows, &input);
        assert!(!sets.returning.contains("user_007"));
    }

    #[test]
    fn dead_zone_event_blocks_returning() {
        let input = ClassifierInput {
            active_users: users(&["user_003"]),
            histories: vec![history(
                "user_003",
                &[
                    "2023-06-10 08:00:00",
                    "2023-06-25 08:50:00",
                    "2023-06-30 09:10:00",
                ],
            )],
            ..ClassifierInput::default()
        };
        let sets = classify(&demo_windows(), &input);
        assert!(!sets.returning.contains("user_003"));
    }

    #[test]
    fn churn_requires_prior_life() {
        let input = ClassifierInput {
            histories: vec![
                history("silent_then_gone", &["2023-06-15 17:45:00"]),
                history("no_events", &[]),
                history("recently_seen", &["2023-06-28 11:20:00"]),
            ],
            ..ClassifierInput::default()
        };

        let sets = classify(&demo_windows(), &input);
        assert!(sets.churned.contains("silent_then_gone"));
        assert!(!sets.churned.contains("no_events"));
        assert!(!sets.churned.contains("recently_seen"));
    }

    #[test]
    fn single_old_event_matches_churn_scenario() {
        // user_006: one login on 2023-06-15, observed 2023-06-30 with a
        // 7-day churn threshold.
        let input = ClassifierInput {
            histories: vec![history("user_006", &["2023-06-15 17:45:00"])],
            ..ClassifierInput::default()
        };
        let sets = classify(&demo_windows(), &input);
        assert!(!sets.active.contains("user_006"));
        assert!(sets.churned.contains("user_006"));
    }

    #[test]
    fn event_on_churn_window_boundary_is_not_churn() {
        // The churn window opens on 06-23; an event that day is inside it.
        let input = ClassifierInput {
            histories: vec![history(
                "edge",
                &["2023-06-01 09:00:00", "2023-06-23 00:00:00"],
            )],
            ..ClassifierInput::default()
        };
        let sets = classify(&demo_windows(), &input);
        assert!(!sets.churned.contains("edge"));
    }

    #[test]
    fn snapshot_covers_the_whole_universe_with_default_false() {
        let universe = vec![
            "user_001".to_string(),
            "user_008".to_string(),
            "user_010".to_string(),
        ];
        let sets = SegmentSets {
            active: users(&["user_001", "user_010"]),
            retained: users(&["user_001"]),
            ..SegmentSets::default()
        };

        let records = build_snapshot(&universe, date("2023-06-30"), &sets);
        assert_eq!(records.len(), 3);

        let by_id = |id: &str| records.iter().find(|r| r.user_id == id).unwrap();
        assert!(by_id("user_001").is_active);
        assert!(by_id("user_001").is_retained);

        // A user with no qualifying activity gets a record with every flag
        // false, never a missing row.
        let idle = by_id("user_008");
        assert_eq!(idle.calc_date, date("2023-06-30"));
        assert!(!idle.is_active);
        assert!(!idle.is_retained);
        assert!(!idle.is_returning);
        assert!(!idle.is_churned);
    }
}
