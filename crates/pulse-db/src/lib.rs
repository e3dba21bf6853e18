//! Storage layer for the segmentation engine.
//!
//! Provides the event-log queries the classifier consumes and the
//! transactional snapshot writes it produces, using `rusqlite`.
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not
//! `Sync`: an instance can move between threads but concurrent access needs
//! external synchronization. A segmentation run is a single-threaded batch
//! job, so none is provided here. Runs for the same observation date must
//! be serialized by the caller.
//!
//! # Schema
//!
//! Timestamps are stored as TEXT `YYYY-MM-DD HH:MM:SS` and dates as TEXT
//! `YYYY-MM-DD`. Both formats are fixed-width, so lexicographic ordering
//! matches chronological ordering and range queries compare plain strings.
//! No timezone normalization is applied; all values share one clock.

use std::collections::HashSet;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, params};
use serde::Serialize;
use thiserror::Error;

use pulse_core::{
    ClassifierInput, DateWindow, SegmentRecord, SegmentWindows, SegmentationConfig, UserHistory,
    build_snapshot, classify,
};

/// Stored timestamp layout. Fixed-width so string order is time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Stored calendar-date layout.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The run configuration was rejected before any query was issued.
    #[error(transparent)]
    Config(#[from] pulse_core::ConfigError),
    /// A stored event timestamp did not parse.
    #[error("invalid timestamp for user {user_id}: {timestamp}")]
    TimestampParse {
        user_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored calc date did not parse.
    #[error("invalid calc date: {value}")]
    DateParse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// One row of the append-only event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorEvent {
    pub user_id: String,
    pub behavior_type: String,
    pub occurred_at: NaiveDateTime,
    pub device_type: Option<String>,
    pub channel: Option<String>,
}

/// Event count and latest timestamp for one behavior type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorSummary {
    pub behavior_type: String,
    pub events: i64,
    pub last_seen: String,
}

/// Aggregate counts over the segment records of one calc date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SegmentStatistics {
    pub total: i64,
    pub active: i64,
    pub retained: i64,
    pub returning: i64,
    pub churned: i64,
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The schema is initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection
    /// closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// Idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Append-only event facts. The primary key rejects duplicates;
            -- the first stored copy wins.
            CREATE TABLE IF NOT EXISTS behavior_events (
                user_id       TEXT NOT NULL,
                behavior_type TEXT NOT NULL,
                occurred_at   TEXT NOT NULL,
                device_type   TEXT,
                channel       TEXT,
                PRIMARY KEY (user_id, behavior_type, occurred_at)
            );

            CREATE INDEX IF NOT EXISTS idx_behavior_events_type_time
                ON behavior_events(behavior_type, occurred_at);

            -- One snapshot row per user per calc date, insert-or-replace.
            CREATE TABLE IF NOT EXISTS user_segments (
                user_id      TEXT NOT NULL,
                calc_date    TEXT NOT NULL,
                is_active    INTEGER NOT NULL,
                is_retained  INTEGER NOT NULL,
                is_returning INTEGER NOT NULL,
                is_churned   INTEGER NOT NULL,
                PRIMARY KEY (user_id, calc_date)
            );
            ",
        )?;
        Ok(())
    }

    /// Inserts a batch of events, skipping duplicates of already-stored
    /// rows. Returns how many rows were actually written.
    pub fn insert_events(&mut self, events: &[BehaviorEvent]) -> Result<usize, DbError> {
        if events.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO behavior_events
                (user_id, behavior_type, occurred_at, device_type, channel)
                VALUES (?, ?, ?, ?, ?)
                ",
            )?;
            for event in events {
                inserted += stmt.execute(params![
                    event.user_id,
                    event.behavior_type,
                    format_timestamp(event.occurred_at),
                    event.device_type,
                    event.channel,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Total number of stored events.
    pub fn event_count(&self) -> Result<i64, DbError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM behavior_events", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Distinct users with at least one qualifying event inside the window.
    ///
    /// A user with no matching event is absent from the result, and an
    /// empty window matches nothing.
    pub fn users_with_behavior(
        &self,
        behavior: &str,
        window: &DateWindow,
    ) -> Result<HashSet<String>, DbError> {
        if window.is_empty() {
            return Ok(HashSet::new());
        }
        let mut stmt = self.conn.prepare(
            "
            SELECT DISTINCT user_id
            FROM behavior_events
            WHERE behavior_type = ?
            AND occurred_at BETWEEN ? AND ?
            ",
        )?;
        let rows = stmt.query_map(
            params![
                behavior,
                format_timestamp(window.start_ts()),
                format_timestamp(window.end_ts()),
            ],
            |row| row.get::<_, String>(0),
        )?;
        let mut users = HashSet::new();
        for row in rows {
            users.insert(row?);
        }
        Ok(users)
    }

    /// Every user with at least one event ever, ordered by user id.
    pub fn all_known_users(&self) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT user_id FROM behavior_events ORDER BY user_id ASC",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    /// All qualifying timestamps grouped per user, ascending within each
    /// user. Fetched in one query so every history-partition predicate sees
    /// the same snapshot of a user's events.
    pub fn behavior_histories(&self, behavior: &str) -> Result<Vec<UserHistory>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT user_id, occurred_at
            FROM behavior_events
            WHERE behavior_type = ?
            ORDER BY user_id ASC, occurred_at ASC
            ",
        )?;
        let rows = stmt.query_map([behavior], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut histories: Vec<UserHistory> = Vec::new();
        for row in rows {
            let (user_id, timestamp) = row?;
            let parsed = parse_timestamp(&timestamp, &user_id)?;
            match histories.last_mut() {
                Some(history) if history.user_id == user_id => history.timestamps.push(parsed),
                _ => histories.push(UserHistory {
                    user_id,
                    timestamps: vec![parsed],
                }),
            }
        }
        Ok(histories)
    }

    /// Replaces the snapshot rows carried by `records`, all inside one
    /// transaction. Any failure rolls the whole batch back, leaving prior
    /// rows untouched; reprocessing a date is safe and idempotent.
    pub fn replace_segments(&mut self, records: &[SegmentRecord]) -> Result<usize, DbError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR REPLACE INTO user_segments
                (user_id, calc_date, is_active, is_retained, is_returning, is_churned)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
            )?;
            for record in records {
                stmt.execute(params![
                    record.user_id,
                    format_date(record.calc_date),
                    record.is_active,
                    record.is_retained,
                    record.is_returning,
                    record.is_churned,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Persisted snapshot rows for one calc date, ordered by user id.
    pub fn segments_for_date(&self, date: NaiveDate) -> Result<Vec<SegmentRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT user_id, calc_date, is_active, is_retained, is_returning, is_churned
            FROM user_segments
            WHERE calc_date = ?
            ORDER BY user_id ASC
            ",
        )?;
        let rows = stmt.query_map([format_date(date)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, bool>(4)?,
                row.get::<_, bool>(5)?,
            ))
        })?;
        let mut records = Vec::new();
        for row in rows {
            let (user_id, calc_date, is_active, is_retained, is_returning, is_churned) = row?;
            records.push(SegmentRecord {
                user_id,
                calc_date: parse_date(&calc_date)?,
                is_active,
                is_retained,
                is_returning,
                is_churned,
            });
        }
        Ok(records)
    }

    /// Aggregate counts over the persisted snapshot of one calc date.
    pub fn segment_statistics(&self, date: NaiveDate) -> Result<SegmentStatistics, DbError> {
        let stats = self.conn.query_row(
            "
            SELECT
                COUNT(*),
                COALESCE(SUM(is_active), 0),
                COALESCE(SUM(is_retained), 0),
                COALESCE(SUM(is_returning), 0),
                COALESCE(SUM(is_churned), 0)
            FROM user_segments
            WHERE calc_date = ?
            ",
            [format_date(date)],
            |row| {
                Ok(SegmentStatistics {
                    total: row.get(0)?,
                    active: row.get(1)?,
                    retained: row.get(2)?,
                    returning: row.get(3)?,
                    churned: row.get(4)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// Event count and latest timestamp per behavior type, most recent
    /// first.
    pub fn behavior_summaries(&self) -> Result<Vec<BehaviorSummary>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT behavior_type, COUNT(*) AS events, MAX(occurred_at) AS last_seen
            FROM behavior_events
            GROUP BY behavior_type
            ORDER BY last_seen DESC, behavior_type ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(BehaviorSummary {
                behavior_type: row.get(0)?,
                events: row.get(1)?,
                last_seen: row.get(2)?,
            })
        })?;
        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }

    /// Runs one full segmentation pass for the configured observation date
    /// and persists the snapshot.
    ///
    /// Validates the configuration, fetches the universe and the window
    /// sets, classifies, and replaces the date's snapshot in a single
    /// transaction. Fails as a unit: on any error no row is written and the
    /// prior snapshot for the date stays visible.
    pub fn compute_segments(
        &mut self,
        config: &SegmentationConfig,
    ) -> Result<SegmentStatistics, DbError> {
        let windows = SegmentWindows::for_config(config)?;
        let users = self.all_known_users()?;
        let input = ClassifierInput {
            active_users: self.users_with_behavior(&config.behavior, &windows.active)?,
            retention_base_users: self
                .users_with_behavior(&config.behavior, &windows.retention_base)?,
            retention_target_users: self
                .users_with_behavior(&config.behavior, &windows.retention_target)?,
            histories: self.behavior_histories(&config.behavior)?,
        };
        tracing::debug!(
            users = users.len(),
            histories = input.histories.len(),
            date = %config.observation_date,
            "loaded classifier input"
        );

        let sets = classify(&windows, &input);
        let records = build_snapshot(&users, config.observation_date, &sets);
        let written = self.replace_segments(&records)?;
        tracing::debug!(written, "segment snapshot replaced");

        self.segment_statistics(config.observation_date)
    }
}

fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(value: &str, user_id: &str) -> Result<NaiveDateTime, DbError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|source| {
        DbError::TimestampParse {
            user_id: user_id.to_string(),
            timestamp: value.to_string(),
            source,
        }
    })
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(value: &str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|source| DbError::DateParse {
        value: value.to_string(),
        source,
    })
}
