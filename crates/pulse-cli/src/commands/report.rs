//! Report command over persisted segment snapshots.
//!
//! A read-only derived view: aggregate counts, percentages, and the
//! per-user flag table for one calc date. Human-readable by default,
//! machine-readable with `--json`.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;

use pulse_core::SegmentRecord;
use pulse_db::{Database, SegmentStatistics};

#[derive(Debug, Serialize)]
struct ReportPayload {
    calc_date: NaiveDate,
    statistics: SegmentStatistics,
    users: Vec<SegmentRecord>,
}

pub fn run<W: Write>(writer: &mut W, db: &Database, date: NaiveDate, json: bool) -> Result<()> {
    let statistics = db.segment_statistics(date)?;
    let users = db.segments_for_date(date)?;

    if json {
        let payload = ReportPayload {
            calc_date: date,
            statistics,
            users,
        };
        serde_json::to_writer_pretty(&mut *writer, &payload)?;
        writeln!(writer)?;
        return Ok(());
    }

    writeln!(writer, "Segment report for {date}")?;
    if statistics.total == 0 {
        writeln!(
            writer,
            "No segment records for this date. Run `pulse run --date {date}` first."
        )?;
        return Ok(());
    }

    writeln!(writer, "Total users: {}", statistics.total)?;
    for (label, count) in [
        ("  active:   ", statistics.active),
        ("  retained: ", statistics.retained),
        ("  returning:", statistics.returning),
        ("  churned:  ", statistics.churned),
    ] {
        writeln!(
            writer,
            "{label} {count} ({})",
            percentage(count, statistics.total)
        )?;
    }

    writeln!(writer, "Users:")?;
    for record in &users {
        writeln!(
            writer,
            "- {}: active={} retained={} returning={} churned={}",
            record.user_id,
            yes_no(record.is_active),
            yes_no(record.is_retained),
            yes_no(record.is_returning),
            yes_no(record.is_churned),
        )?;
    }

    Ok(())
}

const fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

#[allow(clippy::cast_precision_loss)]
fn percentage(part: i64, total: i64) -> String {
    format!("{:.1}%", part as f64 / total as f64 * 100.0)
}
