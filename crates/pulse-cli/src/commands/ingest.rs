//! Ingest command for appending events from JSON Lines input.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;

use pulse_db::{BehaviorEvent, Database, TIMESTAMP_FORMAT};

pub fn run(db: &mut Database, file: Option<&Path>) -> Result<()> {
    let events = match file {
        Some(path) => {
            let reader = BufReader::new(
                File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
            );
            parse_events(reader)?
        }
        None => parse_events(io::stdin().lock())?,
    };

    let written = db.insert_events(&events)?;
    let skipped = events.len() - written;
    println!("Ingested {written} event(s), skipped {skipped} duplicate(s).");
    Ok(())
}

fn parse_events<R: BufRead>(reader: R) -> Result<Vec<BehaviorEvent>> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let parsed: IngestEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid JSON on line {}", idx + 1))?;
        let event = parsed
            .into_event()
            .with_context(|| format!("invalid event on line {}", idx + 1))?;
        events.push(event);
    }
    Ok(events)
}

#[derive(Debug, Deserialize)]
struct IngestEvent {
    user_id: String,
    behavior_type: String,
    occurred_at: String,
    #[serde(default)]
    device_type: Option<String>,
    #[serde(default)]
    channel: Option<String>,
}

impl IngestEvent {
    fn into_event(self) -> Result<BehaviorEvent> {
        if self.user_id.trim().is_empty() {
            return Err(anyhow::anyhow!("missing user_id"));
        }
        if self.behavior_type.trim().is_empty() {
            return Err(anyhow::anyhow!("missing behavior_type"));
        }
        let occurred_at = NaiveDateTime::parse_from_str(&self.occurred_at, TIMESTAMP_FORMAT)
            .with_context(|| format!("invalid occurred_at: {}", self.occurred_at))?;
        Ok(BehaviorEvent {
            user_id: self.user_id,
            behavior_type: self.behavior_type,
            occurred_at,
            device_type: self.device_type,
            channel: self.channel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    #[test]
    fn parse_events_reads_jsonl() {
        let input = concat!(
            r#"{"user_id":"user_001","behavior_type":"login","occurred_at":"2023-06-30 11:00:00","device_type":"mobile"}"#,
            "\n\n",
            r#"{"user_id":"user_002","behavior_type":"login","occurred_at":"2023-06-30 15:45:00"}"#,
        );

        let events = parse_events(Cursor::new(input)).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].user_id, "user_001");
        assert_eq!(events[0].device_type.as_deref(), Some("mobile"));
        assert_eq!(events[1].channel, None);
    }

    #[test]
    fn parse_events_reports_the_failing_line() {
        let input = concat!(
            r#"{"user_id":"user_001","behavior_type":"login","occurred_at":"2023-06-30 11:00:00"}"#,
            "\n",
            "not json",
        );

        let err = parse_events(Cursor::new(input)).unwrap_err();
        assert!(err.to_string().contains("invalid JSON on line 2"));
    }

    #[test]
    fn parse_events_rejects_blank_user_id() {
        let input = r#"{"user_id":" ","behavior_type":"login","occurred_at":"2023-06-30 11:00:00"}"#;
        let err = parse_events(Cursor::new(input)).unwrap_err();
        assert!(err.to_string().contains("invalid event on line 1"));
    }

    #[test]
    fn parse_events_rejects_bad_timestamps() {
        let input = r#"{"user_id":"user_001","behavior_type":"login","occurred_at":"2023-06-30T11:00:00Z"}"#;
        let err = parse_events(Cursor::new(input)).unwrap_err();
        assert!(err.to_string().contains("invalid event on line 1"));
    }

    #[test]
    fn run_skips_duplicate_events() {
        let mut db = Database::open_in_memory().unwrap();
        let event = BehaviorEvent {
            user_id: "user_001".to_string(),
            behavior_type: "login".to_string(),
            occurred_at: NaiveDateTime::parse_from_str("2023-06-30 11:00:00", TIMESTAMP_FORMAT)
                .unwrap(),
            device_type: None,
            channel: None,
        };
        db.insert_events(std::slice::from_ref(&event)).unwrap();

        // Ingesting the same fact again writes nothing new.
        let written = db.insert_events(&[event]).unwrap();
        assert_eq!(written, 0);
        assert_eq!(db.event_count().unwrap(), 1);
    }
}
