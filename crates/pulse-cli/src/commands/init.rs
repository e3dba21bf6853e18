//! Init command for provisioning the database and demo data.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use pulse_db::{BehaviorEvent, Database, TIMESTAMP_FORMAT};

/// Demo event log: fifteen logins across ten users in late June 2023.
const SAMPLE_EVENTS: &[(&str, &str, &str, &str)] = &[
    ("user_001", "2023-06-28 09:30:00", "mobile", "appstore"),
    ("user_001", "2023-06-29 10:15:00", "mobile", "appstore"),
    ("user_001", "2023-06-30 11:00:00", "mobile", "appstore"),
    ("user_002", "2023-06-29 14:20:00", "desktop", "google"),
    ("user_002", "2023-06-30 15:45:00", "desktop", "google"),
    ("user_003", "2023-06-25 08:50:00", "mobile", "wechat"),
    ("user_003", "2023-06-30 09:10:00", "mobile", "wechat"),
    ("user_004", "2023-06-20 13:30:00", "desktop", "baidu"),
    ("user_004", "2023-06-30 16:20:00", "mobile", "appstore"),
    ("user_005", "2023-06-21 10:00:00", "mobile", "weibo"),
    ("user_006", "2023-06-15 17:45:00", "desktop", "direct"),
    ("user_007", "2023-06-30 08:30:00", "mobile", "appstore"),
    ("user_008", "2023-06-28 11:20:00", "mobile", "wechat"),
    ("user_009", "2023-06-20 09:00:00", "desktop", "google"),
    ("user_010", "2023-06-30 10:30:00", "desktop", "direct"),
];

/// Provision the schema and, when asked, seed the demo events.
///
/// Schema creation happens when the database is opened, so reaching this
/// point means the tables exist. The seed only runs against an empty event
/// log; rerunning `init --sample` never duplicates data.
pub fn run(db: &mut Database, sample: bool) -> Result<()> {
    println!("Database ready.");

    if !sample {
        return Ok(());
    }
    if db.event_count()? > 0 {
        println!("Event log already has data, skipping sample seed.");
        return Ok(());
    }

    let inserted = db.insert_events(&sample_events()?)?;
    println!("Seeded {inserted} sample event(s).");
    Ok(())
}

fn sample_events() -> Result<Vec<BehaviorEvent>> {
    SAMPLE_EVENTS
        .iter()
        .map(|&(user_id, occurred_at, device_type, channel)| {
            let occurred_at = NaiveDateTime::parse_from_str(occurred_at, TIMESTAMP_FORMAT)
                .with_context(|| format!("invalid sample timestamp: {occurred_at}"))?;
            Ok(BehaviorEvent {
                user_id: user_id.to_string(),
                behavior_type: "login".to_string(),
                occurred_at,
                device_type: Some(device_type.to_string()),
                channel: Some(channel.to_string()),
            })
        })
        .collect()
}
