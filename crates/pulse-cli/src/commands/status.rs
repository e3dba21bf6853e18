//! Status command for the event-log overview.

use std::io::Write;

use anyhow::{Context, Result};

use pulse_db::Database;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    writeln!(writer, "Segmentation status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;

    let summaries = db.behavior_summaries()?;
    if summaries.is_empty() {
        writeln!(writer, "No events recorded.")?;
        return Ok(());
    }

    writeln!(writer, "Events: {}", db.event_count()?)?;
    writeln!(writer, "Behaviors:")?;
    for summary in summaries {
        writeln!(
            writer,
            "- {}: {} event(s), last seen {}",
            summary.behavior_type, summary.events, summary.last_seen
        )?;
    }

    Ok(())
}
