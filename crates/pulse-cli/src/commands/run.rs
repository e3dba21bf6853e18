//! Run command: one segment classification pass for an observation date.
//!
//! Validates the window parameters, classifies every known user, and
//! replaces the date's snapshot in a single transaction. The run fails as a
//! unit; a failure leaves any prior snapshot for the date untouched.

use anyhow::{Context, Result};

use pulse_core::SegmentationConfig;
use pulse_db::Database;

pub fn run(db: &mut Database, config: &SegmentationConfig) -> Result<()> {
    let stats = db
        .compute_segments(config)
        .with_context(|| format!("segmentation run failed for {}", config.observation_date))?;

    println!(
        "Segmented {} user(s) for {}.",
        stats.total, config.observation_date
    );
    println!("  active:    {}", stats.active);
    println!("  retained:  {}", stats.retained);
    println!("  returning: {}", stats.returning);
    println!("  churned:   {}", stats.churned);

    Ok(())
}
