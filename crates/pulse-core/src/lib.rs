//! Core domain logic for the segmentation engine.
//!
//! This crate contains the pure pieces of a segmentation run:
//! - Window arithmetic: the date ranges each classification predicate tests
//! - Classification: the four segment predicates over event-store outputs
//! - Snapshot derivation: one record per known user per observation date
//!
//! Everything here is free of I/O; the storage layer feeds it query results
//! and persists what it returns.

pub mod classify;
pub mod window;

pub use classify::{
    ClassifierInput, SegmentRecord, SegmentSets, UserHistory, build_snapshot, classify,
};
pub use window::{ConfigError, DateWindow, SegmentWindows, SegmentationConfig};
