//! Data layer for taskboard.
//!
//! Reads CSV and spreadsheet exports, turns them into tasks, and builds the
//! listing, workload, comparison and current-week views together with their
//! exportable report tables.

pub mod aggregator;
pub mod analysis;
pub mod analyzer;
pub mod reader;
pub mod reports;

pub use taskboard_core as core;
