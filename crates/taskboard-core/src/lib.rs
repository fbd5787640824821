//! Core building blocks for taskboard.
//!
//! Holds the task data model, header resolution, row normalisation, report
//! text export, calendar helpers and CLI settings shared by the other crates.

pub mod columns;
pub mod error;
pub mod export;
pub mod models;
pub mod normalizer;
pub mod settings;
pub mod time_utils;

pub use error::{Result, TaskboardError};
