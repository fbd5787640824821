//! Runtime layer for taskboard.
//!
//! Owns the currently loaded dataset, runs file decoding off the async
//! executor and serves cached views of the loaded tasks.

pub mod data_manager;

pub use taskboard_core as core;
pub use taskboard_data as data;
