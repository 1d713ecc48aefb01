//! Runtime layer for the attendance report.
//!
//! Caches reports over an attendance source and runs the background loop
//! that feeds the TUI.

pub mod data_manager;
pub mod orchestrator;

pub use attendance_core as core;
pub use attendance_data as data;
