//! Terminal UI layer for the attendance report.
//!
//! Provides themes, the header and calendar components, the report view and
//! the application event loop built on top of [`ratatui`].

pub mod app;
pub mod components;
pub mod report_view;
pub mod themes;

pub use attendance_core as core;
