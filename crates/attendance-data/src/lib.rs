//! Data layer for the attendance report.
//!
//! Reads the on-disk attendance store, exposes it through the
//! [`source::AttendanceSource`] trait, aggregates per-user statistics and
//! runs the top-level report pipeline.

pub mod aggregator;
pub mod analysis;
pub mod reader;
pub mod source;

pub use attendance_core as core;
