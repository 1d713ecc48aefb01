//! Shared models, errors, configuration and formatting for the attendance
//! report crates.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;
