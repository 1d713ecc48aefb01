pub mod calendar;
pub mod header;
