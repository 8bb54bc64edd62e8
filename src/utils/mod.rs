//! Utility modules: lenient numeric parsing, datetime parsing.
pub mod num;
pub mod time;
