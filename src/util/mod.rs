//! Shared utilities: unit normalization, timing and logging setup

pub mod logging;
pub mod time;
pub mod units;
