//! `timeframe` library crate.
//!
//! A labeled, time-indexed table engine: normalize `YYYYMMDD` dates, filter
//! by column predicates and date ranges, sum a target per date or per
//! adaptive day/week/month bucket, and splice forecast rows in as their own
//! series for charting.
//!
//! The `timeframe` binary is a thin command-line wrapper around it.

pub mod color;
pub mod config;
pub mod data;
pub mod predict;

pub use config::FrameConfig;
pub use data::{FrameError, Row, Table, TimeFrame, Value};
