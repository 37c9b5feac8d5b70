#![warn(missing_docs)]
//! Sweepbench Statistics
//!
//! Exact-arithmetic building blocks for the measurement engine:
//! - `Time`: a picosecond-resolution integer duration that survives millions
//!   of additions without floating-point drift
//! - `SampleAggregator`: O(1)-space online statistics over a stream of `Time`
//!   samples
//! - `Band`: named derived statistics (minimum, average, average + k sigma, ...)
//!   for the chart and export layers

mod aggregate;
mod band;
mod time;

pub use aggregate::{RECENT_SAMPLE_CAP, SampleAggregator};
pub use band::{Band, BandParseError, BandValue};
pub use time::{Time, TimeParseError, TimeSquared};
