//! Derived statistic bands
//!
//! A `Band` names one derived quantity of an aggregator. The chart and
//! export layers select a band per curve; `Sigma(k)` is `average + k *
//! standard deviation`.

use crate::aggregate::SampleAggregator;
use crate::time::Time;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A named derived statistic of one aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    /// The smallest sample.
    Minimum,
    /// The largest sample.
    Maximum,
    /// The mean sample.
    Average,
    /// `average + k * standard deviation`; needs at least two samples.
    Sigma(u32),
    /// The number of samples.
    Count,
}

/// A band's value; counts and times live on different axes, so the type
/// keeps them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandValue {
    /// A time-valued band.
    Time(Time),
    /// The sample-count band.
    Count(u64),
}

impl BandValue {
    /// The time value, if this is a time-valued band.
    pub fn as_time(self) -> Option<Time> {
        match self {
            BandValue::Time(t) => Some(t),
            BandValue::Count(_) => None,
        }
    }
}

impl Band {
    /// Evaluates this band against an aggregator. `None` when the aggregator
    /// holds too few samples for the band (empty, or fewer than two for
    /// `Sigma`).
    pub fn evaluate(self, aggregate: &SampleAggregator) -> Option<BandValue> {
        match self {
            Band::Minimum => aggregate.minimum().map(BandValue::Time),
            Band::Maximum => aggregate.maximum().map(BandValue::Time),
            Band::Average => aggregate.average().map(BandValue::Time),
            Band::Sigma(k) => {
                let average = aggregate.average()?;
                let sigma = aggregate.standard_deviation()?;
                Some(BandValue::Time(average + sigma * i128::from(k)))
            }
            Band::Count => Some(BandValue::Count(aggregate.count())),
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::Minimum => write!(f, "min"),
            Band::Maximum => write!(f, "max"),
            Band::Average => write!(f, "avg"),
            Band::Sigma(k) => write!(f, "sig{k}"),
            Band::Count => write!(f, "count"),
        }
    }
}

/// Error from parsing a band selector string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown band {0:?} (expected min, max, avg, sigN, or count)")]
pub struct BandParseError(pub String);

impl FromStr for Band {
    type Err = BandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "min" | "minimum" => Ok(Band::Minimum),
            "max" | "maximum" => Ok(Band::Maximum),
            "avg" | "average" => Ok(Band::Average),
            "count" => Ok(Band::Count),
            other => {
                if let Some(digits) = other.strip_prefix("sig") {
                    if let Ok(k) = digits.parse::<u32>() {
                        return Ok(Band::Sigma(k));
                    }
                }
                Err(BandParseError(other.to_string()))
            }
        }
    }
}
