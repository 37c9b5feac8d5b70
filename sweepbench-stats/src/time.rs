//! Picosecond-resolution time values
//!
//! `Time` is a signed integer count of picoseconds rather than a
//! floating-point seconds value, so summing millions of samples stays exact
//! and comparisons are total-ordered. `TimeSquared` (picoseconds squared) is
//! only ever produced by multiplying two `Time`s and exists so variance can
//! be accumulated without taking square roots until the very end.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use thiserror::Error;

const PS_PER_NS: i128 = 1_000;
const PS_PER_US: i128 = 1_000_000;
const PS_PER_MS: i128 = 1_000_000_000;
const PS_PER_S: i128 = 1_000_000_000_000;

/// Errors from parsing a unit-suffixed duration string like `"500ms"`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeParseError {
    /// The input was empty or all whitespace.
    #[error("empty duration string")]
    Empty,

    /// The numeric part did not parse.
    #[error("invalid duration number: {0:?}")]
    InvalidNumber(String),

    /// The unit suffix was not recognized.
    #[error("unknown duration unit: {0:?}")]
    UnknownUnit(String),
}

/// An immutable, arbitrary-precision duration counted in picoseconds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Time {
    picoseconds: i128,
}

impl Time {
    /// The zero duration.
    pub const ZERO: Time = Time { picoseconds: 0 };

    /// Creates a time from a raw picosecond count.
    pub const fn from_picoseconds(picoseconds: i128) -> Self {
        Time { picoseconds }
    }

    /// Creates a time from whole nanoseconds.
    pub const fn from_nanoseconds(nanoseconds: i128) -> Self {
        Time {
            picoseconds: nanoseconds * PS_PER_NS,
        }
    }

    /// Creates a time from whole microseconds.
    pub const fn from_microseconds(microseconds: i128) -> Self {
        Time {
            picoseconds: microseconds * PS_PER_US,
        }
    }

    /// Creates a time from whole milliseconds.
    pub const fn from_milliseconds(milliseconds: i128) -> Self {
        Time {
            picoseconds: milliseconds * PS_PER_MS,
        }
    }

    /// Creates a time from whole seconds.
    pub const fn from_seconds(seconds: i128) -> Self {
        Time {
            picoseconds: seconds * PS_PER_S,
        }
    }

    /// The raw picosecond count.
    pub const fn picoseconds(self) -> i128 {
        self.picoseconds
    }

    /// Approximate value in seconds, for display and axis math only.
    pub fn as_seconds_f64(self) -> f64 {
        self.picoseconds as f64 / PS_PER_S as f64
    }

    /// Whether this is the zero duration.
    pub const fn is_zero(self) -> bool {
        self.picoseconds == 0
    }

    /// Divides by an integer count, rounding half to even on the picosecond.
    ///
    /// Truncating division would bias averages downward by up to one
    /// picosecond per division; over large sample counts that bias is
    /// systematic, so ties round to the even neighbor instead.
    ///
    /// # Panics
    /// Panics if `divisor` is zero.
    pub fn dividing_with_rounding(self, divisor: i128) -> Time {
        Time {
            picoseconds: div_round_half_even(self.picoseconds, divisor),
        }
    }
}

/// Integer division rounding half to even.
fn div_round_half_even(dividend: i128, divisor: i128) -> i128 {
    assert!(divisor != 0, "division by zero");
    let (dividend, divisor) = if divisor < 0 {
        (-dividend, -divisor)
    } else {
        (dividend, divisor)
    };
    let quotient = dividend.div_euclid(divisor);
    let remainder = dividend.rem_euclid(divisor);
    match (2 * remainder).cmp(&divisor) {
        Ordering::Less => quotient,
        Ordering::Greater => quotient + 1,
        Ordering::Equal => {
            if quotient % 2 == 0 {
                quotient
            } else {
                quotient + 1
            }
        }
    }
}

impl Add for Time {
    type Output = Time;

    fn add(self, rhs: Time) -> Time {
        Time {
            picoseconds: self.picoseconds + rhs.picoseconds,
        }
    }
}

impl AddAssign for Time {
    fn add_assign(&mut self, rhs: Time) {
        self.picoseconds += rhs.picoseconds;
    }
}

impl Sub for Time {
    type Output = Time;

    fn sub(self, rhs: Time) -> Time {
        Time {
            picoseconds: self.picoseconds - rhs.picoseconds,
        }
    }
}

impl SubAssign for Time {
    fn sub_assign(&mut self, rhs: Time) {
        self.picoseconds -= rhs.picoseconds;
    }
}

impl Neg for Time {
    type Output = Time;

    fn neg(self) -> Time {
        Time {
            picoseconds: -self.picoseconds,
        }
    }
}

impl Mul<i128> for Time {
    type Output = Time;

    fn mul(self, rhs: i128) -> Time {
        Time {
            picoseconds: self.picoseconds * rhs,
        }
    }
}

impl Mul<Time> for Time {
    type Output = TimeSquared;

    fn mul(self, rhs: Time) -> TimeSquared {
        TimeSquared {
            picoseconds_squared: self.picoseconds * rhs.picoseconds,
        }
    }
}

impl Sum for Time {
    fn sum<I: Iterator<Item = Time>>(iter: I) -> Time {
        iter.fold(Time::ZERO, Add::add)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ps = self.picoseconds;
        if ps == 0 {
            return write!(f, "0s");
        }
        let units: [(i128, &str); 5] = [
            (PS_PER_S, "s"),
            (PS_PER_MS, "ms"),
            (PS_PER_US, "\u{b5}s"),
            (PS_PER_NS, "ns"),
            (1, "ps"),
        ];
        let abs = ps.unsigned_abs();
        for (scale, unit) in units {
            if abs >= scale.unsigned_abs() {
                let value = ps as f64 / scale as f64;
                return if value.abs() >= 100.0 {
                    write!(f, "{value:.1}{unit}")
                } else if value.abs() >= 10.0 {
                    write!(f, "{value:.2}{unit}")
                } else {
                    write!(f, "{value:.3}{unit}")
                };
            }
        }
        unreachable!("non-zero time below one picosecond")
    }
}

impl FromStr for Time {
    type Err = TimeParseError;

    /// Parses strings like `"1ns"`, `"500 ms"`, `"2.5s"`. A bare number is
    /// taken as seconds.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TimeParseError::Empty);
        }
        let (number, unit) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic() || *c == '\u{b5}')
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));
        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| TimeParseError::InvalidNumber(number.trim().to_string()))?;
        let multiplier = match unit.trim() {
            "ps" => 1,
            "ns" => PS_PER_NS,
            "us" | "\u{b5}s" => PS_PER_US,
            "ms" => PS_PER_MS,
            "s" | "sec" => PS_PER_S,
            other => return Err(TimeParseError::UnknownUnit(other.to_string())),
        };
        Ok(Time {
            picoseconds: (value * multiplier as f64).round_ties_even() as i128,
        })
    }
}

/// Picoseconds squared; the intermediate for exact variance accumulation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TimeSquared {
    picoseconds_squared: i128,
}

impl TimeSquared {
    /// The zero value.
    pub const ZERO: TimeSquared = TimeSquared {
        picoseconds_squared: 0,
    };

    /// The raw picoseconds-squared count.
    pub const fn picoseconds_squared(self) -> i128 {
        self.picoseconds_squared
    }

    /// Divides by an integer count, rounding half to even.
    ///
    /// # Panics
    /// Panics if `divisor` is zero.
    pub fn dividing_with_rounding(self, divisor: i128) -> TimeSquared {
        TimeSquared {
            picoseconds_squared: div_round_half_even(self.picoseconds_squared, divisor),
        }
    }

    /// Square root back into the time domain. Negative inputs (possible only
    /// through subtraction misuse, never through aggregation) clamp to zero.
    pub fn sqrt(self) -> Time {
        if self.picoseconds_squared <= 0 {
            return Time::ZERO;
        }
        Time {
            picoseconds: (self.picoseconds_squared as f64).sqrt().round_ties_even() as i128,
        }
    }
}

impl Add for TimeSquared {
    type Output = TimeSquared;

    fn add(self, rhs: TimeSquared) -> TimeSquared {
        TimeSquared {
            picoseconds_squared: self.picoseconds_squared + rhs.picoseconds_squared,
        }
    }
}

impl AddAssign for TimeSquared {
    fn add_assign(&mut self, rhs: TimeSquared) {
        self.picoseconds_squared += rhs.picoseconds_squared;
    }
}

impl Sub for TimeSquared {
    type Output = TimeSquared;

    fn sub(self, rhs: TimeSquared) -> TimeSquared {
        TimeSquared {
            picoseconds_squared: self.picoseconds_squared - rhs.picoseconds_squared,
        }
    }
}

impl Mul<i128> for TimeSquared {
    type Output = TimeSquared;

    fn mul(self, rhs: i128) -> TimeSquared {
        TimeSquared {
            picoseconds_squared: self.picoseconds_squared * rhs,
        }
    }
}
