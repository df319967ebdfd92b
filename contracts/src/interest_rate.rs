//! # Linear Kink Interest Rate Curve
//!
//! Maps vault utilization to an annual borrow rate with three straight
//! segments joined at two kinks:
//!
//! ```text
//! rate
//!  ^                                   ______ max
//!  |                                 /
//!  |                               /
//!  |                 ____________/ optimum
//!  |        ________/
//!  | ______/ min
//!  +--------|-------------------|-----|------> utilization
//!          min              optimum  max
//! ```
//!
//! Below `min_threshold` the rate is flat at `min_rate`; above
//! `max_threshold` it is flat at `max_rate`; between the kinks it is linear.
//! Nothing forces the curve to slope upwards. An inverted curve (cheaper
//! money at high utilization) is perfectly legal, just unusual.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use aloc_protocol::BasisPoints;

use crate::policy::RatePolicy;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised when validating curve parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurveError {
    #[error("optimum utilization smaller than min")]
    OptimumBelowMin,

    #[error("optimum utilization bigger than max")]
    OptimumAboveMax,

    /// A threshold or rate lies outside `0..=10_000`.
    #[error("{field} out of range: {value}")]
    OutOfRange {
        /// Which parameter was rejected.
        field: &'static str,
        /// The rejected value.
        value: BasisPoints,
    },
}

// ---------------------------------------------------------------------------
// Curve
// ---------------------------------------------------------------------------

/// The six points that define the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestRateCurve {
    pub min_rate: BasisPoints,
    pub min_threshold: BasisPoints,
    pub optimum_rate: BasisPoints,
    pub optimum_threshold: BasisPoints,
    pub max_rate: BasisPoints,
    pub max_threshold: BasisPoints,
}

impl InterestRateCurve {
    fn validate(&self) -> Result<(), CurveError> {
        let fields = [
            ("min_rate", self.min_rate),
            ("min_threshold", self.min_threshold),
            ("optimum_rate", self.optimum_rate),
            ("optimum_threshold", self.optimum_threshold),
            ("max_rate", self.max_rate),
            ("max_threshold", self.max_threshold),
        ];
        for (field, value) in fields {
            if !value.is_valid_ratio() {
                return Err(CurveError::OutOfRange { field, value });
            }
        }
        if self.optimum_threshold < self.min_threshold {
            return Err(CurveError::OptimumBelowMin);
        }
        if self.optimum_threshold > self.max_threshold {
            return Err(CurveError::OptimumAboveMax);
        }
        Ok(())
    }

    /// Evaluates the curve at `utilization`.
    pub fn rate_at(&self, utilization: BasisPoints) -> BasisPoints {
        let u = utilization.min(BasisPoints::MAX);
        if u <= self.min_threshold {
            self.min_rate
        } else if u <= self.optimum_threshold {
            interpolate(
                u,
                (self.min_threshold, self.min_rate),
                (self.optimum_threshold, self.optimum_rate),
            )
        } else if u <= self.max_threshold {
            interpolate(
                u,
                (self.optimum_threshold, self.optimum_rate),
                (self.max_threshold, self.max_rate),
            )
        } else {
            self.max_rate
        }
    }
}

/// Linear interpolation on the segment `start..=end` at `x`.
///
/// Callers guarantee `start.0 < x <= end.0`, so the span is never zero.
/// Signed arithmetic keeps descending segments exact; the quotient
/// truncates toward zero.
fn interpolate(
    x: BasisPoints,
    start: (BasisPoints, BasisPoints),
    end: (BasisPoints, BasisPoints),
) -> BasisPoints {
    let (x0, y0) = (i64::from(start.0.get()), i64::from(start.1.get()));
    let (x1, y1) = (i64::from(end.0.get()), i64::from(end.1.get()));
    let x = i64::from(x.get());
    let y = y0 + (x - x0) * (y1 - y0) / (x1 - x0);
    // y lies between y0 and y1, both of which are valid u32 ratios.
    BasisPoints(u32::try_from(y).unwrap_or(0))
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// The default rate policy: a validated [`InterestRateCurve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearKinkRatePolicy {
    curve: InterestRateCurve,
}

impl LinearKinkRatePolicy {
    pub fn new(curve: InterestRateCurve) -> Result<Self, CurveError> {
        curve.validate()?;
        Ok(Self { curve })
    }

    pub fn curve(&self) -> &InterestRateCurve {
        &self.curve
    }
}

impl RatePolicy for LinearKinkRatePolicy {
    fn interest_rate(&self, utilization: BasisPoints) -> BasisPoints {
        self.curve.rate_at(utilization)
    }

    fn label(&self) -> &'static str {
        "LinearKinkRatePolicy"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
