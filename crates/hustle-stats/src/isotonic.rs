//! Weighted isotonic regression and piecewise curve evaluation.
//!
//! The fit is computed with the pool-adjacent-violators algorithm (PAVA):
//! observations sharing an `x` are first pooled into a single weighted mean,
//! then adjacent pools whose means decrease are merged until the sequence is
//! non-decreasing. The result is the unique weighted least-squares fit under
//! the monotonicity constraint.
//!
//! # Examples
//!
//! ```
//! use hustle_stats::isotonic::{Interpolation, IsotonicRegression, WeightedPoint};
//!
//! let points = [
//!     WeightedPoint::new(1, 10.0, 1.0),
//!     WeightedPoint::new(1, 20.0, 1.0),
//!     WeightedPoint::new(2, 5.0, 2.0),
//! ];
//! let curve = IsotonicRegression::fit(points).unwrap();
//!
//! assert_eq!(curve.value_at(1, Interpolation::Step), 10.0);
//! assert_eq!(curve.value_at(2, Interpolation::Step), 10.0);
//! ```

use serde::{Deserialize, Serialize};

/// A single weighted observation `(x, y)` used as fitting input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedPoint {
    /// Independent variable (context size).
    pub x: usize,
    /// Observed outcome.
    pub y: f64,
    /// Occurrence count or other positive weight.
    pub weight: f64,
}

impl WeightedPoint {
    #[must_use]
    pub fn new(x: usize, y: f64, weight: f64) -> Self {
        Self { x, y, weight }
    }
}

/// How a curve is evaluated between two breakpoints.
///
/// Outside the breakpoint range both modes extrapolate flat: the first
/// breakpoint's value below it, the last breakpoint's value above it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Hold the value of the last breakpoint at or below the query.
    ///
    /// On a non-decreasing curve this never exceeds the linear interpolant.
    #[default]
    Step,
    /// Linear interpolation between the surrounding breakpoints.
    Linear,
}

/// A fitted value at one distinct `x` of the training data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Breakpoint {
    /// Distinct `x` value present in the fitting data.
    pub x: usize,
    /// Curve value at `x`.
    pub value: f64,
    /// Total observed weight at `x`.
    pub weight: f64,
}

/// Errors raised while building a curve from observations.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum FitError {
    #[display("no observations to fit")]
    EmptyInput,
    #[display("observation #{index} has non-positive weight {weight}")]
    InvalidWeight { index: usize, weight: f64 },
    #[display("observation #{index} has non-finite outcome {outcome}")]
    NonFiniteOutcome { index: usize, outcome: f64 },
}

/// A curve defined by breakpoints at strictly increasing `x`.
///
/// No ordering is imposed on the values; see [`MonotoneCurve`] for the
/// constrained variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PiecewiseCurve {
    breakpoints: Vec<Breakpoint>,
}

impl PiecewiseCurve {
    /// Builds a curve through the weighted means of the given points.
    ///
    /// Points sharing an `x` are pooled into their weighted mean, and the
    /// pooled weight is recorded on the breakpoint.
    ///
    /// # Examples
    ///
    /// ```
    /// use hustle_stats::isotonic::{Interpolation, PiecewiseCurve, WeightedPoint};
    ///
    /// let curve = PiecewiseCurve::from_points([
    ///     WeightedPoint::new(0, 4.0, 1.0),
    ///     WeightedPoint::new(10, 2.0, 1.0),
    /// ])
    /// .unwrap();
    /// assert_eq!(curve.value_at(5, Interpolation::Linear), 3.0);
    /// assert_eq!(curve.value_at(5, Interpolation::Step), 4.0);
    /// ```
    pub fn from_points<I>(points: I) -> Result<Self, FitError>
    where
        I: IntoIterator<Item = WeightedPoint>,
    {
        Ok(Self {
            breakpoints: pool_ties(points)?,
        })
    }

    #[must_use]
    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    /// Smallest `x` with a breakpoint.
    #[must_use]
    pub fn min_x(&self) -> usize {
        self.breakpoints[0].x
    }

    /// Largest `x` with a breakpoint.
    #[must_use]
    pub fn max_x(&self) -> usize {
        self.breakpoints[self.breakpoints.len() - 1].x
    }

    /// Total observed weight across all breakpoints.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.breakpoints.iter().map(|bp| bp.weight).sum()
    }

    /// Observed weight at exactly `x`, or `0.0` when `x` is not a breakpoint.
    #[must_use]
    pub fn observed_weight(&self, x: usize) -> f64 {
        self.breakpoints
            .binary_search_by_key(&x, |bp| bp.x)
            .map_or(0.0, |idx| self.breakpoints[idx].weight)
    }

    /// Evaluates the curve at `x`.
    ///
    /// Exact breakpoints return their value. Between breakpoints the result
    /// depends on `interpolation`; outside the range it is the nearest
    /// boundary value.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn value_at(&self, x: usize, interpolation: Interpolation) -> f64 {
        let bps = &self.breakpoints;
        // number of breakpoints at or below x
        let idx = bps.partition_point(|bp| bp.x <= x);
        if idx == 0 {
            return bps[0].value;
        }
        let lo = &bps[idx - 1];
        if lo.x == x || idx == bps.len() {
            return lo.value;
        }
        match interpolation {
            Interpolation::Step => lo.value,
            Interpolation::Linear => {
                let hi = &bps[idx];
                let t = (x - lo.x) as f64 / (hi.x - lo.x) as f64;
                lo.value + t * (hi.value - lo.value)
            }
        }
    }

    /// Returns `true` if the breakpoint values never decrease.
    #[must_use]
    pub fn is_non_decreasing(&self) -> bool {
        self.breakpoints
            .windows(2)
            .all(|w| w[0].value <= w[1].value)
    }
}

/// A non-decreasing curve produced by [`IsotonicRegression::fit`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MonotoneCurve {
    curve: PiecewiseCurve,
}

impl MonotoneCurve {
    #[must_use]
    pub fn breakpoints(&self) -> &[Breakpoint] {
        self.curve.breakpoints()
    }

    #[must_use]
    pub fn min_x(&self) -> usize {
        self.curve.min_x()
    }

    #[must_use]
    pub fn max_x(&self) -> usize {
        self.curve.max_x()
    }

    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.curve.total_weight()
    }

    /// Observed weight at exactly `x`, or `0.0` when `x` was not in the training data.
    #[must_use]
    pub fn observed_weight(&self, x: usize) -> f64 {
        self.curve.observed_weight(x)
    }

    /// Evaluates the curve at `x`. See [`PiecewiseCurve::value_at`].
    ///
    /// The result always lies between the first and last fitted values.
    #[must_use]
    pub fn value_at(&self, x: usize, interpolation: Interpolation) -> f64 {
        self.curve.value_at(x, interpolation)
    }

    /// Borrows the underlying breakpoint curve.
    #[must_use]
    pub fn as_piecewise(&self) -> &PiecewiseCurve {
        &self.curve
    }
}

/// Weighted least-squares isotonic (non-decreasing) regression.
#[derive(Debug, Clone, Copy)]
pub struct IsotonicRegression;

impl IsotonicRegression {
    /// Fits a non-decreasing curve to weighted points.
    ///
    /// # Errors
    ///
    /// * [`FitError::EmptyInput`] - `points` is empty
    /// * [`FitError::InvalidWeight`] - a weight is not a finite positive number
    /// * [`FitError::NonFiniteOutcome`] - an outcome is NaN or infinite
    ///
    /// Error indices refer to the position in `points`.
    pub fn fit<I>(points: I) -> Result<MonotoneCurve, FitError>
    where
        I: IntoIterator<Item = WeightedPoint>,
    {
        let mut breakpoints = pool_ties(points)?;
        pool_adjacent_violators(&mut breakpoints);
        Ok(MonotoneCurve {
            curve: PiecewiseCurve { breakpoints },
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Pool {
    weighted_sum: f64,
    weight: f64,
    len: usize,
}

impl Pool {
    fn mean(&self) -> f64 {
        self.weighted_sum / self.weight
    }
}

/// Replaces breakpoint values in place with their isotonic fit.
///
/// Breakpoints must have strictly increasing `x` and positive weights.
fn pool_adjacent_violators(breakpoints: &mut [Breakpoint]) {
    let mut pools: Vec<Pool> = Vec::with_capacity(breakpoints.len());
    for bp in breakpoints.iter() {
        pools.push(Pool {
            weighted_sum: bp.value * bp.weight,
            weight: bp.weight,
            len: 1,
        });
        while let [.., prev, last] = pools.as_slice()
            && prev.mean() > last.mean()
        {
            let merged = Pool {
                weighted_sum: prev.weighted_sum + last.weighted_sum,
                weight: prev.weight + last.weight,
                len: prev.len + last.len,
            };
            pools.pop();
            pools.pop();
            pools.push(merged);
        }
    }

    let mut start = 0;
    for pool in &pools {
        let mean = pool.mean();
        for bp in &mut breakpoints[start..start + pool.len] {
            bp.value = mean;
        }
        start += pool.len;
    }
}

/// Validates points and collapses points sharing an `x` into their weighted mean.
fn pool_ties<I>(points: I) -> Result<Vec<Breakpoint>, FitError>
where
    I: IntoIterator<Item = WeightedPoint>,
{
    let mut points = points.into_iter().collect::<Vec<_>>();
    for (index, p) in points.iter().enumerate() {
        if !(p.weight.is_finite() && p.weight > 0.0) {
            return Err(FitError::InvalidWeight {
                index,
                weight: p.weight,
            });
        }
        if !p.y.is_finite() {
            return Err(FitError::NonFiniteOutcome {
                index,
                outcome: p.y,
            });
        }
    }
    if points.is_empty() {
        return Err(FitError::EmptyInput);
    }

    points.sort_by_key(|p| p.x);
    let breakpoints = points
        .chunk_by(|a, b| a.x == b.x)
        .map(|tied| {
            let weight = tied.iter().map(|p| p.weight).sum::<f64>();
            let weighted_sum = tied.iter().map(|p| p.weight * p.y).sum::<f64>();
            Breakpoint {
                x: tied[0].x,
                value: weighted_sum / weight,
                weight,
            }
        })
        .collect();
    Ok(breakpoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn values(curve: &MonotoneCurve) -> Vec<f64> {
        curve.breakpoints().iter().map(|bp| bp.value).collect()
    }

    #[test]
    fn test_pools_ties_before_merging_violators() {
        let curve = IsotonicRegression::fit([
            WeightedPoint::new(1, 10.0, 1.0),
            WeightedPoint::new(1, 20.0, 1.0),
            WeightedPoint::new(2, 5.0, 2.0),
        ])
        .unwrap();

        assert_eq!(curve.breakpoints().len(), 2);
        assert_close(curve.value_at(1, Interpolation::Step), 10.0);
        assert_close(curve.value_at(2, Interpolation::Step), 10.0);
        assert_close(curve.observed_weight(1), 2.0);
        assert_close(curve.observed_weight(2), 2.0);
    }

    #[test]
    fn test_already_monotone_input_is_unchanged() {
        let curve = IsotonicRegression::fit([
            WeightedPoint::new(1, 1.0, 1.0),
            WeightedPoint::new(2, 2.0, 3.0),
            WeightedPoint::new(5, 2.0, 1.0),
            WeightedPoint::new(9, 7.5, 2.0),
        ])
        .unwrap();
        assert_eq!(values(&curve), vec![1.0, 2.0, 2.0, 7.5]);
    }

    #[test]
    fn test_violation_cascades_backwards() {
        // 3 then 4 are fine, but 0 forces a merge with both
        let curve = IsotonicRegression::fit([
            WeightedPoint::new(1, 3.0, 1.0),
            WeightedPoint::new(2, 4.0, 1.0),
            WeightedPoint::new(3, 0.0, 2.0),
            WeightedPoint::new(4, 5.0, 1.0),
        ])
        .unwrap();
        let v = values(&curve);
        assert_close(v[0], 7.0 / 4.0);
        assert_close(v[1], 7.0 / 4.0);
        assert_close(v[2], 7.0 / 4.0);
        assert_close(v[3], 5.0);
    }

    #[test]
    fn test_weights_shift_pooled_mean() {
        let curve = IsotonicRegression::fit([
            WeightedPoint::new(10, 6.0, 9.0),
            WeightedPoint::new(20, 1.0, 1.0),
        ])
        .unwrap();
        assert_close(curve.value_at(10, Interpolation::Step), 5.5);
        assert_close(curve.value_at(20, Interpolation::Step), 5.5);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let points = [
            WeightedPoint::new(4, 2.0, 1.0),
            WeightedPoint::new(1, 3.0, 2.0),
            WeightedPoint::new(3, 1.0, 1.0),
            WeightedPoint::new(2, 8.0, 1.0),
        ];
        let mut reversed = points;
        reversed.reverse();
        let a = IsotonicRegression::fit(points).unwrap();
        let b = IsotonicRegression::fit(reversed).unwrap();
        assert_eq!(a, b);
        assert!(a.as_piecewise().is_non_decreasing());
    }

    #[test]
    fn test_fit_minimizes_weighted_squared_error_on_small_grid() {
        let points = [
            WeightedPoint::new(0, 2.0, 1.0),
            WeightedPoint::new(1, 1.0, 1.0),
            WeightedPoint::new(2, 3.0, 1.0),
        ];
        let curve = IsotonicRegression::fit(points).unwrap();
        let sse = |vals: [f64; 3]| {
            points
                .iter()
                .zip(vals)
                .map(|(p, v)| p.weight * (p.y - v).powi(2))
                .sum::<f64>()
        };
        let fitted = sse([
            curve.value_at(0, Interpolation::Step),
            curve.value_at(1, Interpolation::Step),
            curve.value_at(2, Interpolation::Step),
        ]);
        for candidate in [[1.0, 1.0, 3.0], [2.0, 2.0, 2.0], [1.5, 1.5, 2.5]] {
            assert!(fitted <= sse(candidate) + 1e-12);
        }
        assert_close(curve.value_at(0, Interpolation::Step), 1.5);
    }

    #[test]
    fn test_flat_extrapolation_outside_range() {
        let curve = IsotonicRegression::fit([
            WeightedPoint::new(5, 1.0, 1.0),
            WeightedPoint::new(10, 4.0, 1.0),
        ])
        .unwrap();
        for interpolation in [Interpolation::Step, Interpolation::Linear] {
            assert_close(curve.value_at(0, interpolation), 1.0);
            assert_close(curve.value_at(4, interpolation), 1.0);
            assert_close(curve.value_at(11, interpolation), 4.0);
            assert_close(curve.value_at(100_000, interpolation), 4.0);
        }
    }

    #[test]
    fn test_step_and_linear_between_breakpoints() {
        let curve = IsotonicRegression::fit([
            WeightedPoint::new(0, 0.0, 1.0),
            WeightedPoint::new(4, 8.0, 1.0),
        ])
        .unwrap();
        assert_close(curve.value_at(3, Interpolation::Step), 0.0);
        assert_close(curve.value_at(3, Interpolation::Linear), 6.0);
        assert!(
            (0..=4).all(|x| curve.value_at(x, Interpolation::Step)
                <= curve.value_at(x, Interpolation::Linear))
        );
    }

    #[test]
    fn test_single_point_curve() {
        let curve = IsotonicRegression::fit([WeightedPoint::new(7, 2.5, 3.0)]).unwrap();
        assert_eq!(curve.min_x(), 7);
        assert_eq!(curve.max_x(), 7);
        assert_close(curve.value_at(0, Interpolation::Linear), 2.5);
        assert_close(curve.total_weight(), 3.0);
        assert_close(curve.observed_weight(6), 0.0);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            IsotonicRegression::fit(Vec::new()).unwrap_err(),
            FitError::EmptyInput
        );
        assert_eq!(
            IsotonicRegression::fit([
                WeightedPoint::new(1, 1.0, 1.0),
                WeightedPoint::new(2, 1.0, 0.0),
            ])
            .unwrap_err(),
            FitError::InvalidWeight {
                index: 1,
                weight: 0.0
            }
        );
        assert!(matches!(
            IsotonicRegression::fit([WeightedPoint::new(1, f64::INFINITY, 1.0)]),
            Err(FitError::NonFiniteOutcome { index: 0, .. })
        ));
        assert!(matches!(
            PiecewiseCurve::from_points([WeightedPoint::new(1, 1.0, -2.0)]),
            Err(FitError::InvalidWeight { index: 0, .. })
        ));
    }

    #[test]
    fn test_piecewise_keeps_violations() {
        let curve = PiecewiseCurve::from_points([
            WeightedPoint::new(1, 3.0, 1.0),
            WeightedPoint::new(2, 1.0, 1.0),
        ])
        .unwrap();
        assert!(!curve.is_non_decreasing());
        assert_close(curve.value_at(2, Interpolation::Step), 1.0);
    }
}
