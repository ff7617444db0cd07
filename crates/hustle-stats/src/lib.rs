//! Numeric building blocks for the Hustle heuristic tables.
//!
//! - [`isotonic`]: weighted isotonic regression (pool-adjacent-violators) and
//!   piecewise curve evaluation with flat extrapolation
//! - [`descriptive`]: descriptive statistics and weighted R², used to judge fit quality
//!
//! # Examples
//!
//! ```
//! use hustle_stats::isotonic::{Interpolation, IsotonicRegression, WeightedPoint};
//!
//! let curve = IsotonicRegression::fit([
//!     WeightedPoint::new(1, 1.0, 1.0),
//!     WeightedPoint::new(3, 0.5, 1.0),
//!     WeightedPoint::new(5, 2.0, 1.0),
//! ])
//! .unwrap();
//! assert_eq!(curve.value_at(4, Interpolation::Step), 0.75);
//! assert_eq!(curve.value_at(9, Interpolation::Step), 2.0);
//! ```

pub mod descriptive;
pub mod isotonic;
