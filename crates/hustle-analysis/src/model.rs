//! Curve fitting and group combination
//!
//! A [`FittedModel`] holds the curve the lookup table is evaluated from.
//! With [`FitStrategy::Global`] this is a single isotonic fit. With
//! [`FitStrategy::PerGroup`] each group gets its own isotonic fit, and the
//! group curves are merged at every context size where any group has data:
//!
//! ```text
//! combined(x) = Σ_g w_g(x) · curve_g(x) / Σ_g w_g(x)
//! ```
//!
//! where `w_g(x)` is the occurrence count observed for group `g` at `x`.
//! Groups without data at `x` contribute nothing. The combined points are
//! then re-fitted with isotonic regression (unless disabled), so the result
//! is monotone even when the weighted average is not.

use std::collections::{BTreeMap, BTreeSet};

use hustle_stats::isotonic::{
    FitError, Interpolation, IsotonicRegression, MonotoneCurve, PiecewiseCurve, WeightedPoint,
};
use serde::Serialize;

use crate::{config::FitStrategy, sample::SampleSet};

/// Something that yields a per-unit estimate for every context size.
pub trait Estimator {
    fn estimate(&self, context_size: usize) -> f64;
}

impl<F> Estimator for F
where
    F: Fn(usize) -> f64,
{
    fn estimate(&self, context_size: usize) -> f64 {
        self(context_size)
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ModelError {
    #[display("global fit failed")]
    Global { source: FitError },
    #[display("fit for group {group} failed")]
    Group { group: u32, source: FitError },
    #[display("combining group curves failed")]
    Combine { source: FitError },
    #[display("{count} observation(s) have no group, first at context size {context_size}")]
    Ungrouped { count: usize, context_size: usize },
}

/// The curve the table is read from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "breakpoints", rename_all = "snake_case")]
pub enum OverallCurve {
    Monotone(MonotoneCurve),
    /// Combined group values without the re-fit pass.
    Unconstrained(PiecewiseCurve),
}

impl OverallCurve {
    #[must_use]
    pub fn as_piecewise(&self) -> &PiecewiseCurve {
        match self {
            OverallCurve::Monotone(curve) => curve.as_piecewise(),
            OverallCurve::Unconstrained(curve) => curve,
        }
    }

    #[must_use]
    pub fn value_at(&self, context_size: usize, interpolation: Interpolation) -> f64 {
        self.as_piecewise().value_at(context_size, interpolation)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FittedModel {
    pub interpolation: Interpolation,
    /// Per-group fits; empty for a global fit.
    pub group_curves: BTreeMap<u32, MonotoneCurve>,
    pub overall: OverallCurve,
}

impl FittedModel {
    /// Fits the model described by `strategy` to `samples`.
    ///
    /// # Examples
    ///
    /// ```
    /// use hustle_analysis::{
    ///     config::FitStrategy,
    ///     model::FittedModel,
    ///     sample::{Observation, SampleSet},
    /// };
    /// use hustle_stats::isotonic::Interpolation;
    ///
    /// let samples = SampleSet::from_observations(vec![
    ///     Observation::new(2, 1.0, 1.0, Some(1)),
    ///     Observation::new(2, 3.0, 3.0, Some(2)),
    /// ]);
    /// let strategy = FitStrategy::PerGroup { groups: None, refit: true };
    /// let model = FittedModel::fit(&samples, &strategy, Interpolation::Step).unwrap();
    ///
    /// assert_eq!(model.value_at(2), 2.5);
    /// ```
    pub fn fit(
        samples: &SampleSet,
        strategy: &FitStrategy,
        interpolation: Interpolation,
    ) -> Result<Self, ModelError> {
        match strategy {
            FitStrategy::Global => {
                let curve = IsotonicRegression::fit(samples.points())
                    .map_err(|source| ModelError::Global { source })?;
                tracing::debug!(
                    breakpoints = curve.breakpoints().len(),
                    total_weight = curve.total_weight(),
                    "fitted global curve"
                );
                Ok(Self {
                    interpolation,
                    group_curves: BTreeMap::new(),
                    overall: OverallCurve::Monotone(curve),
                })
            }
            FitStrategy::PerGroup { groups, refit } => {
                let group_curves = fit_groups(samples, groups.as_deref())?;
                let overall = combine(&group_curves, interpolation, *refit)?;
                Ok(Self {
                    interpolation,
                    group_curves,
                    overall,
                })
            }
        }
    }

    /// Per-unit estimate of the overall curve at `context_size`.
    #[must_use]
    pub fn value_at(&self, context_size: usize) -> f64 {
        self.overall.value_at(context_size, self.interpolation)
    }

    /// Estimate for one observation: its group's curve if there is one,
    /// otherwise the overall curve.
    #[must_use]
    pub fn fitted_for(&self, context_size: usize, group: Option<u32>) -> f64 {
        group
            .and_then(|g| self.group_curves.get(&g))
            .map_or_else(
                || self.value_at(context_size),
                |curve| curve.value_at(context_size, self.interpolation),
            )
    }
}

impl Estimator for FittedModel {
    fn estimate(&self, context_size: usize) -> f64 {
        self.value_at(context_size)
    }
}

fn fit_groups(
    samples: &SampleSet,
    declared: Option<&[u32]>,
) -> Result<BTreeMap<u32, MonotoneCurve>, ModelError> {
    let (mut partitions, ungrouped) = samples.partition_by_group();
    if let Some(first) = ungrouped.first() {
        return Err(ModelError::Ungrouped {
            count: ungrouped.len(),
            context_size: first.context_size,
        });
    }

    let keys = match declared {
        Some(groups) => groups.iter().copied().collect::<BTreeSet<_>>(),
        None => partitions.keys().copied().collect(),
    };
    if keys.is_empty() {
        return Err(ModelError::Combine {
            source: FitError::EmptyInput,
        });
    }
    if let Some(groups) = declared {
        let skipped = partitions
            .keys()
            .filter(|g| !groups.contains(*g))
            .count();
        if skipped > 0 {
            tracing::warn!(skipped, "ignoring observations from undeclared groups");
        }
    }

    keys.into_iter()
        .map(|group| {
            let observations = partitions.remove(&group).unwrap_or_default();
            let curve = IsotonicRegression::fit(observations.iter().map(|o| o.to_point()))
                .map_err(|source| ModelError::Group { group, source })?;
            tracing::debug!(
                group,
                observations = observations.len(),
                breakpoints = curve.breakpoints().len(),
                "fitted group curve"
            );
            Ok((group, curve))
        })
        .collect()
}

/// Merges group curves by observed weight at each context size.
fn combine(
    group_curves: &BTreeMap<u32, MonotoneCurve>,
    interpolation: Interpolation,
    refit: bool,
) -> Result<OverallCurve, ModelError> {
    let sizes = group_curves
        .values()
        .flat_map(|curve| curve.breakpoints().iter().map(|bp| bp.x))
        .collect::<BTreeSet<_>>();

    let points = sizes
        .into_iter()
        .filter_map(|x| {
            let (weighted_sum, weight) = group_curves.values().fold(
                (0.0, 0.0),
                |(sum, total), curve| {
                    let w = curve.observed_weight(x);
                    (sum + w * curve.value_at(x, interpolation), total + w)
                },
            );
            (weight > 0.0).then(|| WeightedPoint::new(x, weighted_sum / weight, weight))
        })
        .collect::<Vec<_>>();

    let overall = if refit {
        IsotonicRegression::fit(points).map(OverallCurve::Monotone)
    } else {
        PiecewiseCurve::from_points(points).map(OverallCurve::Unconstrained)
    }
    .map_err(|source| ModelError::Combine { source })?;

    if !overall.as_piecewise().is_non_decreasing() {
        tracing::warn!("combined curve is not monotone; enable refit to enforce it");
    }
    Ok(overall)
}

#[cfg(test)]
mod tests {
    use crate::sample::Observation;

    use super::*;

    fn per_group(refit: bool) -> FitStrategy {
        FitStrategy::PerGroup {
            groups: None,
            refit,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_global_fit_pools_and_merges() {
        let samples = SampleSet::from_observations(vec![
            Observation::new(1, 10.0, 1.0, None),
            Observation::new(1, 20.0, 1.0, None),
            Observation::new(2, 5.0, 2.0, None),
        ]);
        let model = FittedModel::fit(&samples, &FitStrategy::Global, Interpolation::Step).unwrap();
        assert!(model.group_curves.is_empty());
        assert_close(model.value_at(1), 10.0);
        assert_close(model.value_at(2), 10.0);
        assert_close(model.estimate(50), 10.0);
    }

    #[test]
    fn test_group_absent_at_size_contributes_nothing() {
        // group 2 has no data at 3; its flat extrapolation (100) must not leak in
        let samples = SampleSet::from_observations(vec![
            Observation::new(3, 2.0, 5.0, Some(1)),
            Observation::new(10, 100.0, 1.0, Some(2)),
        ]);
        let model = FittedModel::fit(&samples, &per_group(true), Interpolation::Step).unwrap();
        assert_close(model.value_at(3), 2.0);
        assert_close(model.value_at(10), 100.0);
        assert_eq!(model.group_curves.len(), 2);
    }

    #[test]
    fn test_shared_size_is_weight_averaged() {
        let samples = SampleSet::from_observations(vec![
            Observation::new(4, 1.0, 3.0, Some(1)),
            Observation::new(4, 5.0, 1.0, Some(2)),
        ]);
        let model = FittedModel::fit(&samples, &per_group(false), Interpolation::Step).unwrap();
        assert_close(model.value_at(4), 2.0);
        assert_eq!(model.overall.as_piecewise().observed_weight(4), 4.0);
    }

    #[test]
    fn test_refit_repairs_combined_violation() {
        // each group is monotone, but the mix at 2 dips below the value at 1
        let samples = SampleSet::from_observations(vec![
            Observation::new(1, 5.0, 1.0, Some(1)),
            Observation::new(2, 6.0, 1.0, Some(1)),
            Observation::new(2, 1.0, 9.0, Some(2)),
        ]);

        let raw = FittedModel::fit(&samples, &per_group(false), Interpolation::Step).unwrap();
        assert!(matches!(raw.overall, OverallCurve::Unconstrained(_)));
        assert_close(raw.value_at(1), 5.0);
        assert_close(raw.value_at(2), 1.5);

        let refit = FittedModel::fit(&samples, &per_group(true), Interpolation::Step).unwrap();
        assert!(refit.overall.as_piecewise().is_non_decreasing());
        // (5*1 + 1.5*10) / 11
        assert_close(refit.value_at(1), 20.0 / 11.0);
        assert_close(refit.value_at(2), 20.0 / 11.0);
    }

    #[test]
    fn test_declared_group_without_data_is_reported() {
        let samples = SampleSet::from_observations(vec![Observation::new(1, 1.0, 1.0, Some(1))]);
        let strategy = FitStrategy::PerGroup {
            groups: Some(vec![1, 2]),
            refit: true,
        };
        let err = FittedModel::fit(&samples, &strategy, Interpolation::Step).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Group {
                group: 2,
                source: FitError::EmptyInput
            }
        ));
    }

    #[test]
    fn test_ungrouped_observation_in_group_mode() {
        let samples = SampleSet::from_observations(vec![Observation::new(7, 1.0, 1.0, None)]);
        let err = FittedModel::fit(&samples, &per_group(true), Interpolation::Step).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Ungrouped {
                count: 1,
                context_size: 7
            }
        ));
    }

    #[test]
    fn test_empty_samples() {
        let samples = SampleSet::default();
        assert!(matches!(
            FittedModel::fit(&samples, &FitStrategy::Global, Interpolation::Step),
            Err(ModelError::Global {
                source: FitError::EmptyInput
            })
        ));
        assert!(matches!(
            FittedModel::fit(&samples, &per_group(true), Interpolation::Step),
            Err(ModelError::Combine {
                source: FitError::EmptyInput
            })
        ));
    }

    #[test]
    fn test_fitted_for_prefers_group_curve() {
        let samples = SampleSet::from_observations(vec![
            Observation::new(1, 1.0, 1.0, Some(1)),
            Observation::new(1, 3.0, 1.0, Some(2)),
        ]);
        let model = FittedModel::fit(&samples, &per_group(true), Interpolation::Step).unwrap();
        assert_close(model.fitted_for(1, Some(2)), 3.0);
        assert_close(model.fitted_for(1, None), 2.0);
        assert_close(model.fitted_for(1, Some(9)), 2.0);
    }
}
