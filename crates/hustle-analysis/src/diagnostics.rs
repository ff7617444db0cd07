//! Fit-quality diagnostics
//!
//! Collects everything a plotting tool needs to judge a fit: the fitted
//! curves, each observation next to its fitted value, and summary statistics
//! of the residuals. Nothing here renders; the data is serialized as JSON.

use hustle_stats::{
    descriptive::{DescriptiveStats, coefficient_of_determination},
    isotonic::{Interpolation, MonotoneCurve},
};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    model::{FittedModel, OverallCurve},
    sample::SampleSet,
};

/// One observation next to the model's estimate for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResidualPoint {
    pub context_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<u32>,
    pub outcome: f64,
    pub weight: f64,
    pub fitted: f64,
    /// `fitted - outcome`
    pub residual: f64,
    /// `outcome / context_size`; absent at context size 0.
    pub outcome_per_unit: Option<f64>,
    pub fitted_per_unit: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FitDiagnostics {
    pub interpolation: Interpolation,
    /// Weighted R² of the fitted values against the outcomes.
    pub score: Option<f64>,
    /// Unweighted summary of the residuals.
    pub residual_summary: Option<DescriptiveStats>,
    pub group_curves: BTreeMap<u32, MonotoneCurve>,
    pub overall: OverallCurve,
    pub points: Vec<ResidualPoint>,
}

impl FitDiagnostics {
    /// Evaluates `model` at every observation of `samples`.
    ///
    /// Grouped observations are compared with their own group's curve.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn new(samples: &SampleSet, model: &FittedModel) -> Self {
        let points = samples
            .observations()
            .iter()
            .map(|obs| {
                let fitted = model.fitted_for(obs.context_size, obs.group);
                let per_unit = |value: f64| {
                    (obs.context_size > 0).then(|| value / obs.context_size as f64)
                };
                ResidualPoint {
                    context_size: obs.context_size,
                    group: obs.group,
                    outcome: obs.outcome,
                    weight: obs.weight,
                    fitted,
                    residual: fitted - obs.outcome,
                    outcome_per_unit: per_unit(obs.outcome),
                    fitted_per_unit: per_unit(fitted),
                }
            })
            .collect::<Vec<_>>();

        let score =
            coefficient_of_determination(points.iter().map(|p| (p.outcome, p.fitted, p.weight)));
        let residual_summary = DescriptiveStats::new(points.iter().map(|p| p.residual));

        Self {
            interpolation: model.interpolation,
            score,
            residual_summary,
            group_curves: model.group_curves.clone(),
            overall: model.overall.clone(),
            points,
        }
    }
}
