//! Pipeline configuration
//!
//! One [`PipelineConfig`] describes everything that differs between the
//! heuristic-table variants: input column names, the outcome filter, anchor
//! observations, how curves are fitted and combined, boundary overrides, and
//! the scaling and layout of the emitted table.
//!
//! The [`Preset`]s reproduce the tables the solver has historically shipped
//! with. A custom configuration can be written as JSON; `hustle-fit
//! show-config` prints a preset as a starting point.

use std::collections::BTreeSet;

use hustle_stats::isotonic::Interpolation;
use serde::{Deserialize, Serialize};

/// Number of candidate answers in the full word list.
pub const ANSWER_COUNT: usize = 2309;
/// Size of the extended answer list used by the legacy global table.
pub const LEGACY_ANSWER_COUNT: usize = 2315;
/// Guesses allowed per game.
pub const MAX_GUESSES: u32 = 6;
/// Proven optimal average number of guesses over the full answer list.
pub const OPTIMAL_AVERAGE_GUESSES: f64 = 3.4201;

/// Names of the input columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnNames {
    /// Context size column (`n`, `x`, `alen`, ...).
    pub context_size: String,
    /// Outcome column (`h`, `y`, ...).
    pub outcome: String,
    /// Occurrence count column. Every row weighs `1` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    /// Group key column (turns left, `m`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// A synthetic observation with an analytically known outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub context_size: usize,
    pub outcome: f64,
    #[serde(default = "default_anchor_weight")]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<u32>,
}

fn default_anchor_weight() -> f64 {
    1.0
}

/// How observations are turned into the overall curve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FitStrategy {
    /// One isotonic fit over all observations.
    Global,
    /// One isotonic fit per group, combined by observed weight per context size.
    PerGroup {
        /// Groups that must be present. Defaults to every group in the data.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        groups: Option<Vec<u32>>,
        /// Re-fit the combined values so the result is monotone.
        #[serde(default = "default_refit")]
        refit: bool,
    },
}

fn default_refit() -> bool {
    true
}

/// A per-unit estimate forced to a fixed value at one context size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryOverride {
    pub context_size: usize,
    pub value: f64,
    /// Why the fitted value is not trusted here.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

/// Whether the table holds per-unit estimates or totals over the context.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scaling {
    #[default]
    PerUnit,
    /// Multiply each estimate by its context size.
    Total,
}

/// Layout of the emitted table.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum TableFormat {
    /// No header; row `i` holds the value for context size `i`, from `0`.
    #[default]
    Plain,
    /// Header plus `context_size,value` rows starting at `min_context_size`.
    Keyed {
        key_column: String,
        value_column: String,
        #[serde(default)]
        min_context_size: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub columns: ColumnNames,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Rows whose outcome is at or below this value are dropped.
    #[serde(default)]
    pub outcome_threshold: f64,
    #[serde(default)]
    pub anchors: Vec<Anchor>,
    pub fit: FitStrategy,
    #[serde(default)]
    pub interpolation: Interpolation,
    /// Largest context size in the table (inclusive).
    pub max_context_size: usize,
    /// Applied to the per-unit estimate, before scaling.
    #[serde(default)]
    pub overrides: Vec<BoundaryOverride>,
    #[serde(default)]
    pub scaling: Scaling,
    #[serde(default)]
    pub output: TableFormat,
}

fn default_delimiter() -> char {
    ','
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("outcome threshold must not be NaN")]
    InvalidThreshold,
    #[display("per-group fitting requires a group column")]
    MissingGroupColumn,
    #[display("anchor at context size {context_size} has no group, but fitting is per group")]
    UngroupedAnchor { context_size: usize },
    #[display(
        "anchor at context size {context_size} is invalid (outcome {outcome}, weight {weight})"
    )]
    InvalidAnchor {
        context_size: usize,
        outcome: f64,
        weight: f64,
    },
    #[display("override at context size {context_size} is outside 0..={max_context_size}")]
    OverrideOutOfRange {
        context_size: usize,
        max_context_size: usize,
    },
    #[display("override at context size {context_size} has non-finite value")]
    NonFiniteOverride { context_size: usize },
    #[display("context size {context_size} is overridden more than once")]
    DuplicateOverride { context_size: usize },
    #[display("keyed output starts at {min_context_size}, beyond the maximum {max_context_size}")]
    EmptyOutputRange {
        min_context_size: usize,
        max_context_size: usize,
    },
}

impl PipelineConfig {
    /// Checks the configuration for contradictions before any data is read.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outcome_threshold.is_nan() {
            return Err(ConfigError::InvalidThreshold);
        }

        let per_group = matches!(self.fit, FitStrategy::PerGroup { .. });
        if per_group && self.columns.group.is_none() {
            return Err(ConfigError::MissingGroupColumn);
        }

        for anchor in &self.anchors {
            if !anchor.outcome.is_finite() || !(anchor.weight.is_finite() && anchor.weight > 0.0) {
                return Err(ConfigError::InvalidAnchor {
                    context_size: anchor.context_size,
                    outcome: anchor.outcome,
                    weight: anchor.weight,
                });
            }
            if per_group && anchor.group.is_none() {
                return Err(ConfigError::UngroupedAnchor {
                    context_size: anchor.context_size,
                });
            }
        }

        let mut seen = BTreeSet::new();
        for ov in &self.overrides {
            if ov.context_size > self.max_context_size {
                return Err(ConfigError::OverrideOutOfRange {
                    context_size: ov.context_size,
                    max_context_size: self.max_context_size,
                });
            }
            if !ov.value.is_finite() {
                return Err(ConfigError::NonFiniteOverride {
                    context_size: ov.context_size,
                });
            }
            if !seen.insert(ov.context_size) {
                return Err(ConfigError::DuplicateOverride {
                    context_size: ov.context_size,
                });
            }
        }

        if let TableFormat::Keyed {
            min_context_size, ..
        } = self.output
            && min_context_size > self.max_context_size
        {
            return Err(ConfigError::EmptyOutputRange {
                min_context_size,
                max_context_size: self.max_context_size,
            });
        }

        Ok(())
    }

    /// Context sizes whose values are forced by an override.
    #[must_use]
    pub fn overridden_context_sizes(&self) -> BTreeSet<usize> {
        self.overrides.iter().map(|ov| ov.context_size).collect()
    }
}

/// Built-in configurations.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, derive_more::FromStr)]
pub enum Preset {
    /// Per-turns-left fits over `n,h,ct,m` data, combined into a total-guesses table.
    #[default]
    Grouped,
    /// Single fit over `x,y` data with the legacy boundary overrides.
    Global,
    /// Keyed `n,h` approximation table evaluated from 1.
    Approx,
}

impl Preset {
    #[must_use]
    pub fn config(self) -> PipelineConfig {
        match self {
            Preset::Grouped => grouped_heuristic(),
            Preset::Global => global_heuristic(),
            Preset::Approx => approx_heuristic(),
        }
    }
}

fn empty_context_override() -> BoundaryOverride {
    BoundaryOverride {
        context_size: 0,
        value: 0.0,
        reason: "no candidates left, nothing to guess".to_owned(),
    }
}

fn grouped_heuristic() -> PipelineConfig {
    PipelineConfig {
        columns: ColumnNames {
            context_size: "n".to_owned(),
            outcome: "h".to_owned(),
            weight: Some("ct".to_owned()),
            group: Some("m".to_owned()),
        },
        delimiter: default_delimiter(),
        outcome_threshold: 0.0,
        anchors: vec![Anchor {
            context_size: ANSWER_COUNT,
            outcome: OPTIMAL_AVERAGE_GUESSES,
            weight: 1.0,
            group: Some(MAX_GUESSES),
        }],
        fit: FitStrategy::PerGroup {
            groups: None,
            refit: true,
        },
        interpolation: Interpolation::Step,
        max_context_size: ANSWER_COUNT,
        overrides: vec![empty_context_override()],
        scaling: Scaling::Total,
        output: TableFormat::Plain,
    }
}

fn global_heuristic() -> PipelineConfig {
    PipelineConfig {
        columns: ColumnNames {
            context_size: "x".to_owned(),
            outcome: "y".to_owned(),
            weight: None,
            group: None,
        },
        delimiter: default_delimiter(),
        outcome_threshold: 2.0,
        anchors: vec![Anchor {
            context_size: LEGACY_ANSWER_COUNT,
            outcome: 3.42,
            weight: 1.0,
            group: None,
        }],
        fit: FitStrategy::Global,
        interpolation: Interpolation::Step,
        max_context_size: LEGACY_ANSWER_COUNT,
        overrides: vec![
            empty_context_override(),
            BoundaryOverride {
                context_size: 1,
                value: 0.0,
                reason: "the last candidate is guessed without further cost".to_owned(),
            },
            BoundaryOverride {
                context_size: 2,
                value: 1.5,
                reason: "two candidates take one or two more guesses".to_owned(),
            },
        ],
        scaling: Scaling::Total,
        output: TableFormat::Plain,
    }
}

fn approx_heuristic() -> PipelineConfig {
    PipelineConfig {
        columns: ColumnNames {
            context_size: "n".to_owned(),
            outcome: "h".to_owned(),
            weight: None,
            group: None,
        },
        delimiter: default_delimiter(),
        outcome_threshold: 0.0,
        anchors: vec![],
        fit: FitStrategy::Global,
        interpolation: Interpolation::Linear,
        max_context_size: ANSWER_COUNT,
        overrides: vec![],
        scaling: Scaling::PerUnit,
        output: TableFormat::Keyed {
            key_column: "n".to_owned(),
            value_column: "h".to_owned(),
            min_context_size: 1,
        },
    }
}
