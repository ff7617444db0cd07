//! Sample loading
//!
//! Turns raw search statistics into a [`SampleSet`]: rows are read from
//! delimited text, inadmissible outcomes are dropped, and the configured
//! anchor observations are appended.
//!
//! # Filtering
//!
//! A row is dropped (and counted in the [`LoadReport`]) when:
//!
//! - one of the configured columns is empty (missing value)
//! - the outcome is NaN or infinite
//! - the outcome is at or below the configured threshold
//!
//! Unparseable values and non-positive weights are errors, not drops.

use std::{collections::BTreeMap, io::BufRead};

use hustle_stats::isotonic::WeightedPoint;
use serde::Serialize;

use crate::{
    config::{Anchor, PipelineConfig},
    delimited::{DelimitedError, DelimitedTable, Row, parse_count},
};

/// One empirical (or anchored) measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    pub context_size: usize,
    pub outcome: f64,
    /// Occurrence count.
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<u32>,
}

impl Observation {
    #[must_use]
    pub fn new(context_size: usize, outcome: f64, weight: f64, group: Option<u32>) -> Self {
        Self {
            context_size,
            outcome,
            weight,
            group,
        }
    }

    #[must_use]
    pub fn to_point(&self) -> WeightedPoint {
        WeightedPoint::new(self.context_size, self.outcome, self.weight)
    }
}

impl From<&Anchor> for Observation {
    fn from(anchor: &Anchor) -> Self {
        Self::new(
            anchor.context_size,
            anchor.outcome,
            anchor.weight,
            anchor.group,
        )
    }
}

/// Row counts recorded while loading.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub rows_read: usize,
    pub missing: usize,
    pub non_finite: usize,
    pub below_threshold: usize,
    pub anchors: usize,
}

impl LoadReport {
    #[must_use]
    pub fn admitted(&self) -> usize {
        self.rows_read - self.missing - self.non_finite - self.below_threshold
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum LoadError {
    #[display("malformed input")]
    #[from]
    Format(#[error(source)] DelimitedError),
    #[display("line {line}: cannot parse {column} value '{value}'")]
    InvalidField {
        line: usize,
        column: String,
        value: String,
    },
    #[display("line {line}: weight must be positive, got {weight}")]
    InvalidWeight { line: usize, weight: f64 },
}

/// An immutable collection of observations for one pipeline run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SampleSet {
    observations: Vec<Observation>,
}

impl SampleSet {
    #[must_use]
    pub fn from_observations(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    /// Reads, filters and anchors observations according to `config`.
    ///
    /// # Examples
    ///
    /// ```
    /// use hustle_analysis::{config::Preset, sample::SampleSet};
    ///
    /// let input = "m,n,h,ct\n1,3,1.5,4\n2,3,inf,1\n2,5,,1\n";
    /// let config = Preset::Grouped.config();
    /// let (samples, report) = SampleSet::load(input.as_bytes(), &config).unwrap();
    ///
    /// assert_eq!(report.rows_read, 3);
    /// assert_eq!(report.non_finite, 1);
    /// assert_eq!(report.missing, 1);
    /// // one admitted row plus the anchor at the full answer list
    /// assert_eq!(samples.len(), 2);
    /// ```
    pub fn load<R>(reader: R, config: &PipelineConfig) -> Result<(Self, LoadReport), LoadError>
    where
        R: BufRead,
    {
        let table = DelimitedTable::read(reader, config.delimiter)?;
        let columns = &config.columns;
        let layout = Layout {
            context_size: table.column(&columns.context_size)?,
            outcome: table.column(&columns.outcome)?,
            weight: columns
                .weight
                .as_deref()
                .map(|name| table.column(name))
                .transpose()?,
            group: columns
                .group
                .as_deref()
                .map(|name| table.column(name))
                .transpose()?,
        };

        let mut report = LoadReport {
            rows_read: table.rows.len(),
            ..LoadReport::default()
        };
        let mut observations = Vec::with_capacity(table.rows.len() + config.anchors.len());

        for row in &table.rows {
            match layout.parse(row, config)? {
                Parsed::Admitted(obs) => observations.push(obs),
                Parsed::Missing => report.missing += 1,
                Parsed::NonFinite => report.non_finite += 1,
                Parsed::BelowThreshold => report.below_threshold += 1,
            }
        }

        observations.extend(config.anchors.iter().map(Observation::from));
        report.anchors = config.anchors.len();

        tracing::debug!(
            rows = report.rows_read,
            missing = report.missing,
            non_finite = report.non_finite,
            below_threshold = report.below_threshold,
            anchors = report.anchors,
            "loaded samples"
        );

        Ok((Self { observations }, report))
    }

    #[must_use]
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = WeightedPoint> + '_ {
        self.observations.iter().map(Observation::to_point)
    }

    /// Splits observations by group key. Ungrouped observations are returned separately.
    #[must_use]
    pub fn partition_by_group(&self) -> (BTreeMap<u32, Vec<Observation>>, Vec<Observation>) {
        let mut groups = BTreeMap::<u32, Vec<Observation>>::new();
        let mut ungrouped = vec![];
        for obs in &self.observations {
            match obs.group {
                Some(group) => groups.entry(group).or_default().push(*obs),
                None => ungrouped.push(*obs),
            }
        }
        (groups, ungrouped)
    }
}

#[derive(Debug, Clone, Copy)]
struct Layout {
    context_size: usize,
    outcome: usize,
    weight: Option<usize>,
    group: Option<usize>,
}

enum Parsed {
    Admitted(Observation),
    Missing,
    NonFinite,
    BelowThreshold,
}

impl Layout {
    fn parse(&self, row: &Row, config: &PipelineConfig) -> Result<Parsed, LoadError> {
        let columns = &config.columns;
        let invalid = |column: &str, value: &str| LoadError::InvalidField {
            line: row.line,
            column: column.to_owned(),
            value: value.to_owned(),
        };

        let Some(raw_size) = row.field(self.context_size) else {
            return Ok(Parsed::Missing);
        };
        let Some(raw_outcome) = row.field(self.outcome) else {
            return Ok(Parsed::Missing);
        };
        let raw_weight = match self.weight {
            Some(idx) => match row.field(idx) {
                Some(value) => Some(value),
                None => return Ok(Parsed::Missing),
            },
            None => None,
        };
        let raw_group = match self.group {
            Some(idx) => match row.field(idx) {
                Some(value) => Some(value),
                None => return Ok(Parsed::Missing),
            },
            None => None,
        };

        let context_size =
            parse_count(raw_size).ok_or_else(|| invalid(&columns.context_size, raw_size))?;
        let outcome = raw_outcome
            .parse::<f64>()
            .map_err(|_| invalid(&columns.outcome, raw_outcome))?;
        let weight = match raw_weight {
            Some(value) => value.parse::<f64>().map_err(|_| {
                invalid(columns.weight.as_deref().unwrap_or_default(), value)
            })?,
            None => 1.0,
        };
        let group = raw_group
            .map(|value| {
                parse_count(value)
                    .and_then(|g| u32::try_from(g).ok())
                    .ok_or_else(|| invalid(columns.group.as_deref().unwrap_or_default(), value))
            })
            .transpose()?;

        if !(weight.is_finite() && weight > 0.0) {
            return Err(LoadError::InvalidWeight {
                line: row.line,
                weight,
            });
        }
        if !outcome.is_finite() {
            return Ok(Parsed::NonFinite);
        }
        if outcome <= config.outcome_threshold {
            return Ok(Parsed::BelowThreshold);
        }

        Ok(Parsed::Admitted(Observation::new(
            context_size,
            outcome,
            weight,
            group,
        )))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{ColumnNames, FitStrategy, Preset, Scaling, TableFormat};

    use super::*;

    fn xy_config(threshold: f64) -> PipelineConfig {
        PipelineConfig {
            columns: ColumnNames {
                context_size: "x".to_owned(),
                outcome: "y".to_owned(),
                weight: None,
                group: None,
            },
            delimiter: ',',
            outcome_threshold: threshold,
            anchors: vec![],
            fit: FitStrategy::Global,
            interpolation: hustle_stats::isotonic::Interpolation::Step,
            max_context_size: 10,
            overrides: vec![],
            scaling: Scaling::PerUnit,
            output: TableFormat::Plain,
        }
    }

    #[test]
    fn test_threshold_filters_outcomes() {
        let input = "x,y\n1,0\n2,2\n3,2.5\n4,-1\n5,NaN\n";
        let (samples, report) = SampleSet::load(input.as_bytes(), &xy_config(2.0)).unwrap();
        assert_eq!(samples.observations(), &[Observation::new(3, 2.5, 1.0, None)]);
        assert_eq!(report.below_threshold, 3);
        assert_eq!(report.non_finite, 1);
        assert_eq!(report.admitted(), 1);

        let (samples, _) = SampleSet::load(input.as_bytes(), &xy_config(0.0)).unwrap();
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn test_comments_and_column_order() {
        let input = "# generated\nct,h,n,m\n# mid-file note\n3,1.25,4,2\n";
        let (samples, report) =
            SampleSet::load(input.as_bytes(), &Preset::Grouped.config()).unwrap();
        assert_eq!(report.rows_read, 1);
        assert_eq!(report.anchors, 1);
        assert_eq!(samples.observations()[0], Observation::new(4, 1.25, 3.0, Some(2)));
        assert_eq!(samples.observations()[1].group, Some(6));
    }

    #[test]
    fn test_tab_delimited_empty_weight_is_missing() {
        let mut config = Preset::Grouped.config();
        config.delimiter = '\t';
        let input = "m\tn\th\tct\n1\t3\t1.5\t4\n2\t5\t2.0\t\n";
        let (samples, report) = SampleSet::load(input.as_bytes(), &config).unwrap();
        assert_eq!(report.rows_read, 2);
        assert_eq!(report.missing, 1);
        assert_eq!(samples.observations()[0], Observation::new(3, 1.5, 4.0, Some(1)));
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let input = "n,h\n1,1\n";
        let err = SampleSet::load(input.as_bytes(), &Preset::Grouped.config()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Format(DelimitedError::MissingColumn { ref name }) if name == "ct"
        ));
    }

    #[test]
    fn test_unparseable_row_reports_line() {
        let input = "x,y\n1,1.5\nabc,2\n";
        let err = SampleSet::load(input.as_bytes(), &xy_config(0.0)).unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidField { line: 3, ref column, .. } if column == "x"
        ));
    }

    #[test]
    fn test_non_positive_weight_is_fatal() {
        let input = "m,n,h,ct\n1,2,1.5,0\n";
        let err = SampleSet::load(input.as_bytes(), &Preset::Grouped.config()).unwrap_err();
        assert!(matches!(err, LoadError::InvalidWeight { line: 2, .. }));
    }

    #[test]
    fn test_partition_by_group() {
        let samples = SampleSet::from_observations(vec![
            Observation::new(1, 1.0, 1.0, Some(2)),
            Observation::new(2, 1.0, 1.0, None),
            Observation::new(3, 1.0, 1.0, Some(1)),
            Observation::new(4, 1.0, 1.0, Some(2)),
        ]);
        let (groups, ungrouped) = samples.partition_by_group();
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(groups[&2].len(), 2);
        assert_eq!(ungrouped.len(), 1);
    }
}
