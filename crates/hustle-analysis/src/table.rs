//! Lookup table construction and output
//!
//! The table has one value for every context size in `0..=max`, built in
//! this order:
//!
//! 1. evaluate the per-unit estimate
//! 2. replace it with the boundary override, if the size has one
//! 3. multiply by the context size when [`Scaling::Total`] is configured
//! 4. replace a NaN result with `0` (logged, never silent)

use std::{
    collections::BTreeSet,
    io::{self, Write},
};

use serde::Serialize;

use crate::{
    config::{BoundaryOverride, Scaling, TableFormat},
    model::Estimator,
};

/// What happened while building a table.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    /// Context sizes whose estimate came from an override.
    pub overridden: Vec<usize>,
    /// Context sizes whose value was NaN and replaced by `0`.
    pub nan_filled: Vec<usize>,
}

/// Dense per-context-size values, indexed directly by context size.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    values: Vec<f64>,
}

impl LookupTable {
    /// Evaluates `estimator` at every context size in `0..=max_context_size`.
    ///
    /// # Examples
    ///
    /// ```
    /// use hustle_analysis::{
    ///     config::{BoundaryOverride, Scaling},
    ///     table::LookupTable,
    /// };
    ///
    /// let overrides = [BoundaryOverride {
    ///     context_size: 1,
    ///     value: 0.0,
    ///     reason: String::new(),
    /// }];
    /// let (table, report) = LookupTable::build(3, &|_: usize| 2.0, &overrides, Scaling::Total);
    ///
    /// assert_eq!(table.values(), &[0.0, 0.0, 4.0, 6.0]);
    /// assert_eq!(report.overridden, vec![1]);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn build<E>(
        max_context_size: usize,
        estimator: &E,
        overrides: &[BoundaryOverride],
        scaling: Scaling,
    ) -> (Self, TableReport)
    where
        E: Estimator + ?Sized,
    {
        let mut report = TableReport::default();
        let values = (0..=max_context_size)
            .map(|context_size| {
                let estimate = match overrides.iter().find(|ov| ov.context_size == context_size) {
                    Some(ov) => {
                        report.overridden.push(context_size);
                        ov.value
                    }
                    None => estimator.estimate(context_size),
                };
                let value = match scaling {
                    Scaling::PerUnit => estimate,
                    Scaling::Total => estimate * context_size as f64,
                };
                if value.is_nan() {
                    report.nan_filled.push(context_size);
                    0.0
                } else if value == 0.0 {
                    // normalize -0.0 so the output text is stable
                    0.0
                } else {
                    value
                }
            })
            .collect();

        if !report.nan_filled.is_empty() {
            tracing::warn!(
                count = report.nan_filled.len(),
                first = report.nan_filled[0],
                "undefined table entries replaced with 0"
            );
        }

        (Self { values }, report)
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn max_context_size(&self) -> usize {
        self.values.len().saturating_sub(1)
    }

    #[must_use]
    pub fn get(&self, context_size: usize) -> Option<f64> {
        self.values.get(context_size).copied()
    }

    /// Context sizes `i` where `value[i] > value[i + 1]`, skipping pairs that
    /// touch an excluded size.
    #[must_use]
    pub fn monotonicity_violations(&self, excluded: &BTreeSet<usize>) -> Vec<usize> {
        self.values
            .windows(2)
            .enumerate()
            .filter(|(i, w)| {
                w[0] > w[1] && !excluded.contains(i) && !excluded.contains(&(i + 1))
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Writes the table in the requested layout.
    pub fn write_to<W>(&self, mut writer: W, format: &TableFormat) -> io::Result<()>
    where
        W: Write,
    {
        match format {
            TableFormat::Plain => {
                for value in &self.values {
                    writeln!(writer, "{value}")?;
                }
            }
            TableFormat::Keyed {
                key_column,
                value_column,
                min_context_size,
            } => {
                writeln!(writer, "{key_column},{value_column}")?;
                for (context_size, value) in self.values.iter().enumerate().skip(*min_context_size)
                {
                    writeln!(writer, "{context_size},{value}")?;
                }
            }
        }
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn override_at(context_size: usize, value: f64) -> BoundaryOverride {
        BoundaryOverride {
            context_size,
            value,
            reason: String::new(),
        }
    }

    #[test]
    fn test_complete_and_per_unit() {
        let (table, report) =
            LookupTable::build(4, &|x: usize| x as f64 / 2.0, &[], Scaling::PerUnit);
        assert_eq!(table.len(), 5);
        assert_eq!(table.max_context_size(), 4);
        assert_eq!(table.values(), &[0.0, 0.5, 1.0, 1.5, 2.0]);
        assert_eq!(report, TableReport::default());
    }

    #[test]
    fn test_override_applies_before_scaling() {
        let (table, _) = LookupTable::build(
            3,
            &|_: usize| 10.0,
            &[override_at(2, 1.5)],
            Scaling::Total,
        );
        assert_eq!(table.get(2), Some(3.0));
        assert_eq!(table.get(3), Some(30.0));
        assert_eq!(table.get(4), None);
    }

    #[test]
    fn test_nan_is_filled_with_zero() {
        let (table, report) = LookupTable::build(
            2,
            &|x: usize| if x == 1 { f64::NAN } else { 1.0 },
            &[],
            Scaling::Total,
        );
        assert_eq!(table.values(), &[0.0, 0.0, 2.0]);
        assert_eq!(report.nan_filled, vec![1]);
        assert!(table.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_monotonicity_violations_skip_overrides() {
        let (table, _) = LookupTable::build(
            4,
            &|_: usize| 1.0,
            &[override_at(2, 5.0)],
            Scaling::PerUnit,
        );
        assert_eq!(table.monotonicity_violations(&BTreeSet::new()), vec![2]);
        assert!(table.monotonicity_violations(&BTreeSet::from([2])).is_empty());
    }

    #[test]
    fn test_plain_output() {
        let (table, _) = LookupTable::build(2, &|_: usize| 1.5, &[], Scaling::Total);
        let mut out = vec![];
        table.write_to(&mut out, &TableFormat::Plain).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0\n1.5\n3\n");
    }

    #[test]
    fn test_keyed_output_starts_at_min() {
        let (table, _) = LookupTable::build(3, &|x: usize| x as f64, &[], Scaling::PerUnit);
        let format = TableFormat::Keyed {
            key_column: "n".to_owned(),
            value_column: "h".to_owned(),
            min_context_size: 1,
        };
        let mut out = vec![];
        table.write_to(&mut out, &format).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "n,h\n1,1\n2,2\n3,3\n");
    }
}
