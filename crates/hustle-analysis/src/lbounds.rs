//! Lower-bound table expansion
//!
//! Lower bounds on the number of guesses are measured on a sparse grid of
//! answer-list sizes (`first, first + step, ..., last`). The solver indexes the
//! bound table by answer-list size, so each sample is held for the `step`
//! sizes it stands for:
//!
//! ```text
//! samples: alen=1 lb=3   alen=5 lb=4   alen=9 lb=6     (step 4)
//! table:   1..=4 -> 3    5..=8 -> 4    9 -> 6
//! ```

use std::io::{self, BufRead, Write};

use crate::delimited::{DelimitedError, DelimitedTable, Row, parse_count};

/// Column holding the answer-list size.
pub const SIZE_COLUMN: &str = "alen";
/// Column holding the lower bound.
pub const BOUND_COLUMN: &str = "lb";
/// Metadata comment that records the sampling step.
pub const STEP_METADATA: &str = "step";

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum LowerBoundError {
    #[display("malformed input")]
    #[from]
    Format(#[error(source)] DelimitedError),
    #[display("line {line}: cannot parse {column} value '{value}'")]
    InvalidField {
        line: usize,
        column: &'static str,
        value: String,
    },
    #[display("no lower-bound samples")]
    Empty,
    #[display("step must be positive")]
    ZeroStep,
    #[display("no step given and none recorded in the input metadata")]
    MissingStep,
    #[display("sample #{index} is at size {found}, expected {expected} for step {step}")]
    StepMismatch {
        index: usize,
        expected: usize,
        found: usize,
        step: usize,
    },
}

/// Sampled `(size, bound)` pairs as read from a generator output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowerBoundSamples {
    samples: Vec<(usize, u32)>,
    recorded_step: Option<usize>,
}

impl LowerBoundSamples {
    #[must_use]
    pub fn new(samples: Vec<(usize, u32)>) -> Self {
        Self {
            samples,
            recorded_step: None,
        }
    }

    /// Reads `alen,lb` rows, keeping the `# step: N` metadata if present.
    pub fn load<R>(reader: R) -> Result<Self, LowerBoundError>
    where
        R: BufRead,
    {
        let table = DelimitedTable::read(reader, ',')?;
        let size_idx = table.column(SIZE_COLUMN)?;
        let bound_idx = table.column(BOUND_COLUMN)?;

        let samples = table
            .rows
            .iter()
            .map(|row| {
                let size = required_field(row, size_idx, SIZE_COLUMN)?;
                let bound = required_field(row, bound_idx, BOUND_COLUMN)?;
                let size = parse_count(size).ok_or_else(|| LowerBoundError::InvalidField {
                    line: row.line,
                    column: SIZE_COLUMN,
                    value: size.to_owned(),
                })?;
                let bound = bound
                    .parse::<u32>()
                    .map_err(|_| LowerBoundError::InvalidField {
                        line: row.line,
                        column: BOUND_COLUMN,
                        value: bound.to_owned(),
                    })?;
                Ok((size, bound))
            })
            .collect::<Result<Vec<_>, LowerBoundError>>()?;

        let recorded_step = table
            .metadata(STEP_METADATA)
            .and_then(|s| s.parse::<usize>().ok());

        Ok(Self {
            samples,
            recorded_step,
        })
    }

    /// Step recorded in the input metadata, if any.
    #[must_use]
    pub fn recorded_step(&self) -> Option<usize> {
        self.recorded_step
    }

    /// Expands the samples onto every size between the first and last sample.
    ///
    /// When `step` is `None` the recorded step is used.
    ///
    /// # Examples
    ///
    /// ```
    /// use hustle_analysis::lbounds::LowerBoundSamples;
    ///
    /// let samples = LowerBoundSamples::new(vec![(9, 6), (1, 3), (5, 4)]);
    /// let table = samples.expand(Some(4)).unwrap();
    ///
    /// assert_eq!(table.first_size(), 1);
    /// assert_eq!(table.bounds(), &[3, 3, 3, 3, 4, 4, 4, 4, 6]);
    /// ```
    pub fn expand(&self, step: Option<usize>) -> Result<LowerBoundTable, LowerBoundError> {
        let step = match (step, self.recorded_step) {
            (Some(step), Some(recorded)) if step != recorded => {
                tracing::warn!(step, recorded, "step differs from the recorded metadata");
                step
            }
            (Some(step), _) | (None, Some(step)) => step,
            (None, None) => return Err(LowerBoundError::MissingStep),
        };
        if step == 0 {
            return Err(LowerBoundError::ZeroStep);
        }

        let mut samples = self.samples.clone();
        samples.sort_by_key(|(size, _)| *size);
        let Some(&(first, _)) = samples.first() else {
            return Err(LowerBoundError::Empty);
        };

        // the grid is checked before anything is allocated from `step`
        for (index, &(size, _)) in samples.iter().enumerate() {
            let expected = index.checked_mul(step).and_then(|o| first.checked_add(o));
            if expected != Some(size) {
                return Err(LowerBoundError::StepMismatch {
                    index,
                    expected: first.saturating_add(index.saturating_mul(step)),
                    found: size,
                    step,
                });
            }
        }

        let last = samples.len() - 1;
        let bounds = samples
            .iter()
            .enumerate()
            .flat_map(|(index, &(_, bound))| {
                std::iter::repeat_n(bound, if index == last { 1 } else { step })
            })
            .collect();

        Ok(LowerBoundTable {
            first_size: first,
            bounds,
        })
    }
}

fn required_field<'a>(
    row: &'a Row,
    idx: usize,
    column: &'static str,
) -> Result<&'a str, LowerBoundError> {
    row.field(idx).ok_or_else(|| LowerBoundError::InvalidField {
        line: row.line,
        column,
        value: String::new(),
    })
}

/// Lower bounds for every size in `first_size..first_size + bounds.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowerBoundTable {
    first_size: usize,
    bounds: Vec<u32>,
}

impl LowerBoundTable {
    #[must_use]
    pub fn first_size(&self) -> usize {
        self.first_size
    }

    #[must_use]
    pub fn last_size(&self) -> usize {
        self.first_size + self.bounds.len() - 1
    }

    #[must_use]
    pub fn bounds(&self) -> &[u32] {
        &self.bounds
    }

    #[must_use]
    pub fn get(&self, size: usize) -> Option<u32> {
        size.checked_sub(self.first_size)
            .and_then(|i| self.bounds.get(i))
            .copied()
    }

    /// Writes an `alen,lb` header followed by one row per size.
    pub fn write_to<W>(&self, mut writer: W) -> io::Result<()>
    where
        W: Write,
    {
        writeln!(writer, "{SIZE_COLUMN},{BOUND_COLUMN}")?;
        for (i, bound) in self.bounds.iter().enumerate() {
            writeln!(writer, "{},{bound}", self.first_size + i)?;
        }
        writer.flush()
    }
}
