//! End-to-end table generation
//!
//! [`Pipeline`] wires the stages together for one configuration:
//!
//! ```text
//! input rows ─▶ SampleSet ─▶ FittedModel ─▶ LookupTable ─▶ output rows
//!             (load+filter)   (fit+combine)   (override+scale)
//! ```
//!
//! Every stage is deterministic, so the same input and configuration always
//! produce the same bytes.

use std::io::{BufRead, Write};

use crate::{
    config::{ConfigError, PipelineConfig},
    diagnostics::FitDiagnostics,
    model::{FittedModel, ModelError},
    sample::{LoadError, LoadReport, SampleSet},
    table::{LookupTable, TableReport},
};

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum PipelineError {
    #[display("invalid configuration")]
    #[from]
    Config(#[error(source)] ConfigError),
    #[display("failed to load samples")]
    #[from]
    Load(#[error(source)] LoadError),
    #[display("failed to fit samples")]
    #[from]
    Model(#[error(source)] ModelError),
}

/// Result of fitting and tabulating one sample set.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub model: FittedModel,
    pub table: LookupTable,
    pub table_report: TableReport,
    /// Adjacent context sizes where the table decreases, ignoring overridden sizes.
    pub violations: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Validates `config` and wraps it.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn load<R>(&self, reader: R) -> Result<(SampleSet, LoadReport), PipelineError>
    where
        R: BufRead,
    {
        Ok(SampleSet::load(reader, &self.config)?)
    }

    /// Fits `samples` and builds the table.
    ///
    /// # Examples
    ///
    /// ```
    /// use hustle_analysis::{config::Preset, pipeline::Pipeline};
    ///
    /// let pipeline = Pipeline::new(Preset::Global.config()).unwrap();
    /// let (samples, _) = pipeline.load("x,y\n10,2.5\n20,3\n".as_bytes()).unwrap();
    /// let output = pipeline.run(&samples).unwrap();
    ///
    /// assert_eq!(output.table.len(), 2316);
    /// assert_eq!(output.table.get(2), Some(3.0));
    /// assert_eq!(output.table.get(10), Some(25.0));
    /// ```
    pub fn run(&self, samples: &SampleSet) -> Result<PipelineOutput, PipelineError> {
        let config = &self.config;
        tracing::info!(
            interpolation = ?config.interpolation,
            observations = samples.len(),
            "fitting samples"
        );
        let model = FittedModel::fit(samples, &config.fit, config.interpolation)?;

        let (table, table_report) = LookupTable::build(
            config.max_context_size,
            &model,
            &config.overrides,
            config.scaling,
        );

        let violations = table.monotonicity_violations(&config.overridden_context_sizes());
        if !violations.is_empty() {
            tracing::warn!(
                count = violations.len(),
                first = violations[0],
                "table decreases between adjacent context sizes"
            );
        }

        Ok(PipelineOutput {
            model,
            table,
            table_report,
            violations,
        })
    }

    /// Loads, fits and writes the table in the configured format.
    pub fn generate<R, W>(&self, reader: R, writer: W) -> Result<PipelineOutput, GenerateError>
    where
        R: BufRead,
        W: Write,
    {
        let (samples, _) = self.load(reader)?;
        let output = self.run(&samples)?;
        output.table.write_to(writer, &self.config.output)?;
        Ok(output)
    }

    #[must_use]
    pub fn diagnostics(&self, samples: &SampleSet, output: &PipelineOutput) -> FitDiagnostics {
        FitDiagnostics::new(samples, &output.model)
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum GenerateError {
    #[display("table generation failed")]
    #[from]
    Pipeline(#[error(source)] PipelineError),
    #[display("failed to write table")]
    #[from]
    Write(#[error(source)] std::io::Error),
}
