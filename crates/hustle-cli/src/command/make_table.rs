use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use hustle_analysis::{config::Preset, pipeline::Pipeline};

use crate::util::{self, Output};

#[derive(Debug, Clone, Args)]
pub(crate) struct MakeTableArg {
    /// Delimited search statistics to fit
    pub input: PathBuf,

    /// Where to write the table (`-` for stdout)
    pub output: PathBuf,

    /// Built-in configuration to use (grouped, global, approx)
    #[arg(long, default_value = "grouped")]
    pub preset: Preset,

    /// JSON pipeline configuration, replacing the preset
    #[arg(long, conflicts_with = "preset")]
    pub config: Option<PathBuf>,

    /// Largest context size in the table, replacing the configured one
    #[arg(long)]
    pub max_context_size: Option<usize>,

    /// Write per-observation residuals and fitted curves as JSON to this path
    #[arg(long)]
    pub diagnostics: Option<PathBuf>,
}

impl MakeTableArg {
    /// Rejects writing the table and the diagnostics JSON to the same stdout.
    pub(crate) fn check_outputs(&self) -> anyhow::Result<()> {
        let stdout = Path::new("-");
        if self.output == stdout && self.diagnostics.as_deref() == Some(stdout) {
            anyhow::bail!("table and diagnostics cannot both be written to stdout");
        }
        Ok(())
    }
}

pub(crate) fn run(arg: &MakeTableArg) -> anyhow::Result<()> {
    arg.check_outputs()?;
    let mut config = util::load_config(arg.preset, arg.config.as_deref())?;
    if let Some(max_context_size) = arg.max_context_size {
        config.max_context_size = max_context_size;
    }
    let pipeline = Pipeline::new(config).context("Invalid pipeline configuration")?;

    let reader = util::open_input("statistics", &arg.input)?;
    let (samples, load_report) = pipeline
        .load(reader)
        .with_context(|| format!("Failed to load samples from {}", arg.input.display()))?;
    let output = pipeline
        .run(&samples)
        .with_context(|| format!("Failed to fit samples from {}", arg.input.display()))?;

    let mut writer = Output::from_output_path(&arg.output)?;
    output
        .table
        .write_to(&mut writer, &pipeline.config().output)
        .with_context(|| format!("Failed to write table to {}", writer.display_path()))?;

    if let Some(path) = &arg.diagnostics {
        let diagnostics = pipeline.diagnostics(&samples, &output);
        Output::save_json(&diagnostics, path)?;
    }

    // keep stdout clean when the table itself goes there
    if matches!(writer, Output::File { .. }) {
        println!("Heuristic Table Summary");
        println!("=======================");
        println!(
            "Rows read: {}, admitted: {}, anchors: {}",
            load_report.rows_read,
            load_report.admitted(),
            load_report.anchors
        );
        println!(
            "Dropped: {} missing, {} non-finite, {} at or below threshold",
            load_report.missing, load_report.non_finite, load_report.below_threshold
        );
        if !output.model.group_curves.is_empty() {
            let groups = output
                .model
                .group_curves
                .keys()
                .map(ToString::to_string)
                .collect::<Vec<_>>();
            println!("Groups fitted: {}", groups.join(", "));
        }
        println!(
            "Table: {} rows (0..={}), {} overridden, {} filled with 0",
            output.table.len(),
            output.table.max_context_size(),
            output.table_report.overridden.len(),
            output.table_report.nan_filled.len()
        );
        println!("Written to {}", writer.display_path());
    }

    Ok(())
}
