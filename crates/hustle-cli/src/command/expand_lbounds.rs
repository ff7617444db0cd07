use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use hustle_analysis::lbounds::LowerBoundSamples;

use crate::util::{self, Output};

#[derive(Debug, Clone, Args)]
pub(crate) struct ExpandLboundsArg {
    /// Sampled `alen,lb` table
    pub input: PathBuf,

    /// Distance between sampled answer-list sizes
    pub step: usize,

    /// Where to write the expanded table (`-` for stdout)
    pub output: PathBuf,
}

pub(crate) fn run(arg: &ExpandLboundsArg) -> anyhow::Result<()> {
    let reader = util::open_input("lower-bound", &arg.input)?;
    let samples = LowerBoundSamples::load(reader)
        .with_context(|| format!("Failed to read lower bounds from {}", arg.input.display()))?;
    let table = samples
        .expand(Some(arg.step))
        .with_context(|| format!("Failed to expand lower bounds with step {}", arg.step))?;

    let mut writer = Output::from_output_path(&arg.output)?;
    table
        .write_to(&mut writer)
        .with_context(|| format!("Failed to write lower bounds to {}", writer.display_path()))?;

    if matches!(writer, Output::File { .. }) {
        println!(
            "Expanded lower bounds for sizes {}..={} written to {}",
            table.first_size(),
            table.last_size(),
            writer.display_path()
        );
    }
    Ok(())
}
