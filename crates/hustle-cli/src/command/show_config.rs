use clap::Args;
use hustle_analysis::config::Preset;

use crate::util::Output;

#[derive(Debug, Clone, Args)]
pub(crate) struct ShowConfigArg {
    /// Preset to print (grouped, global, approx)
    #[arg(long, default_value = "grouped")]
    pub preset: Preset,
}

pub(crate) fn run(arg: &ShowConfigArg) -> anyhow::Result<()> {
    Output::stdout().write_json(&arg.preset.config())
}
