use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use self::{
    expand_lbounds::ExpandLboundsArg, make_table::MakeTableArg, show_config::ShowConfigArg,
};

mod expand_lbounds;
mod make_table;
mod show_config;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Log debug details (row filtering, group fits)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Fit search statistics and write a dense heuristic table
    MakeTable(#[clap(flatten)] MakeTableArg),
    /// Expand a sampled lower-bound table onto every answer-list size
    ExpandLbounds(#[clap(flatten)] ExpandLboundsArg),
    /// Print a preset configuration as JSON
    ShowConfig(#[clap(flatten)] ShowConfigArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    setup_logging(args.verbose)?;
    match args.mode {
        Mode::MakeTable(arg) => make_table::run(&arg)?,
        Mode::ExpandLbounds(arg) => expand_lbounds::run(&arg)?,
        Mode::ShowConfig(arg) => show_config::run(&arg)?,
    }
    Ok(())
}

fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
