use anyhow::Result;
use chrono::Utc;
use clap::Parser;

use ops_toolkit::config::Config;
use ops_toolkit::{consolidator, logging, CommonArgs};

/// Concatenates the text files of a repository into a single document.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.common.config)?;
    logging::init(None)?;

    let summary = consolidator::consolidate(&config.consolidator, Utc::now())?;
    println!(
        "{} of {} file(s) written to {} ({} unreadable)",
        summary.included,
        summary.listed,
        summary.output.display(),
        summary.read_errors
    );
    Ok(())
}
