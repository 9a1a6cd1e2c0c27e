use anyhow::Result;
use clap::Parser;
use log::error;

use ops_toolkit::config::Config;
use ops_toolkit::{extractor, logging, CommonArgs};

/// Extracts user records from JSON exports into a CSV file.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
}

fn run(config: &Config) -> Result<()> {
    let summary = extractor::run(&config.extractor)?;
    println!(
        "{} row(s) written to {} from {} file(s), {} skipped, {} warning(s)",
        summary.rows_written,
        config.extractor.output_csv.display(),
        summary.files_seen,
        summary.files_skipped,
        summary.warnings.len()
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.common.config)?;
    logging::init(Some(&config.extractor.log_file))?;

    if let Err(e) = run(&config) {
        error!("Extraction failed: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
