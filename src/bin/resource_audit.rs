use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use log::info;

use ops_toolkit::auditor::{self, AwsInventory};
use ops_toolkit::config::Config;
use ops_toolkit::{logging, CommonArgs};

/// Writes age and last-use audit reports for Lambda functions, IAM roles,
/// network interfaces and Service Catalog products.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.common.config)?;
    logging::init(None)?;

    let client = AwsInventory::new(&config.auditor).context("failed to set up AWS client")?;
    info!("Auditing region {}", config.auditor.resolved_region());

    let outcomes = auditor::run_all(&client, &config.auditor, Utc::now()).await?;
    for outcome in outcomes {
        println!(
            "{}: {} row(s) -> {}",
            outcome.kind,
            outcome.rows,
            outcome.path.display()
        );
    }
    Ok(())
}
