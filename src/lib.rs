pub mod auditor;
pub mod config;
pub mod consolidator;
pub mod extractor;
pub mod logging;
pub mod utils;

use std::path::PathBuf;

/// Flags shared by every binary. All of them are optional.
#[derive(Debug, clap::Args)]
pub struct CommonArgs {
    /// Path to the TOML configuration file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}
