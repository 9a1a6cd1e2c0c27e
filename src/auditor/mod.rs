//! Cloud resource age audit: four independent CSV reports.

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::info;
use std::fmt;
use std::path::PathBuf;

pub mod aws;
pub mod category;
pub mod client;
pub mod mock;
pub mod reports;
pub mod sigv4;

pub use aws::AwsInventory;
pub use category::{categorize, days_since, UsageCategory, THRESHOLDS};
pub use client::{InventoryClient, InventoryError, Page};

use crate::config::AuditorConfig;
use crate::utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Function,
    Role,
    NetworkInterface,
    CatalogProduct,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Function,
        ResourceKind::Role,
        ResourceKind::NetworkInterface,
        ResourceKind::CatalogProduct,
    ];

    pub fn report_file(self) -> &'static str {
        match self {
            ResourceKind::Function => "lambda_functions_audit.csv",
            ResourceKind::Role => "iam_roles_audit.csv",
            ResourceKind::NetworkInterface => "network_interfaces_audit.csv",
            ResourceKind::CatalogProduct => "service_catalog_products_audit.csv",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Function => "Lambda function",
            ResourceKind::Role => "IAM role",
            ResourceKind::NetworkInterface => "Network interface",
            ResourceKind::CatalogProduct => "Service Catalog product",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub kind: ResourceKind,
    pub path: PathBuf,
    pub rows: usize,
}

pub async fn run_report<C>(
    client: &C,
    kind: ResourceKind,
    cfg: &AuditorConfig,
    now: DateTime<Utc>,
) -> Result<ReportOutcome>
where
    C: InventoryClient + ?Sized,
{
    let path = cfg.output_dir.join(kind.report_file());
    info!("Auditing {}s", kind);
    let rows = match kind {
        ResourceKind::Function => reports::audit_functions(client, &path, now).await?,
        ResourceKind::Role => reports::audit_roles(client, &path, now).await?,
        ResourceKind::NetworkInterface => {
            reports::audit_network_interfaces(client, &path, now).await?
        }
        ResourceKind::CatalogProduct => reports::audit_products(client, &path, now).await?,
    };
    Ok(ReportOutcome { kind, path, rows })
}

/// Runs every report in order. The first failure stops the run.
pub async fn run_all<C>(
    client: &C,
    cfg: &AuditorConfig,
    now: DateTime<Utc>,
) -> Result<Vec<ReportOutcome>>
where
    C: InventoryClient + ?Sized,
{
    utils::ensure_directory(&cfg.output_dir)?;
    let mut outcomes = Vec::with_capacity(ResourceKind::ALL.len());
    for kind in ResourceKind::ALL {
        outcomes.push(run_report(client, kind, cfg, now).await?);
    }
    Ok(outcomes)
}
