//! The four audit reports. Each one pages through its inventory, derives an
//! age category per resource and streams rows straight into its CSV.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{info, warn};
use std::fs::File;
use std::path::Path;

use super::category::{assess, UsageCategory};
use super::client::{InventoryClient, InventoryError};
use super::ResourceKind;
use crate::utils;

pub const FUNCTION_HEADER: [&str; 7] = [
    "FunctionName",
    "Runtime",
    "LastModified",
    "LastInvocation",
    "DaysSinceLastInvocation",
    "UsageCategory",
    "Notes",
];

pub const ROLE_HEADER: [&str; 8] = [
    "RoleName",
    "Arn",
    "CreateDate",
    "LastUsedDate",
    "LastUsedRegion",
    "DaysSinceLastUse",
    "UsageCategory",
    "Notes",
];

pub const NETWORK_INTERFACE_HEADER: [&str; 9] = [
    "NetworkInterfaceId",
    "Status",
    "InterfaceType",
    "Description",
    "AttachedInstance",
    "AttachTime",
    "DaysSinceAttach",
    "UsageCategory",
    "Notes",
];

pub const PRODUCT_HEADER: [&str; 8] = [
    "ProductId",
    "Name",
    "Owner",
    "ProductType",
    "CreatedTime",
    "DaysSinceCreated",
    "UsageCategory",
    "Notes",
];

fn timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

fn days(days: Option<i64>) -> String {
    days.map(|d| d.to_string()).unwrap_or_default()
}

fn finish(mut writer: csv::Writer<File>, kind: ResourceKind, rows: usize, path: &Path) -> Result<usize> {
    writer.flush()?;
    info!(
        "{} report: {} row(s) written to {}",
        kind,
        rows,
        path.display()
    );
    Ok(rows)
}

pub async fn audit_functions<C>(client: &C, path: &Path, now: DateTime<Utc>) -> Result<usize>
where
    C: InventoryClient + ?Sized,
{
    let mut writer = utils::create_csv(path, &FUNCTION_HEADER)?;
    let mut marker: Option<String> = None;
    let mut rows = 0;

    loop {
        let page = client
            .list_functions(marker.as_deref())
            .await
            .context("failed to list functions")?;

        for function in page.items {
            let log_group = format!("/aws/lambda/{}", function.name);
            let (last_event, notes) = match client.latest_log_event(&log_group).await {
                Ok(Some(ts)) => (Some(ts), ""),
                Ok(None) => (None, "No log events"),
                Err(InventoryError::NotFound(_)) => (None, "No log group found"),
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to read {}", log_group))
                }
            };
            let (elapsed, category) = assess(last_event, now);

            writer.write_record([
                function.name.as_str(),
                function.runtime.as_deref().unwrap_or(""),
                timestamp(function.last_modified).as_str(),
                timestamp(last_event).as_str(),
                days(elapsed).as_str(),
                category.label_for(ResourceKind::Function),
                notes,
            ])?;
            rows += 1;
        }

        match page.next {
            Some(next) => marker = Some(next),
            None => break,
        }
    }

    finish(writer, ResourceKind::Function, rows, path)
}

pub async fn audit_roles<C>(client: &C, path: &Path, now: DateTime<Utc>) -> Result<usize>
where
    C: InventoryClient + ?Sized,
{
    let mut writer = utils::create_csv(path, &ROLE_HEADER)?;
    let mut marker: Option<String> = None;
    let mut rows = 0;

    loop {
        let page = client
            .list_roles(marker.as_deref())
            .await
            .context("failed to list roles")?;

        for role in page.items {
            let used = client
                .role_last_used(&role.name)
                .await
                .with_context(|| format!("failed to read last use of role {}", role.name))?;
            let (elapsed, category) = assess(used.last_used, now);
            let notes = if category == UsageCategory::NoData {
                "Role has never been used"
            } else {
                ""
            };

            writer.write_record([
                role.name.as_str(),
                role.arn.as_str(),
                timestamp(role.create_date).as_str(),
                timestamp(used.last_used).as_str(),
                used.region.as_deref().unwrap_or(""),
                days(elapsed).as_str(),
                category.label_for(ResourceKind::Role),
                notes,
            ])?;
            rows += 1;
        }

        match page.next {
            Some(next) => marker = Some(next),
            None => break,
        }
    }

    finish(writer, ResourceKind::Role, rows, path)
}

pub async fn audit_network_interfaces<C>(
    client: &C,
    path: &Path,
    now: DateTime<Utc>,
) -> Result<usize>
where
    C: InventoryClient + ?Sized,
{
    let mut writer = utils::create_csv(path, &NETWORK_INTERFACE_HEADER)?;
    let mut token: Option<String> = None;
    let mut rows = 0;

    loop {
        let page = client
            .list_network_interfaces(token.as_deref())
            .await
            .context("failed to describe network interfaces")?;

        for eni in page.items {
            let (instance, attach_time, notes) = match &eni.attachment {
                None => (None, None, "Not attached"),
                Some(a) if a.attach_time.is_none() => {
                    (a.instance_id.as_deref(), None, "Attachment time unavailable")
                }
                Some(a) => (a.instance_id.as_deref(), a.attach_time, ""),
            };
            let (elapsed, category) = assess(attach_time, now);

            writer.write_record([
                eni.id.as_str(),
                eni.status.as_str(),
                eni.interface_type.as_deref().unwrap_or(""),
                eni.description.as_deref().unwrap_or(""),
                instance.unwrap_or(""),
                timestamp(attach_time).as_str(),
                days(elapsed).as_str(),
                category.label_for(ResourceKind::NetworkInterface),
                notes,
            ])?;
            rows += 1;
        }

        match page.next {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    finish(writer, ResourceKind::NetworkInterface, rows, path)
}

pub async fn audit_products<C>(client: &C, path: &Path, now: DateTime<Utc>) -> Result<usize>
where
    C: InventoryClient + ?Sized,
{
    let mut writer = utils::create_csv(path, &PRODUCT_HEADER)?;
    let mut token: Option<String> = None;
    let mut rows = 0;

    loop {
        let page = client
            .search_products(token.as_deref())
            .await
            .context("failed to search catalog products")?;

        for product in page.items {
            let (elapsed, category) = assess(product.created, now);
            let notes = if product.created.is_some() {
                "Age based on creation time"
            } else {
                warn!("Product {} has no creation time", product.id);
                "Creation time unavailable"
            };

            writer.write_record([
                product.id.as_str(),
                product.name.as_str(),
                product.owner.as_deref().unwrap_or(""),
                product.product_type.as_deref().unwrap_or(""),
                timestamp(product.created).as_str(),
                days(elapsed).as_str(),
                category.label_for(ResourceKind::CatalogProduct),
                notes,
            ])?;
            rows += 1;
        }

        match page.next {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    finish(writer, ResourceKind::CatalogProduct, rows, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auditor::client::{
        Attachment, FunctionSummary, NetworkInterfaceSummary, Page, ProductSummary,
        RoleLastUsed, RoleSummary,
    };
    use crate::auditor::mock::MockInventory;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect()
    }

    fn function(name: &str) -> FunctionSummary {
        FunctionSummary {
            name: name.to_string(),
            runtime: Some("nodejs20.x".to_string()),
            last_modified: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        }
    }

    #[tokio::test]
    async fn functions_follow_pages_and_annotate_missing_logs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("functions.csv");
        let mock = MockInventory::new()
            .with_function_pages(vec![
                Page {
                    items: vec![function("active"), function("silent")],
                    next: Some("m1".to_string()),
                },
                Page::last(vec![function("orphan")]),
            ])
            .with_log_event("/aws/lambda/active", Some(now() - Duration::days(10)))
            .with_log_event("/aws/lambda/silent", None);

        let rows = audit_functions(&mock, &path, now()).await.unwrap();
        assert_eq!(rows, 3);

        let rows = read_rows(&path);
        assert_eq!(rows[0][0], "active");
        assert_eq!(rows[0][2], "2024-01-01T00:00:00Z");
        assert_eq!(rows[0][4], "10");
        assert_eq!(rows[0][5], "0-3 months");
        assert_eq!(rows[1][5], "No data");
        assert_eq!(rows[1][6], "No log events");
        assert_eq!(rows[2][0], "orphan");
        assert_eq!(rows[2][3], "");
        assert_eq!(rows[2][6], "No log group found");
        assert_eq!(mock.markers_seen(), vec![None, Some("m1".to_string())]);
    }

    #[tokio::test]
    async fn function_log_failure_aborts_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("functions.csv");
        let mock = MockInventory::new()
            .with_function_pages(vec![Page::last(vec![function("broken")])])
            .with_log_failure("/aws/lambda/broken");

        assert!(audit_functions(&mock, &path, now()).await.is_err());
        // Header was written before the failure.
        assert!(path.exists());
    }

    #[tokio::test]
    async fn roles_never_used() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roles.csv");
        let mock = MockInventory::new()
            .with_role_pages(vec![Page::last(vec![
                RoleSummary {
                    name: "busy".into(),
                    arn: "arn:aws:iam::1:role/busy".into(),
                    create_date: Some(now() - Duration::days(900)),
                },
                RoleSummary {
                    name: "idle".into(),
                    arn: "arn:aws:iam::1:role/idle".into(),
                    create_date: Some(now() - Duration::days(400)),
                },
            ])])
            .with_role_usage(
                "busy",
                RoleLastUsed {
                    last_used: Some(now() - Duration::days(91)),
                    region: Some("us-west-2".into()),
                },
            );

        audit_roles(&mock, &path, now()).await.unwrap();
        let rows = read_rows(&path);
        assert_eq!(rows[0][4], "us-west-2");
        assert_eq!(rows[0][5], "91");
        assert_eq!(rows[0][6], "3-6 months");
        assert_eq!(rows[1][3], "");
        assert_eq!(rows[1][6], "Never used");
        assert_eq!(rows[1][7], "Role has never been used");
    }

    #[tokio::test]
    async fn network_interfaces_attached_and_detached() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("enis.csv");
        let mock = MockInventory::new().with_network_interface_pages(vec![Page::last(vec![
            NetworkInterfaceSummary {
                id: "eni-1".into(),
                status: "in-use".into(),
                interface_type: Some("interface".into()),
                description: None,
                attachment: Some(Attachment {
                    instance_id: Some("i-1".into()),
                    attach_time: Some(now() - Duration::days(800)),
                }),
            },
            NetworkInterfaceSummary {
                id: "eni-2".into(),
                status: "available".into(),
                ..Default::default()
            },
            NetworkInterfaceSummary {
                id: "eni-3".into(),
                status: "in-use".into(),
                attachment: Some(Attachment::default()),
                ..Default::default()
            },
        ])]);

        audit_network_interfaces(&mock, &path, now()).await.unwrap();
        let rows = read_rows(&path);
        assert_eq!(rows[0][4], "i-1");
        assert_eq!(rows[0][7], "Over 24 months");
        assert_eq!(rows[1][7], "No data");
        assert_eq!(rows[1][8], "Not attached");
        assert_eq!(rows[2][8], "Attachment time unavailable");
    }

    #[tokio::test]
    async fn products_use_creation_time() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("products.csv");
        let mock = MockInventory::new().with_product_pages(vec![
            Page {
                items: vec![ProductSummary {
                    id: "prod-1".into(),
                    name: "Network".into(),
                    created: Some(now() - Duration::days(200)),
                    ..Default::default()
                }],
                next: Some("t1".into()),
            },
            Page::last(vec![ProductSummary {
                id: "prod-2".into(),
                name: "Legacy".into(),
                ..Default::default()
            }]),
        ]);

        assert_eq!(audit_products(&mock, &path, now()).await.unwrap(), 2);
        let rows = read_rows(&path);
        assert_eq!(rows[0][5], "200");
        assert_eq!(rows[0][6], "6-12 months");
        assert_eq!(rows[0][7], "Age based on creation time");
        assert_eq!(rows[1][6], "No data");
        assert_eq!(rows[1][7], "Creation time unavailable");
    }
}
