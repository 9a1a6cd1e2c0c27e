//! In-memory inventory for exercising the reports without a cloud account.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::client::{
    FunctionSummary, InventoryClient, InventoryError, InventoryResult, NetworkInterfaceSummary,
    Page, ProductSummary, RoleLastUsed, RoleSummary,
};

/// Serves pre-built pages. A continuation token resolves to the page after the
/// one that handed it out.
#[derive(Default)]
pub struct MockInventory {
    function_pages: Vec<Page<FunctionSummary>>,
    role_pages: Vec<Page<RoleSummary>>,
    network_interface_pages: Vec<Page<NetworkInterfaceSummary>>,
    product_pages: Vec<Page<ProductSummary>>,
    log_events: HashMap<String, Option<DateTime<Utc>>>,
    log_failures: HashSet<String>,
    role_usage: HashMap<String, RoleLastUsed>,
    markers: Mutex<Vec<Option<String>>>,
}

fn page_for<T: Clone>(
    pages: &[Page<T>],
    token: Option<&str>,
    service: &'static str,
) -> InventoryResult<Page<T>> {
    let index = match token {
        None => 0,
        Some(token) => pages
            .iter()
            .position(|p| p.next.as_deref() == Some(token))
            .map(|i| i + 1)
            .ok_or_else(|| InventoryError::Api {
                service,
                status: 400,
                code: "InvalidToken".to_string(),
                message: format!("unknown token {}", token),
            })?,
    };
    Ok(pages
        .get(index)
        .cloned()
        .unwrap_or_else(|| Page::last(Vec::new())))
}

impl MockInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_function_pages(mut self, pages: Vec<Page<FunctionSummary>>) -> Self {
        self.function_pages = pages;
        self
    }

    pub fn with_role_pages(mut self, pages: Vec<Page<RoleSummary>>) -> Self {
        self.role_pages = pages;
        self
    }

    pub fn with_network_interface_pages(mut self, pages: Vec<Page<NetworkInterfaceSummary>>) -> Self {
        self.network_interface_pages = pages;
        self
    }

    pub fn with_product_pages(mut self, pages: Vec<Page<ProductSummary>>) -> Self {
        self.product_pages = pages;
        self
    }

    /// Registers a log group. Groups never registered answer `NotFound`.
    pub fn with_log_event(mut self, log_group: &str, latest: Option<DateTime<Utc>>) -> Self {
        self.log_events.insert(log_group.to_string(), latest);
        self
    }

    pub fn with_log_failure(mut self, log_group: &str) -> Self {
        self.log_failures.insert(log_group.to_string());
        self
    }

    /// Roles without recorded usage report no last-used date.
    pub fn with_role_usage(mut self, role_name: &str, usage: RoleLastUsed) -> Self {
        self.role_usage.insert(role_name.to_string(), usage);
        self
    }

    /// Markers passed to `list_functions`, in call order.
    pub fn markers_seen(&self) -> Vec<Option<String>> {
        self.markers.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl InventoryClient for MockInventory {
    async fn list_functions(&self, marker: Option<&str>) -> InventoryResult<Page<FunctionSummary>> {
        if let Ok(mut markers) = self.markers.lock() {
            markers.push(marker.map(String::from));
        }
        page_for(&self.function_pages, marker, "lambda")
    }

    async fn latest_log_event(&self, log_group: &str) -> InventoryResult<Option<DateTime<Utc>>> {
        if self.log_failures.contains(log_group) {
            return Err(InventoryError::Api {
                service: "logs",
                status: 500,
                code: "ServiceUnavailableException".to_string(),
                message: "simulated failure".to_string(),
            });
        }
        self.log_events
            .get(log_group)
            .copied()
            .ok_or_else(|| InventoryError::NotFound(log_group.to_string()))
    }

    async fn list_roles(&self, marker: Option<&str>) -> InventoryResult<Page<RoleSummary>> {
        page_for(&self.role_pages, marker, "iam")
    }

    async fn role_last_used(&self, role_name: &str) -> InventoryResult<RoleLastUsed> {
        Ok(self.role_usage.get(role_name).cloned().unwrap_or_default())
    }

    async fn list_network_interfaces(
        &self,
        token: Option<&str>,
    ) -> InventoryResult<Page<NetworkInterfaceSummary>> {
        page_for(&self.network_interface_pages, token, "ec2")
    }

    async fn search_products(&self, token: Option<&str>) -> InventoryResult<Page<ProductSummary>> {
        page_for(&self.product_pages, token, "servicecatalog")
    }
}
