use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{service} returned {status} {code}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        code: String,
        message: String,
    },
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("failed to decode {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
    #[error("missing AWS credentials: {0}")]
    Credentials(String),
    #[error("failed to sign request: {0}")]
    Signing(String),
}

pub type InventoryResult<T> = Result<T, InventoryError>;

/// One page of a listing plus the continuation token, if any.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionSummary {
    pub name: String,
    pub runtime: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleSummary {
    pub name: String,
    pub arn: String,
    pub create_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleLastUsed {
    pub last_used: Option<DateTime<Utc>>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attachment {
    pub instance_id: Option<String>,
    pub attach_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkInterfaceSummary {
    pub id: String,
    pub status: String,
    pub interface_type: Option<String>,
    pub description: Option<String>,
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub owner: Option<String>,
    pub product_type: Option<String>,
    pub created: Option<DateTime<Utc>>,
}

/// Read-only view of the cloud inventory the audit reports walk.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    async fn list_functions(&self, marker: Option<&str>) -> InventoryResult<Page<FunctionSummary>>;

    /// Timestamp of the most recent event across the group's streams.
    ///
    /// Returns `InventoryError::NotFound` when the group does not exist.
    async fn latest_log_event(&self, log_group: &str) -> InventoryResult<Option<DateTime<Utc>>>;

    async fn list_roles(&self, marker: Option<&str>) -> InventoryResult<Page<RoleSummary>>;

    async fn role_last_used(&self, role_name: &str) -> InventoryResult<RoleLastUsed>;

    async fn list_network_interfaces(
        &self,
        token: Option<&str>,
    ) -> InventoryResult<Page<NetworkInterfaceSummary>>;

    async fn search_products(&self, token: Option<&str>) -> InventoryResult<Page<ProductSummary>>;
}
