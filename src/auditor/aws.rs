//! `InventoryClient` backed by the public AWS APIs.
//!
//! Lambda and CloudWatch Logs speak JSON, IAM and EC2 speak the query
//! protocol with XML responses, Service Catalog speaks JSON 1.1. Every call
//! is signed with SigV4 using credentials from the environment.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde_json::json;

use super::client::{
    Attachment, FunctionSummary, InventoryClient, InventoryError, InventoryResult,
    NetworkInterfaceSummary, Page, ProductSummary, RoleLastUsed, RoleSummary,
};
use super::sigv4::{self, Credentials, SignableRequest};
use crate::config::AuditorConfig;

const IAM_VERSION: &str = "2010-05-08";
const EC2_VERSION: &str = "2016-11-15";
const LOGS_TARGET_PREFIX: &str = "Logs_20140328";
const CATALOG_TARGET_PREFIX: &str = "AWS242ServiceCatalogService";
const JSON_11: &str = "application/x-amz-json-1.1";
/// Service Catalog rejects larger pages.
const CATALOG_MAX_PAGE: u32 = 20;

pub struct AwsInventory {
    http: Client,
    credentials: Credentials,
    region: String,
    page_size: u32,
    endpoint_override: Option<String>,
}

struct Call<'a> {
    service: &'static str,
    /// Endpoint prefix, e.g. `lambda` in `lambda.us-east-1.amazonaws.com`.
    prefix: &'static str,
    global: bool,
    method: Method,
    path: &'a str,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl AwsInventory {
    pub fn new(cfg: &AuditorConfig) -> InventoryResult<Self> {
        Ok(Self::with_credentials(cfg, Credentials::from_env()?))
    }

    pub fn with_credentials(cfg: &AuditorConfig, credentials: Credentials) -> Self {
        Self {
            http: Client::new(),
            credentials,
            region: cfg.resolved_region(),
            page_size: cfg.page_size.max(1),
            endpoint_override: cfg.endpoint_override.clone(),
        }
    }

    fn base_url(&self, prefix: &str, global: bool) -> InventoryResult<Url> {
        let raw = match &self.endpoint_override {
            Some(endpoint) => endpoint.clone(),
            None if global => format!("https://{}.amazonaws.com", prefix),
            None => format!("https://{}.{}.amazonaws.com", prefix, self.region),
        };
        Url::parse(&raw).map_err(|e| InventoryError::Decode {
            service: "endpoint",
            message: format!("invalid endpoint '{}': {}", raw, e),
        })
    }

    async fn send(&self, call: Call<'_>) -> InventoryResult<String> {
        let mut url = self.base_url(call.prefix, call.global)?;
        url.set_path(call.path);
        let query = sigv4::canonical_query_string(&call.query);
        url.set_query(if query.is_empty() {
            None
        } else {
            Some(query.as_str())
        });

        let host = match (url.host_str(), url.port()) {
            (Some(h), Some(p)) => format!("{}:{}", h, p),
            (Some(h), None) => h.to_string(),
            (None, _) => {
                return Err(InventoryError::Decode {
                    service: call.service,
                    message: format!("endpoint {} has no host", url),
                })
            }
        };
        // Global services still sign against us-east-1.
        let signing_region = if call.global && self.endpoint_override.is_none() {
            "us-east-1"
        } else {
            self.region.as_str()
        };

        let signable = SignableRequest {
            method: call.method.as_str(),
            host: &host,
            path: call.path,
            query: &call.query,
            headers: &call.headers,
            body: &call.body,
        };
        let signed = sigv4::sign(
            &self.credentials,
            signing_region,
            call.prefix,
            &signable,
            Utc::now(),
        )?;

        debug!("{} {} {}", call.service, call.method, url);
        let mut request = self.http.request(call.method.clone(), url);
        for (name, value) in call.headers.iter().chain(signed.iter()) {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.body(call.body).send().await?;
        let status = response.status();
        let error_type = response
            .headers()
            .get("x-amzn-errortype")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(':').next().unwrap_or(v).to_string());
        let text = response.text().await?;

        if status.is_success() {
            return Ok(text);
        }
        let (code, message) = parse_error_body(&text, error_type);
        if code.ends_with("ResourceNotFoundException") || code == "NoSuchEntity" {
            return Err(InventoryError::NotFound(message));
        }
        Err(InventoryError::Api {
            service: call.service,
            status: status.as_u16(),
            code,
            message,
        })
    }

    async fn json_11(
        &self,
        service: &'static str,
        prefix: &'static str,
        target: String,
        body: serde_json::Value,
    ) -> InventoryResult<String> {
        self.send(Call {
            service,
            prefix,
            global: false,
            method: Method::POST,
            path: "/",
            query: Vec::new(),
            headers: vec![
                ("content-type".to_string(), JSON_11.to_string()),
                ("x-amz-target".to_string(), target),
            ],
            body: body.to_string().into_bytes(),
        })
        .await
    }

    async fn query_api(
        &self,
        service: &'static str,
        prefix: &'static str,
        global: bool,
        params: Vec<(String, String)>,
    ) -> InventoryResult<String> {
        self.send(Call {
            service,
            prefix,
            global,
            method: Method::GET,
            path: "/",
            query: params,
            headers: Vec::new(),
            body: Vec::new(),
        })
        .await
    }
}

#[async_trait]
impl InventoryClient for AwsInventory {
    async fn list_functions(&self, marker: Option<&str>) -> InventoryResult<Page<FunctionSummary>> {
        let mut query = vec![("MaxItems".to_string(), self.page_size.to_string())];
        if let Some(marker) = marker {
            query.push(("Marker".to_string(), marker.to_string()));
        }
        let body = self
            .send(Call {
                service: "lambda",
                prefix: "lambda",
                global: false,
                method: Method::GET,
                path: "/2015-03-31/functions/",
                query,
                headers: Vec::new(),
                body: Vec::new(),
            })
            .await?;
        decode_functions(&body)
    }

    async fn latest_log_event(&self, log_group: &str) -> InventoryResult<Option<DateTime<Utc>>> {
        let body = self
            .json_11(
                "logs",
                "logs",
                format!("{}.DescribeLogStreams", LOGS_TARGET_PREFIX),
                json!({
                    "logGroupName": log_group,
                    "orderBy": "LastEventTime",
                    "descending": true,
                    "limit": 1
                }),
            )
            .await?;
        decode_latest_event(&body)
    }

    async fn list_roles(&self, marker: Option<&str>) -> InventoryResult<Page<RoleSummary>> {
        let mut params = vec![
            ("Action".to_string(), "ListRoles".to_string()),
            ("Version".to_string(), IAM_VERSION.to_string()),
            ("MaxItems".to_string(), self.page_size.to_string()),
        ];
        if let Some(marker) = marker {
            params.push(("Marker".to_string(), marker.to_string()));
        }
        let body = self.query_api("iam", "iam", true, params).await?;
        decode_roles(&body)
    }

    async fn role_last_used(&self, role_name: &str) -> InventoryResult<RoleLastUsed> {
        let params = vec![
            ("Action".to_string(), "GetRole".to_string()),
            ("Version".to_string(), IAM_VERSION.to_string()),
            ("RoleName".to_string(), role_name.to_string()),
        ];
        let body = self.query_api("iam", "iam", true, params).await?;
        decode_role_last_used(&body)
    }

    async fn list_network_interfaces(
        &self,
        token: Option<&str>,
    ) -> InventoryResult<Page<NetworkInterfaceSummary>> {
        let mut params = vec![
            ("Action".to_string(), "DescribeNetworkInterfaces".to_string()),
            ("Version".to_string(), EC2_VERSION.to_string()),
            ("MaxResults".to_string(), self.page_size.max(5).to_string()),
        ];
        if let Some(token) = token {
            params.push(("NextToken".to_string(), token.to_string()));
        }
        let body = self.query_api("ec2", "ec2", false, params).await?;
        decode_network_interfaces(&body)
    }

    async fn search_products(&self, token: Option<&str>) -> InventoryResult<Page<ProductSummary>> {
        let mut request = json!({ "PageSize": self.page_size.min(CATALOG_MAX_PAGE) });
        if let Some(token) = token {
            request["PageToken"] = json!(token);
        }
        let body = self
            .json_11(
                "servicecatalog",
                "servicecatalog",
                format!("{}.SearchProductsAsAdmin", CATALOG_TARGET_PREFIX),
                request,
            )
            .await?;
        decode_products(&body)
    }
}

/// Pulls an error code and message out of a JSON or XML error body.
fn parse_error_body(body: &str, header_code: Option<String>) -> (String, String) {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let code = value
            .get("__type")
            .or_else(|| value.get("Type"))
            .and_then(|v| v.as_str())
            .map(|t| t.rsplit('#').next().unwrap_or(t).to_string());
        let message = value
            .get("message")
            .or_else(|| value.get("Message"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        return (header_code.or(code).unwrap_or_else(|| "Unknown".to_string()), message);
    }

    let code = xml_text(body, "Code");
    let message = xml_text(body, "Message").unwrap_or_else(|| body.trim().to_string());
    (
        header_code.or(code).unwrap_or_else(|| "Unknown".to_string()),
        message,
    )
}

fn xml_text(body: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(body[start..end].to_string())
}

fn decode_json<'a, T: Deserialize<'a>>(service: &'static str, body: &'a str) -> InventoryResult<T> {
    serde_json::from_str(body).map_err(|e| InventoryError::Decode {
        service,
        message: e.to_string(),
    })
}

fn decode_xml<'a, T: Deserialize<'a>>(service: &'static str, body: &'a str) -> InventoryResult<T> {
    quick_xml::de::from_str(body).map_err(|e| InventoryError::Decode {
        service,
        message: e.to_string(),
    })
}

fn parse_rfc3339(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|v| DateTime::parse_from_rfc3339(v.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Lambda writes `LastModified` as `2024-01-01T00:00:00.000+0000`, which is
/// not RFC3339 (no colon in the offset).
fn parse_lambda_time(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|v| DateTime::parse_from_str(v.trim(), "%Y-%m-%dT%H:%M:%S%.f%z").ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LambdaList {
    #[serde(default)]
    functions: Vec<LambdaFunction>,
    next_marker: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LambdaFunction {
    function_name: String,
    runtime: Option<String>,
    last_modified: Option<String>,
}

fn decode_functions(body: &str) -> InventoryResult<Page<FunctionSummary>> {
    let list: LambdaList = decode_json("lambda", body)?;
    Ok(Page {
        items: list
            .functions
            .into_iter()
            .map(|f| FunctionSummary {
                name: f.function_name,
                runtime: f.runtime,
                last_modified: parse_lambda_time(f.last_modified),
            })
            .collect(),
        next: non_empty(list.next_marker),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogStreams {
    #[serde(default)]
    log_streams: Vec<LogStream>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogStream {
    last_event_timestamp: Option<i64>,
}

fn decode_latest_event(body: &str) -> InventoryResult<Option<DateTime<Utc>>> {
    let streams: LogStreams = decode_json("logs", body)?;
    Ok(streams
        .log_streams
        .into_iter()
        .filter_map(|s| s.last_event_timestamp)
        .max()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single()))
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListRolesResponse {
    list_roles_result: ListRolesResult,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListRolesResult {
    #[serde(default)]
    is_truncated: bool,
    marker: Option<String>,
    #[serde(default)]
    roles: Members<XmlRole>,
}

#[derive(Deserialize)]
struct Members<T> {
    #[serde(rename = "member", default = "Vec::new")]
    member: Vec<T>,
}

impl<T> Default for Members<T> {
    fn default() -> Self {
        Self { member: Vec::new() }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct XmlRole {
    role_name: String,
    #[serde(default)]
    arn: String,
    create_date: Option<String>,
    role_last_used: Option<XmlRoleLastUsed>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct XmlRoleLastUsed {
    last_used_date: Option<String>,
    region: Option<String>,
}

fn decode_roles(body: &str) -> InventoryResult<Page<RoleSummary>> {
    let response: ListRolesResponse = decode_xml("iam", body)?;
    let result = response.list_roles_result;
    Ok(Page {
        items: result
            .roles
            .member
            .into_iter()
            .map(|r| RoleSummary {
                name: r.role_name,
                arn: r.arn,
                create_date: parse_rfc3339(r.create_date),
            })
            .collect(),
        next: if result.is_truncated {
            non_empty(result.marker)
        } else {
            None
        },
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetRoleResponse {
    get_role_result: GetRoleResult,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetRoleResult {
    role: XmlRole,
}

fn decode_role_last_used(body: &str) -> InventoryResult<RoleLastUsed> {
    let response: GetRoleResponse = decode_xml("iam", body)?;
    Ok(match response.get_role_result.role.role_last_used {
        Some(used) => RoleLastUsed {
            last_used: parse_rfc3339(used.last_used_date),
            region: non_empty(used.region),
        },
        None => RoleLastUsed::default(),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeNetworkInterfacesResponse {
    #[serde(default)]
    network_interface_set: Items<XmlNetworkInterface>,
    next_token: Option<String>,
}

#[derive(Deserialize)]
struct Items<T> {
    #[serde(rename = "item", default = "Vec::new")]
    item: Vec<T>,
}

impl<T> Default for Items<T> {
    fn default() -> Self {
        Self { item: Vec::new() }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct XmlNetworkInterface {
    network_interface_id: String,
    #[serde(default)]
    status: String,
    interface_type: Option<String>,
    description: Option<String>,
    attachment: Option<XmlAttachment>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct XmlAttachment {
    instance_id: Option<String>,
    attach_time: Option<String>,
}

fn decode_network_interfaces(body: &str) -> InventoryResult<Page<NetworkInterfaceSummary>> {
    let response: DescribeNetworkInterfacesResponse = decode_xml("ec2", body)?;
    Ok(Page {
        items: response
            .network_interface_set
            .item
            .into_iter()
            .map(|n| NetworkInterfaceSummary {
                id: n.network_interface_id,
                status: n.status,
                interface_type: non_empty(n.interface_type),
                description: non_empty(n.description),
                attachment: n.attachment.map(|a| Attachment {
                    instance_id: non_empty(a.instance_id),
                    attach_time: parse_rfc3339(a.attach_time),
                }),
            })
            .collect(),
        next: non_empty(response.next_token),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SearchProductsResponse {
    #[serde(default)]
    product_view_details: Vec<ProductViewDetail>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProductViewDetail {
    product_view_summary: ProductViewSummary,
    /// Epoch seconds, possibly fractional.
    created_time: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProductViewSummary {
    product_id: String,
    #[serde(default)]
    name: String,
    owner: Option<String>,
    #[serde(rename = "Type")]
    product_type: Option<String>,
}

fn epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    let whole = secs.trunc() as i64;
    let nanos = ((secs - secs.trunc()) * 1e9).round() as u32;
    Utc.timestamp_opt(whole, nanos.min(999_999_999)).single()
}

fn decode_products(body: &str) -> InventoryResult<Page<ProductSummary>> {
    let response: SearchProductsResponse = decode_json("servicecatalog", body)?;
    Ok(Page {
        items: response
            .product_view_details
            .into_iter()
            .map(|d| ProductSummary {
                id: d.product_view_summary.product_id,
                name: d.product_view_summary.name,
                owner: d.product_view_summary.owner,
                product_type: d.product_view_summary.product_type,
                created: d.created_time.and_then(epoch_seconds),
            })
            .collect(),
        next: non_empty(response.next_page_token),
    })
}
