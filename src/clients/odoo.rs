//! JSON-RPC client for the Odoo ERP.
//!
//! Authentication goes through the `common` service; everything else is
//! `execute_kw` on the `object` service with the uid obtained at login.
//! Odoo encodes "empty" as `false` in record fields and many2one fields as
//! `[id, name]` pairs, so the typed wrappers carry custom deserializers.

use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::config::OdooConfig;

/// Model holding the custom inventory workflow on the Odoo side.
const INVENTORY_MODEL: &str = "custom.stock.inventory";

/// Flag on `res.users` gating access to this application.
const ACCESS_FLAG: &str = "can_access_opname_react";

#[derive(Debug, Error)]
pub enum OdooError {
    #[error("ERP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("ERP error: {message}")]
    Rpc { message: String },

    #[error("unexpected ERP response: {0}")]
    Protocol(String),
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: RpcParams<'a>,
    id: u32,
}

#[derive(Serialize)]
struct RpcParams<'a> {
    service: &'a str,
    method: &'a str,
    args: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// A many2one reference as Odoo serializes it: `[id, display_name]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErpRef {
    pub id: i64,
    pub name: String,
}

/// Odoo renders empty many2one fields as `false`.
fn erp_ref<'de, D>(deserializer: D) -> Result<Option<ErpRef>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Bool(false) | Value::Null => Ok(None),
        Value::Array(items) if items.len() == 2 => {
            let id = items[0]
                .as_i64()
                .ok_or_else(|| serde::de::Error::custom("many2one id is not an integer"))?;
            let name = items[1].as_str().unwrap_or_default().to_string();
            Ok(Some(ErpRef { id, name }))
        }
        other => Err(serde::de::Error::custom(format!(
            "unexpected many2one encoding: {other}"
        ))),
    }
}

/// Odoo renders empty char fields as `false`.
fn false_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Bool(false) | Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Err(serde::de::Error::custom(format!(
            "unexpected char encoding: {other}"
        ))),
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErpProduct {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "false_as_none")]
    pub default_code: Option<String>,
    #[serde(default, deserialize_with = "false_as_none")]
    pub barcode: Option<String>,
    #[serde(default)]
    pub list_price: f64,
    #[serde(default)]
    pub qty_available: f64,
    #[serde(default, deserialize_with = "erp_ref")]
    pub uom_id: Option<ErpRef>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErpWarehouse {
    pub id: i64,
    pub name: String,
    pub code: String,
    #[serde(default, deserialize_with = "erp_ref")]
    pub lot_stock_id: Option<ErpRef>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErpLocation {
    pub id: i64,
    pub display_name: String,
    #[serde(default, deserialize_with = "erp_ref")]
    pub stock_location_id: Option<ErpRef>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErpUser {
    pub id: i64,
    pub name: String,
    pub login: String,
}

#[derive(Debug, Clone)]
pub struct ErpUserInfo {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub can_access: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErpUom {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "erp_ref")]
    pub category_id: Option<ErpRef>,
    #[serde(default)]
    pub uom_type: String,
    #[serde(default)]
    pub factor: f64,
    #[serde(default)]
    pub factor_inv: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkInventoryResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub inventory_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lines_count: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

/// Creates authenticated [`OdooClient`] handles. The login path is behind
/// this struct so the session cache can be exercised with a scripted
/// stand-in instead of a live ERP.
#[derive(Clone)]
pub struct OdooGateway {
    config: OdooConfig,
    http: Client,
}

impl OdooGateway {
    pub fn new(config: OdooConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_seconds))
            .user_agent("Opname/1.0")
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build ERP HTTP client: {e}"))?;

        Ok(Self { config, http })
    }

    /// Authenticate against the ERP. `Ok(None)` means the ERP rejected the
    /// credentials (it answers `false` rather than erroring).
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<OdooClient>, OdooError> {
        let args = json!([self.config.database, email, password, {}]);
        let result = rpc_call(&self.http, &self.config.url, "common", "authenticate", args).await?;

        match result {
            Value::Bool(false) => Ok(None),
            Value::Number(n) => {
                let uid = n
                    .as_i64()
                    .ok_or_else(|| OdooError::Protocol("uid is not an integer".to_string()))?;
                debug!(uid, "ERP authentication succeeded");
                Ok(Some(OdooClient {
                    http: self.http.clone(),
                    config: self.config.clone(),
                    email: email.to_string(),
                    password: password.to_string(),
                    uid,
                }))
            }
            other => Err(OdooError::Protocol(format!(
                "unexpected authenticate result: {other}"
            ))),
        }
    }
}

/// An authenticated handle to the ERP for one user. Cheap to clone; the
/// session cache hands these out per request.
#[derive(Clone)]
pub struct OdooClient {
    http: Client,
    config: OdooConfig,
    email: String,
    password: String,
    uid: i64,
}

impl OdooClient {
    #[must_use]
    pub const fn uid(&self) -> i64 {
        self.uid
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[cfg(test)]
    pub(crate) fn stub(config: OdooConfig, email: &str, password: &str, uid: i64) -> Self {
        Self {
            http: Client::new(),
            config,
            email: email.to_string(),
            password: password.to_string(),
            uid,
        }
    }

    /// Generic `execute_kw` call.
    pub async fn execute(
        &self,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> Result<Value, OdooError> {
        let call_args = json!([
            self.config.database,
            self.uid,
            self.password,
            model,
            method,
            args,
            kwargs,
        ]);

        rpc_call(&self.http, &self.config.url, "object", "execute_kw", call_args).await
    }

    pub async fn search_read(
        &self,
        model: &str,
        domain: Value,
        fields: &[&str],
        limit: Option<u32>,
    ) -> Result<Value, OdooError> {
        let mut kwargs = json!({ "fields": fields });
        if let Some(limit) = limit {
            kwargs["limit"] = json!(limit);
        }

        self.execute(model, "search_read", json!([domain]), kwargs)
            .await
    }

    pub async fn product_by_barcode(&self, barcode: &str) -> Result<Option<ErpProduct>, OdooError> {
        let result = self
            .search_read(
                "product.template",
                json!([["barcode", "=", barcode]]),
                &[
                    "id",
                    "name",
                    "default_code",
                    "list_price",
                    "qty_available",
                    "barcode",
                    "uom_id",
                ],
                Some(1),
            )
            .await?;

        let mut products: Vec<ErpProduct> = parse(result)?;
        Ok(products.pop())
    }

    pub async fn warehouses(&self) -> Result<Vec<ErpWarehouse>, OdooError> {
        let result = self
            .search_read(
                "stock.warehouse",
                json!([]),
                &["id", "name", "code", "lot_stock_id"],
                None,
            )
            .await?;

        parse(result)
    }

    /// Warehouse owning a stock location; scan sessions store the location
    /// id, posting needs the warehouse code for the document name.
    pub async fn warehouse_by_stock_location(
        &self,
        stock_location_id: i64,
    ) -> Result<Option<ErpWarehouse>, OdooError> {
        let result = self
            .search_read(
                "stock.warehouse",
                json!([["lot_stock_id", "=", stock_location_id]]),
                &["id", "name", "code", "lot_stock_id"],
                Some(1),
            )
            .await?;

        let mut warehouses: Vec<ErpWarehouse> = parse(result)?;
        Ok(warehouses.pop())
    }

    pub async fn inventory_locations(&self) -> Result<Vec<ErpLocation>, OdooError> {
        let result = self
            .search_read(
                "inventory.product.locations",
                json!([]),
                &["id", "display_name", "stock_location_id"],
                None,
            )
            .await?;

        parse(result)
    }

    /// Profile of the authenticated user, including the application access
    /// flag used to gate registration.
    pub async fn current_user_info(&self) -> Result<Option<ErpUserInfo>, OdooError> {
        let result = self
            .search_read(
                "res.users",
                json!([["id", "=", self.uid]]),
                &["name", "email", "login", ACCESS_FLAG],
                Some(1),
            )
            .await?;

        let rows = result
            .as_array()
            .ok_or_else(|| OdooError::Protocol("search_read did not return a list".to_string()))?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let name = row["name"].as_str().unwrap_or_default().to_string();
        let email = row["email"]
            .as_str()
            .or_else(|| row["login"].as_str())
            .unwrap_or_default()
            .to_string();
        let can_access = row[ACCESS_FLAG].as_bool().unwrap_or(false);

        Ok(Some(ErpUserInfo {
            id: self.uid,
            name,
            email,
            can_access,
        }))
    }

    /// Users allowed into the application, offered as verifier candidates.
    pub async fn verifier_candidates(&self) -> Result<Vec<ErpUser>, OdooError> {
        let result = self
            .search_read(
                "res.users",
                json!([[ACCESS_FLAG, "=", true]]),
                &["id", "name", "login"],
                Some(100),
            )
            .await?;

        parse(result)
    }

    pub async fn uoms(&self) -> Result<Vec<ErpUom>, OdooError> {
        let result = self
            .search_read(
                "uom.uom",
                json!([]),
                &["id", "name", "category_id", "uom_type", "factor", "factor_inv"],
                None,
            )
            .await?;

        parse(result)
    }

    pub async fn verification_lines(
        &self,
        filter: &VerificationFilter,
    ) -> Result<Value, OdooError> {
        let kwargs = serde_json::to_value(filter)
            .map_err(|e| OdooError::Protocol(format!("filter serialization: {e}")))?;

        self.execute(INVENTORY_MODEL, "get_verification_lines", json!([]), kwargs)
            .await
    }

    pub async fn verification_line_detail(
        &self,
        line_id: i64,
    ) -> Result<Option<Value>, OdooError> {
        let result = self
            .execute(
                INVENTORY_MODEL,
                "get_verification_line_detail",
                json!([]),
                json!({ "line_id": line_id }),
            )
            .await?;

        match &result {
            Value::Bool(false) | Value::Null => Ok(None),
            Value::Object(map) if map.get("success") == Some(&Value::Bool(false)) => Ok(None),
            _ => Ok(Some(result)),
        }
    }

    pub async fn add_verification_qty(
        &self,
        line_id: i64,
        qty: f64,
        location_id: i64,
        verifier_id: i64,
        note: Option<&str>,
    ) -> Result<Value, OdooError> {
        let result = self
            .execute(
                INVENTORY_MODEL,
                "add_verification_qty",
                json!([]),
                json!({
                    "line_id": line_id,
                    "verification_qty": qty,
                    "inventory_product_location_id": location_id,
                    "verifier_id": verifier_id,
                    "note": note,
                }),
            )
            .await?;

        if result["success"] == Value::Bool(false) {
            let message = result["message"]
                .as_str()
                .unwrap_or("verification rejected")
                .to_string();
            return Err(OdooError::Rpc { message });
        }

        Ok(result)
    }

    /// Create the inventory header and all lines in one ERP transaction.
    pub async fn create_bulk_inventory(
        &self,
        payload: Value,
    ) -> Result<BulkInventoryResult, OdooError> {
        let result = self
            .execute(INVENTORY_MODEL, "create_bulk_inventory", json!([payload]), json!({}))
            .await?;

        let parsed: BulkInventoryResult = parse(result)?;
        if !parsed.success {
            return Err(OdooError::Rpc {
                message: parsed
                    .message
                    .unwrap_or_else(|| "bulk inventory creation failed".to_string()),
            });
        }

        Ok(parsed)
    }

    pub async fn inventories_by_ids(&self, ids: &[i64]) -> Result<Value, OdooError> {
        self.search_read(
            INVENTORY_MODEL,
            json!([["id", "in", ids]]),
            &["id", "name", "state", "date", "location_id", "approval_desc", "create_uid"],
            None,
        )
        .await
    }
}

async fn rpc_call(
    http: &Client,
    url: &str,
    service: &str,
    method: &str,
    args: Value,
) -> Result<Value, OdooError> {
    let request = RpcRequest {
        jsonrpc: "2.0",
        method: "call",
        params: RpcParams {
            service,
            method,
            args,
        },
        id: 1,
    };

    let endpoint = format!("{}/jsonrpc", url.trim_end_matches('/'));
    let response: RpcResponse = http
        .post(&endpoint)
        .json(&request)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    if let Some(error) = response.error {
        let detail = error
            .data
            .as_ref()
            .and_then(|d| d["message"].as_str())
            .unwrap_or(&error.message);
        return Err(OdooError::Rpc {
            message: detail.to_string(),
        });
    }

    response
        .result
        .ok_or_else(|| OdooError::Protocol("response carried neither result nor error".to_string()))
}

fn parse<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, OdooError> {
    serde_json::from_value(value).map_err(|e| OdooError::Protocol(e.to_string()))
}
