//! Ordering backend API client.
//!
//! [`OrderingBackend`] is the transport seam the cart store, checkout
//! orchestrator, and order board talk through; [`HttpBackend`] implements it
//! over HTTP with bearer-token auth from the session context. Tests double
//! the trait in memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::info;

use crate::error::{backend_message, Error};
use crate::models::{
    CartSummary, DeliveryContext, Order, OrderItem, OrderStatus, PageEnvelope, PaymentStatus,
};
use crate::query::{OrderListQuery, OrderScope};
use crate::session::{Role, SessionContext};

/// Default timeout for API requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout used specifically for the lightweight connectivity probe.
const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the backend base URL:
/// - strip trailing slashes
/// - ensure a scheme is present (https, or http for localhost)
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> Error {
    if err.is_connect() {
        return Error::Network(format!("Cannot reach ordering backend at {url}"));
    }
    if err.is_timeout() {
        return Error::Network(format!("Connection to {url} timed out"));
    }
    if err.is_builder() {
        return Error::Network(format!("Invalid backend URL: {url}"));
    }
    Error::Network(format!("Network error communicating with {url}: {err}"))
}

// ---------------------------------------------------------------------------
// Request/response payloads
// ---------------------------------------------------------------------------

/// Delta-based cart mutation. `quantity` is *added* to whatever quantity the
/// backend already holds for this item, never an absolute override.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub item_id: i64,
    pub vendor_id: i64,
    pub quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

/// Order-creation payload built from the cart snapshot plus delivery input.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub vendor_id: i64,
    #[serde(flatten)]
    pub delivery: DeliveryContext,
    pub items: Vec<OrderItem>,
    /// Absolute timestamp, computed once at submission.
    pub delivery_time: DateTime<Utc>,
}

/// Signed identifiers handed back by the gateway overlay on success.
/// Field names follow the gateway's callback convention.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentProof {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

// ---------------------------------------------------------------------------
// Transport seam
// ---------------------------------------------------------------------------

/// REST operations the client core performs against the ordering backend.
///
/// Implementors handle transport, auth headers, and error mapping. All
/// methods are async and non-blocking.
#[async_trait]
pub trait OrderingBackend: Send + Sync {
    /// Fetch the cart summary for a vendor; `None` when no cart exists.
    async fn cart_summary(&self, vendor_id: i64) -> Result<Option<CartSummary>, Error>;

    /// Apply a signed quantity delta to a cart item.
    async fn add_cart_item(&self, req: &AddItemRequest) -> Result<(), Error>;

    /// Remove an item line entirely.
    async fn remove_cart_item(&self, item_id: i64, vendor_id: i64) -> Result<(), Error>;

    /// Drop the whole cart for a vendor.
    async fn clear_cart(&self, vendor_id: i64) -> Result<(), Error>;

    /// Create an order from a checkout submission. The returned order carries
    /// a gateway order handle when the payment method is ONLINE.
    async fn create_order(&self, req: &CreateOrderRequest) -> Result<Order, Error>;

    /// Verify a gateway payment callback server-side.
    async fn verify_payment(&self, order_id: i64, proof: &PaymentProof) -> Result<(), Error>;

    /// Admin-side order status update.
    async fn update_order_status_admin(
        &self,
        order_id: i64,
        status: OrderStatus,
        remarks: Option<&str>,
    ) -> Result<Order, Error>;

    /// Vendor-side order status update.
    async fn update_order_status_vendor(
        &self,
        order_id: i64,
        status: OrderStatus,
        remarks: Option<&str>,
        updated_by: i64,
    ) -> Result<Order, Error>;

    /// Admin-side COD payment status update.
    async fn update_cod_payment_admin(
        &self,
        order_id: i64,
        payment_status: PaymentStatus,
        remarks: Option<&str>,
    ) -> Result<Order, Error>;

    /// Vendor-side COD settlement (completion only).
    async fn complete_cod_payment_vendor(
        &self,
        order_id: i64,
        updated_by: i64,
        remarks: Option<&str>,
    ) -> Result<(), Error>;

    /// Paged order listing for the admin or vendor dashboard.
    async fn list_orders(
        &self,
        role: Role,
        query: &OrderListQuery,
    ) -> Result<PageEnvelope<Order>, Error>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// `OrderingBackend` over HTTP with bearer-token auth.
pub struct HttpBackend {
    client: Client,
    probe_client: Client,
    base_url: String,
    session: SessionContext,
}

impl HttpBackend {
    pub fn new(base_url: &str, session: SessionContext) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))?;
        let probe_client = Client::builder()
            .timeout(CONNECTIVITY_TIMEOUT)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            probe_client,
            base_url: normalize_base_url(base_url),
            session,
        })
    }

    /// Test connectivity to the backend with a lightweight health check.
    /// Returns the round-trip latency.
    pub async fn probe(&self) -> Result<Duration, Error> {
        let url = format!("{}/health", self.base_url);
        let start = Instant::now();
        let resp = self
            .probe_client
            .get(&url)
            .bearer_auth(&self.session.access_token)
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        let latency = start.elapsed();
        if resp.status().is_success() {
            info!(
                latency_ms = latency.as_millis() as u64,
                "connectivity probe passed"
            );
            Ok(latency)
        } else {
            Err(self.status_to_error(resp.status(), String::new()))
        }
    }

    fn status_to_error(&self, status: StatusCode, body: String) -> Error {
        let message = backend_message(
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            &body,
        );
        Error::Backend {
            status: status.as_u16(),
            message,
        }
    }

    /// Perform an authenticated request and return the JSON body
    /// (`Value::Null` for empty 204 responses).
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Value, Error> {
        let url = format!("{}{path}", self.base_url);
        let mut req = self
            .client
            .request(method, &url)
            .bearer_auth(&self.session.access_token)
            .header("Content-Type", "application/json");
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(b) = body {
            req = req.json(&b);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(self.status_to_error(status, text));
        }
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| Error::UnexpectedResponse(format!("invalid JSON from backend: {e}")))
    }

    fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, Error> {
        serde_json::from_value(value).map_err(|e| Error::UnexpectedResponse(e.to_string()))
    }
}

/// Wire name of a status enum, for query-string parameters.
fn wire_name<S: Serialize>(value: &S) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn scope_segment(scope: OrderScope) -> &'static str {
    match scope {
        OrderScope::Active => "active",
        OrderScope::Historical => "historical",
    }
}

#[async_trait]
impl OrderingBackend for HttpBackend {
    async fn cart_summary(&self, vendor_id: i64) -> Result<Option<CartSummary>, Error> {
        let value = self
            .request(
                Method::GET,
                "/cart/summary",
                &[("vendorId", vendor_id.to_string())],
                None,
            )
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        Self::decode(value).map(Some)
    }

    async fn add_cart_item(&self, req: &AddItemRequest) -> Result<(), Error> {
        let body =
            serde_json::to_value(req).map_err(|e| Error::UnexpectedResponse(e.to_string()))?;
        self.request(Method::POST, "/cart/add-item", &[], Some(body))
            .await?;
        Ok(())
    }

    async fn remove_cart_item(&self, item_id: i64, vendor_id: i64) -> Result<(), Error> {
        self.request(
            Method::DELETE,
            &format!("/cart/items/{item_id}"),
            &[("vendorId", vendor_id.to_string())],
            None,
        )
        .await?;
        Ok(())
    }

    async fn clear_cart(&self, vendor_id: i64) -> Result<(), Error> {
        self.request(
            Method::DELETE,
            "/cart",
            &[("vendorId", vendor_id.to_string())],
            None,
        )
        .await?;
        Ok(())
    }

    async fn create_order(&self, req: &CreateOrderRequest) -> Result<Order, Error> {
        let body =
            serde_json::to_value(req).map_err(|e| Error::UnexpectedResponse(e.to_string()))?;
        let value = self
            .request(Method::POST, "/orders", &[], Some(body))
            .await?;
        Self::decode(value)
    }

    async fn verify_payment(&self, order_id: i64, proof: &PaymentProof) -> Result<(), Error> {
        let body =
            serde_json::to_value(proof).map_err(|e| Error::UnexpectedResponse(e.to_string()))?;
        self.request(
            Method::POST,
            &format!("/payments/verify-payment/{order_id}"),
            &[],
            Some(body),
        )
        .await
        .map_err(|e| match e {
            // Verification rejections come back as backend errors; relabel so
            // the caller can distinguish them from ordinary mutation failures.
            Error::Backend { message, .. } => Error::PaymentVerification(message),
            other => other,
        })?;
        Ok(())
    }

    async fn update_order_status_admin(
        &self,
        order_id: i64,
        status: OrderStatus,
        remarks: Option<&str>,
    ) -> Result<Order, Error> {
        let body = serde_json::json!({
            "status": wire_name(&status),
            "remarks": remarks,
        });
        let value = self
            .request(
                Method::PUT,
                &format!("/admin/orders/{order_id}/status"),
                &[],
                Some(body),
            )
            .await?;
        Self::decode(value)
    }

    async fn update_order_status_vendor(
        &self,
        order_id: i64,
        status: OrderStatus,
        remarks: Option<&str>,
        updated_by: i64,
    ) -> Result<Order, Error> {
        let mut query = vec![
            ("status", wire_name(&status)),
            ("updatedById", updated_by.to_string()),
        ];
        if let Some(r) = remarks {
            query.push(("remarks", r.to_string()));
        }
        let value = self
            .request(
                Method::PUT,
                &format!("/orders/{order_id}/status"),
                &query,
                None,
            )
            .await?;
        Self::decode(value)
    }

    async fn update_cod_payment_admin(
        &self,
        order_id: i64,
        payment_status: PaymentStatus,
        remarks: Option<&str>,
    ) -> Result<Order, Error> {
        let body = serde_json::json!({
            "paymentStatus": wire_name(&payment_status),
            "remarks": remarks,
        });
        let value = self
            .request(
                Method::PUT,
                &format!("/admin/orders/{order_id}/cod-payment-status"),
                &[],
                Some(body),
            )
            .await?;
        Self::decode(value)
    }

    async fn complete_cod_payment_vendor(
        &self,
        order_id: i64,
        updated_by: i64,
        remarks: Option<&str>,
    ) -> Result<(), Error> {
        let mut query = vec![("updatedById", updated_by.to_string())];
        if let Some(r) = remarks {
            query.push(("remarks", r.to_string()));
        }
        self.request(
            Method::POST,
            &format!("/orders/{order_id}/cod/complete"),
            &query,
            None,
        )
        .await?;
        Ok(())
    }

    async fn list_orders(
        &self,
        role: Role,
        query: &OrderListQuery,
    ) -> Result<PageEnvelope<Order>, Error> {
        let path = match role {
            Role::Admin => format!("/admin/orders/{}", scope_segment(query.scope)),
            Role::Vendor => format!("/orders/vendor/{}", scope_segment(query.scope)),
            Role::Customer => {
                return Err(Error::RoleNotPermitted {
                    role: Role::Customer,
                    action: "list dashboard orders",
                })
            }
        };
        let value = self
            .request(Method::GET, &path, &query.query_pairs(), None)
            .await?;
        Self::decode(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://api.railmeal.app/"),
            "https://api.railmeal.app"
        );
        assert_eq!(
            normalize_base_url("api.railmeal.app"),
            "https://api.railmeal.app"
        );
        assert_eq!(
            normalize_base_url("localhost:8080///"),
            "http://localhost:8080"
        );
    }

    #[test]
    fn test_wire_names_for_query_params() {
        assert_eq!(wire_name(&OrderStatus::Dispatched), "DISPATCHED");
        assert_eq!(wire_name(&PaymentStatus::Completed), "COMPLETED");
    }

    #[test]
    fn test_add_item_request_shape() {
        let req = AddItemRequest {
            item_id: 7,
            vendor_id: 4,
            quantity: -1,
            special_instructions: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["itemId"], 7);
        assert_eq!(json["quantity"], -1);
        assert!(json.get("specialInstructions").is_none());
    }

    #[test]
    fn test_create_order_request_flattens_delivery_context() {
        let req = CreateOrderRequest {
            vendor_id: 4,
            delivery: DeliveryContext {
                pnr_number: "8524179630".into(),
                train_number: "12951".into(),
                coach_number: "B4".into(),
                seat_number: "32".into(),
                delivery_station_id: "NDLS".into(),
                delivery_instructions: None,
                payment_method: crate::models::PaymentMethod::Cod,
            },
            items: vec![],
            delivery_time: Utc::now(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["pnrNumber"], "8524179630");
        assert_eq!(json["paymentMethod"], "COD");
        assert_eq!(json["vendorId"], 4);
        assert!(json["deliveryTime"].is_string());
    }
}
