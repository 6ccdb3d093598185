//! Wire and domain types shared across the client core.
//!
//! Field names mirror the backend's JSON (camelCase); the backend is the
//! single source of truth for every monetary total. `CartSummary` is always
//! replaced wholesale after a round-trip, never merged field-by-field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Order lifecycle status.
///
/// `Placed` and `Pending` are both initial states (older backend rows use
/// `PENDING`); the transition rules treat them identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Placed,
    Pending,
    Preparing,
    Dispatched,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// True once the order can no longer change status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Which dashboard bucket an order with this status belongs to.
    pub fn bucket(&self) -> Bucket {
        if self.is_terminal() {
            Bucket::Historical
        } else {
            Bucket::Active
        }
    }
}

/// Payment status, an axis independent of [`OrderStatus`].
///
/// `Processing` only occurs mid-flight for online payments; COD payments go
/// straight from `Pending` to `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    #[serde(alias = "CAPTURED")]
    Completed,
    Failed,
}

impl PaymentStatus {
    /// True once the payment can no longer change through the COD path.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    Cod,
    Online,
}

/// The two disjoint dashboard buckets. Every order is in exactly one,
/// derived from its `orderStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Active,
    Historical,
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

/// A single line in a vendor's cart for the current customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub item_id: i64,
    pub quantity: u32,
    pub unit_price: f64,
    pub item_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

/// Backend-computed cart aggregate for one (customer, vendor) pair.
///
/// `final_amount == subtotal + tax_amount + delivery_charges` is enforced by
/// the backend; the client displays these values and never recomputes them
/// for submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub cart_id: i64,
    pub customer_id: i64,
    pub vendor_id: i64,
    pub items: Vec<CartLine>,
    pub subtotal: f64,
    pub tax_amount: f64,
    pub delivery_charges: f64,
    pub final_amount: f64,
}

impl CartSummary {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Backend-confirmed quantity for an item, 0 if absent.
    pub fn quantity_of(&self, item_id: i64) -> u32 {
        self.items
            .iter()
            .find(|l| l.item_id == item_id)
            .map(|l| l.quantity)
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

/// Delivery details collected once per checkout attempt.
///
/// Never persisted client-side beyond the current checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryContext {
    pub pnr_number: String,
    pub train_number: String,
    pub coach_number: String,
    pub seat_number: String,
    pub delivery_station_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_instructions: Option<String>,
    pub payment_method: PaymentMethod,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// A line item inside a placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub item_id: i64,
    pub item_name: String,
    pub quantity: u32,
    pub unit_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

/// An order as returned by the backend.
///
/// Created server-side from a checkout submission; `order_status` and
/// `payment_status` then advance independently through admin/vendor actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: i64,
    pub customer_id: i64,
    pub vendor_id: i64,
    pub pnr_number: String,
    pub train_number: String,
    pub coach_number: String,
    pub seat_number: String,
    pub delivery_station_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_time: Option<DateTime<Utc>>,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    pub tax_amount: f64,
    pub delivery_charges: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<f64>,
    pub final_amount: f64,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    /// Gateway order handle, populated only when `payment_method` is ONLINE.
    #[serde(rename = "razorpayOrderID", skip_serializing_if = "Option::is_none")]
    pub razorpay_order_id: Option<String>,
}

impl Order {
    pub fn bucket(&self) -> Bucket {
        self.order_status.bucket()
    }
}

// ---------------------------------------------------------------------------
// Paged envelope
// ---------------------------------------------------------------------------

/// Offset/size pair echoed back by the backend inside a page envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pageable {
    pub offset: u64,
    pub page_size: u64,
}

/// Spring-style page envelope returned by the order listing endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEnvelope<T> {
    pub content: Vec<T>,
    pub pageable: Pageable,
    pub number_of_elements: u64,
    pub total_elements: u64,
    pub total_pages: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Dispatched).unwrap(),
            "\"DISPATCHED\""
        );
        let s: OrderStatus = serde_json::from_str("\"PLACED\"").unwrap();
        assert_eq!(s, OrderStatus::Placed);
        let p: PaymentStatus = serde_json::from_str("\"CAPTURED\"").unwrap();
        assert_eq!(p, PaymentStatus::Completed);
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Cod).unwrap(),
            "\"COD\""
        );
    }

    #[test]
    fn test_bucket_partition_is_total() {
        // Every status maps to exactly one bucket, and membership tracks
        // terminality.
        let all = [
            OrderStatus::Placed,
            OrderStatus::Pending,
            OrderStatus::Preparing,
            OrderStatus::Dispatched,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ];
        for status in all {
            match status.bucket() {
                Bucket::Active => assert!(!status.is_terminal()),
                Bucket::Historical => assert!(status.is_terminal()),
            }
        }
    }

    #[test]
    fn test_order_decodes_backend_shape() {
        let raw = serde_json::json!({
            "orderId": 501,
            "customerId": 9,
            "vendorId": 4,
            "pnrNumber": "8524179630",
            "trainNumber": "12951",
            "coachNumber": "B4",
            "seatNumber": "32",
            "deliveryStationId": "NDLS",
            "items": [
                {"itemId": 7, "itemName": "Veg Thali", "quantity": 2, "unitPrice": 50.0}
            ],
            "totalAmount": 100.0,
            "taxAmount": 5.0,
            "deliveryCharges": 10.0,
            "finalAmount": 115.0,
            "orderStatus": "DISPATCHED",
            "paymentStatus": "PENDING",
            "paymentMethod": "COD",
        });
        let order: Order = serde_json::from_value(raw).unwrap();
        assert_eq!(order.order_id, 501);
        assert_eq!(order.order_status, OrderStatus::Dispatched);
        assert_eq!(order.bucket(), Bucket::Active);
        assert!(order.razorpay_order_id.is_none());
        assert_eq!(order.items[0].quantity, 2);
    }

    #[test]
    fn test_razorpay_handle_field_name() {
        let raw = serde_json::json!({
            "orderId": 1, "customerId": 1, "vendorId": 1,
            "pnrNumber": "1234567890", "trainNumber": "1", "coachNumber": "A1",
            "seatNumber": "1", "deliveryStationId": "BCT",
            "items": [], "totalAmount": 0.0, "taxAmount": 0.0,
            "deliveryCharges": 0.0, "finalAmount": 0.0,
            "orderStatus": "PLACED", "paymentStatus": "PENDING",
            "paymentMethod": "ONLINE", "razorpayOrderID": "order_Nxy123",
        });
        let order: Order = serde_json::from_value(raw).unwrap();
        assert_eq!(order.razorpay_order_id.as_deref(), Some("order_Nxy123"));
    }

    #[test]
    fn test_cart_summary_quantity_lookup() {
        let summary = CartSummary {
            cart_id: 1,
            customer_id: 9,
            vendor_id: 4,
            items: vec![CartLine {
                item_id: 7,
                quantity: 2,
                unit_price: 50.0,
                item_name: "Veg Thali".into(),
                special_instructions: None,
            }],
            subtotal: 100.0,
            tax_amount: 5.0,
            delivery_charges: 10.0,
            final_amount: 115.0,
        };
        assert_eq!(summary.quantity_of(7), 2);
        assert_eq!(summary.quantity_of(8), 0);
        assert!(!summary.is_empty());
    }
}
