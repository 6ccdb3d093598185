//! Checkout orchestration: cart snapshot to placed order.
//!
//! Validates the delivery context field by field, refuses empty carts,
//! submits the order, and runs one of two payment completion protocols:
//! COD finishes on the create call, ONLINE opens the gateway overlay and
//! verifies its signed callback server-side. Submission and verification are
//! never auto-retried — a replayed delta or a reused gateway callback must
//! not be applied twice. Only the *initial cart load* retries, with bounded
//! exponential backoff, to ride out eventual-consistency lag between an
//! add-to-cart call and the summary read.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::{CreateOrderRequest, OrderingBackend, PaymentProof};
use crate::cart::CartStore;
use crate::error::{Error, FieldError};
use crate::models::{CartSummary, DeliveryContext, Order, OrderItem, PaymentMethod};
use crate::session::SessionContext;

/// Backoff schedule for the initial cart load (3 retries after the first
/// attempt).
const INITIAL_LOAD_BACKOFF: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// Fallback when the vendor's preparation time is unknown.
pub const DEFAULT_PREPARATION_MINUTES: i64 = 30;

// ---------------------------------------------------------------------------
// Payment gateway seam
// ---------------------------------------------------------------------------

/// Outcome of the gateway overlay for one checkout attempt.
#[derive(Debug, Clone)]
pub enum GatewaySignal {
    /// The customer paid; carries the gateway's signed identifiers.
    Success(PaymentProof),
    /// The customer dismissed the overlay. Terminal for this attempt; a new
    /// checkout starts a fresh flow rather than resuming a stale handle.
    Cancelled,
    /// The gateway declined or errored.
    Failed(String),
}

/// Browser/overlay side of the online payment flow. Invoked only from the
/// orchestrator's ONLINE branch.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn collect(&self, order: &Order) -> GatewaySignal;
}

/// How a checkout attempt ended without error.
#[derive(Debug)]
pub enum CheckoutOutcome {
    /// Order placed and (for ONLINE) payment verified; cart cleared.
    Confirmed(Order),
    /// The customer cancelled the gateway overlay. The order stays in its
    /// backend-assigned pending-payment state and the cart is left intact.
    PaymentCancelled(Order),
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check every delivery-context field, reporting one error per invalid
/// field rather than stopping at the first.
///
/// The payment method needs no check here: [`PaymentMethod`] already
/// restricts it to COD or ONLINE at the type level.
pub fn validate_delivery_context(ctx: &DeliveryContext) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let pnr = ctx.pnr_number.trim();
    if pnr.len() != 10 || !pnr.chars().all(|c| c.is_ascii_digit()) {
        errors.push(FieldError {
            field: "pnrNumber",
            message: "must be exactly 10 digits".into(),
        });
    }

    let train = ctx.train_number.trim();
    if train.is_empty() || !train.chars().all(|c| c.is_ascii_digit()) {
        errors.push(FieldError {
            field: "trainNumber",
            message: "must be a non-empty numeric string".into(),
        });
    }

    if ctx.coach_number.trim().is_empty() {
        errors.push(FieldError {
            field: "coachNumber",
            message: "is required".into(),
        });
    }
    if ctx.seat_number.trim().is_empty() {
        errors.push(FieldError {
            field: "seatNumber",
            message: "is required".into(),
        });
    }
    if ctx.delivery_station_id.trim().is_empty() {
        errors.push(FieldError {
            field: "deliveryStationId",
            message: "is required".into(),
        });
    }

    errors
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct CheckoutOrchestrator {
    session: SessionContext,
    backend: Arc<dyn OrderingBackend>,
    gateway: Arc<dyn PaymentGateway>,
}

impl CheckoutOrchestrator {
    pub fn new(
        session: SessionContext,
        backend: Arc<dyn OrderingBackend>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            session,
            backend,
            gateway,
        }
    }

    /// Load the cart when entering checkout.
    ///
    /// An unexpectedly empty (or unreadable) cart right after navigation is
    /// retried up to 3 times with 1 s / 2 s / 4 s backoff before being
    /// believed. The delay is cancellable: when the initiating view is torn
    /// down, `cancel` stops the retry instead of letting it mutate state for
    /// an abandoned flow.
    pub async fn load_cart_with_retry(
        &self,
        cart: &CartStore,
        vendor_id: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<CartSummary>, Error> {
        let mut last: Result<Option<CartSummary>, Error> = Ok(None);
        for attempt in 0..=INITIAL_LOAD_BACKOFF.len() {
            if attempt > 0 {
                let delay = INITIAL_LOAD_BACKOFF[attempt - 1];
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            match cart.fetch_cart(vendor_id).await {
                Ok(Some(summary)) if !summary.is_empty() => return Ok(Some(summary)),
                other => {
                    info!(vendor_id, attempt, "cart not ready yet");
                    last = other;
                }
            }
        }
        last
    }

    /// Place an order from a cart snapshot.
    ///
    /// `preparation_minutes` is the vendor's preparation time when known;
    /// the delivery time is computed once here and sent as an absolute
    /// timestamp, never recomputed after submission.
    pub async fn place_order(
        &self,
        cart: &CartStore,
        delivery: DeliveryContext,
        snapshot: &CartSummary,
        preparation_minutes: Option<i64>,
    ) -> Result<CheckoutOutcome, Error> {
        let field_errors = validate_delivery_context(&delivery);
        if !field_errors.is_empty() {
            return Err(Error::Validation(field_errors));
        }
        if snapshot.is_empty() {
            return Err(Error::EmptyCart);
        }

        let attempt_id = Uuid::new_v4();
        let vendor_id = snapshot.vendor_id;
        let payment_method = delivery.payment_method;
        let delivery_time = Utc::now()
            + chrono::Duration::minutes(
                preparation_minutes.unwrap_or(DEFAULT_PREPARATION_MINUTES),
            );

        let request = CreateOrderRequest {
            vendor_id,
            delivery,
            items: snapshot
                .items
                .iter()
                .map(|line| OrderItem {
                    item_id: line.item_id,
                    item_name: line.item_name.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    special_instructions: line.special_instructions.clone(),
                })
                .collect(),
            delivery_time,
        };

        let order = self.backend.create_order(&request).await?;
        info!(
            %attempt_id,
            order_id = order.order_id,
            customer_id = self.session.user_id,
            vendor_id,
            ?payment_method,
            "order created"
        );

        match payment_method {
            PaymentMethod::Cod => {
                self.clear_cart_after_success(cart, vendor_id).await;
                Ok(CheckoutOutcome::Confirmed(order))
            }
            PaymentMethod::Online => self.complete_online_payment(cart, order).await,
        }
    }

    async fn complete_online_payment(
        &self,
        cart: &CartStore,
        order: Order,
    ) -> Result<CheckoutOutcome, Error> {
        if order.razorpay_order_id.is_none() {
            return Err(Error::UnexpectedResponse(
                "online order is missing its gateway order handle".into(),
            ));
        }

        match self.gateway.collect(&order).await {
            GatewaySignal::Success(proof) => {
                // One verification attempt only: a forged or reused callback
                // must not be resubmitted blindly.
                self.backend.verify_payment(order.order_id, &proof).await?;
                info!(order_id = order.order_id, "online payment verified");
                self.clear_cart_after_success(cart, order.vendor_id).await;
                Ok(CheckoutOutcome::Confirmed(order))
            }
            GatewaySignal::Cancelled => {
                info!(order_id = order.order_id, "payment cancelled by customer");
                Ok(CheckoutOutcome::PaymentCancelled(order))
            }
            GatewaySignal::Failed(reason) => Err(Error::GatewayFailed(reason)),
        }
    }

    /// Cart cleanup after a confirmed order. The order already exists, so a
    /// cleanup failure is logged rather than failing the checkout.
    async fn clear_cart_after_success(&self, cart: &CartStore, vendor_id: i64) {
        if let Err(e) = cart.clear_cart(vendor_id).await {
            warn!(vendor_id, "failed to clear cart after checkout: {e}");
        }
    }
}
