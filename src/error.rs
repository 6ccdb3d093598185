//! Error taxonomy for the client core.
//!
//! Validation and invariant errors are resolved locally and never reach the
//! network. Network-origin errors carry a human-readable message extracted
//! from the backend body (message field, then error field, then HTTP status
//! text, then a generic fallback). Gateway cancellation is *not* an error —
//! see `checkout::CheckoutOutcome`.

use crate::models::{OrderStatus, PaymentStatus};
use crate::session::Role;

/// A single field-scoped validation failure. Checkout validation reports one
/// of these per invalid field, never just the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One or more delivery-context fields failed pre-submission checks.
    #[error("validation failed: {}", format_fields(.0))]
    Validation(Vec<FieldError>),

    /// Checkout refused because the cart has no items. Distinct from field
    /// validation so the UI can route the user back to the menu.
    #[error("cannot place an order from an empty cart")]
    EmptyCart,

    /// Could not reach the backend (connect, timeout, DNS).
    #[error("{0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("{message} (HTTP {status})")]
    Backend { status: u16, message: String },

    /// The backend answered 2xx but the body did not match the expected shape.
    #[error("unexpected response from backend: {0}")]
    UnexpectedResponse(String),

    /// The payment gateway reported a decline or failure. Terminal for the
    /// attempt; never auto-retried.
    #[error("payment failed: {0}")]
    GatewayFailed(String),

    /// Server-side verification of the gateway callback failed. The order
    /// stays in its pending-payment state; verification is never resubmitted
    /// automatically.
    #[error("payment verification failed: {0}")]
    PaymentVerification(String),

    /// A status transition outside `next_allowed_statuses` was attempted.
    #[error("{role:?} may not move order from {from:?} to {to:?}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
        role: Role,
    },

    /// A COD payment transition outside the allowed set was attempted.
    #[error("COD payment may not move from {from:?} to {to:?}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// A mutation for the same cart or order is still in flight. The caller
    /// should disable the triggering control and retry after the first
    /// mutation resolves.
    #[error("a mutation for {0} is already in flight")]
    MutationInFlight(String),

    /// The initiating view was torn down before a delayed retry fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The requested entity is not present in local state.
    #[error("order {0} not found")]
    OrderNotFound(i64),

    /// COD settlement was requested for a non-COD order.
    #[error("order {0} is not cash-on-delivery")]
    NotCashOnDelivery(i64),

    /// The session's role may not perform this action.
    #[error("{role:?} may not {action}")]
    RoleNotPermitted {
        role: Role,
        action: &'static str,
    },
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(FieldError::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// The fields that failed validation, if this is a validation error.
    pub fn field_errors(&self) -> Option<&[FieldError]> {
        match self {
            Error::Validation(fields) => Some(fields),
            _ => None,
        }
    }
}

/// Extract a human-readable message from a backend error body.
///
/// Preference order: structured `message` field, structured `error` field,
/// the HTTP status text, then a generic fallback.
pub(crate) fn backend_message(status: u16, status_text: &str, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = json
            .get("message")
            .or_else(|| json.get("error"))
            .and_then(serde_json::Value::as_str)
        {
            let trimmed = msg.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    if !status_text.is_empty() {
        return status_text.to_string();
    }
    format!("request failed with status {status}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_message_prefers_message_field() {
        let body = r#"{"message":"PNR not found","error":"Bad Request"}"#;
        assert_eq!(backend_message(400, "Bad Request", body), "PNR not found");
    }

    #[test]
    fn test_backend_message_falls_back_to_error_field() {
        let body = r#"{"error":"Vendor closed"}"#;
        assert_eq!(backend_message(409, "Conflict", body), "Vendor closed");
    }

    #[test]
    fn test_backend_message_falls_back_to_status_text() {
        assert_eq!(
            backend_message(502, "Bad Gateway", "not json"),
            "Bad Gateway"
        );
    }

    #[test]
    fn test_backend_message_generic_fallback() {
        assert_eq!(backend_message(500, "", ""), "request failed with status 500");
    }

    #[test]
    fn test_validation_display_lists_every_field() {
        let err = Error::Validation(vec![
            FieldError {
                field: "pnrNumber",
                message: "must be exactly 10 digits".into(),
            },
            FieldError {
                field: "trainNumber",
                message: "is required".into(),
            },
        ]);
        let text = err.to_string();
        assert!(text.contains("pnrNumber"));
        assert!(text.contains("trainNumber"));
    }
}
