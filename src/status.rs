//! Order and COD-payment status state machines.
//!
//! Pure transition functions shared by both dashboards: the admin and vendor
//! views render exactly the actions returned by [`next_allowed_statuses`],
//! and the order board rejects anything outside that set again before the
//! mutation call goes out.
//!
//! Role asymmetry: admins may cancel at any non-terminal point (operational
//! override); vendors may only push an order forward along the happy path.
//! Cancellation is reserved for the platform operator or automatic expiry.

use std::collections::BTreeSet;

use crate::error::Error;
use crate::models::{OrderStatus, PaymentStatus};
use crate::session::Role;

/// Legal next order statuses for `current` as seen by `role`.
///
/// Terminal statuses return the empty set, as does any role without order
/// management rights. The result never contains `current` itself, and the
/// vendor set is a subset of the admin set for every status.
pub fn next_allowed_statuses(current: OrderStatus, role: Role) -> BTreeSet<OrderStatus> {
    if !role.can_manage_orders() {
        return BTreeSet::new();
    }
    let mut allowed = BTreeSet::new();
    match current {
        OrderStatus::Placed | OrderStatus::Pending => {
            allowed.insert(OrderStatus::Preparing);
            allowed.insert(OrderStatus::Cancelled);
        }
        OrderStatus::Preparing => {
            allowed.insert(OrderStatus::Dispatched);
            if role == Role::Admin {
                allowed.insert(OrderStatus::Cancelled);
            }
        }
        OrderStatus::Dispatched => {
            allowed.insert(OrderStatus::Delivered);
            if role == Role::Admin {
                allowed.insert(OrderStatus::Cancelled);
            }
        }
        OrderStatus::Delivered | OrderStatus::Cancelled => {}
    }
    allowed
}

/// Gate an order-status transition before issuing the mutation.
pub fn ensure_order_transition(
    current: OrderStatus,
    next: OrderStatus,
    role: Role,
) -> Result<(), Error> {
    if next_allowed_statuses(current, role).contains(&next) {
        Ok(())
    } else {
        Err(Error::InvalidTransition {
            from: current,
            to: next,
            role,
        })
    }
}

/// Legal next COD payment statuses.
///
/// Independent of order status: an order can be DELIVERED while its COD
/// payment is still PENDING, and settling the payment does not touch the
/// order status. Once settled (COMPLETED or FAILED), the machine is frozen.
pub fn next_allowed_cod_payment(current: PaymentStatus) -> BTreeSet<PaymentStatus> {
    match current {
        PaymentStatus::Pending => {
            BTreeSet::from([PaymentStatus::Completed, PaymentStatus::Failed])
        }
        _ => BTreeSet::new(),
    }
}

/// Gate a COD payment transition before issuing the mutation.
pub fn ensure_cod_payment_transition(
    current: PaymentStatus,
    next: PaymentStatus,
) -> Result<(), Error> {
    if next_allowed_cod_payment(current).contains(&next) {
        Ok(())
    } else {
        Err(Error::InvalidPaymentTransition {
            from: current,
            to: next,
        })
    }
}
