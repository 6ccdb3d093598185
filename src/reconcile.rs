//! In-place reconciliation of the active/historical order buckets.
//!
//! After a successful status mutation the dashboards patch local state
//! instead of refetching the whole list. Invariant: after reconciliation,
//! exactly one bucket contains the order and its `order_status` matches the
//! just-applied value.

use tracing::warn;

use crate::models::{Order, OrderStatus, PaymentStatus};

/// Apply a status update to whichever bucket currently holds `order_id`.
///
/// Terminal statuses migrate the order from `active` to `historical`;
/// non-terminal statuses patch it in place where it was found. Returns
/// `false` (and logs) when the order is in neither bucket.
pub fn apply_status_update(
    active: &mut Vec<Order>,
    historical: &mut Vec<Order>,
    order_id: i64,
    new_status: OrderStatus,
) -> bool {
    if new_status.is_terminal() {
        if let Some(pos) = active.iter().position(|o| o.order_id == order_id) {
            let mut order = active.remove(pos);
            order.order_status = new_status;
            historical.push(order);
            return true;
        }
        // Already historical (e.g. CANCELLED -> DELIVERED never happens, but
        // a stale view may re-apply the same terminal status).
        if let Some(order) = historical.iter_mut().find(|o| o.order_id == order_id) {
            order.order_status = new_status;
            return true;
        }
    } else {
        for bucket in [active, historical] {
            if let Some(order) = bucket.iter_mut().find(|o| o.order_id == order_id) {
                order.order_status = new_status;
                return true;
            }
        }
    }
    warn!(order_id, ?new_status, "status update for unknown order");
    false
}

/// Patch an order's payment status in place. Payment transitions never move
/// an order between buckets.
pub fn apply_payment_update(
    active: &mut Vec<Order>,
    historical: &mut Vec<Order>,
    order_id: i64,
    new_payment_status: PaymentStatus,
) -> bool {
    for bucket in [active, historical] {
        if let Some(order) = bucket.iter_mut().find(|o| o.order_id == order_id) {
            order.payment_status = new_payment_status;
            return true;
        }
    }
    warn!(order_id, ?new_payment_status, "payment update for unknown order");
    false
}

/// True when every order sits in exactly one bucket consistent with its
/// status. Used by tests and debug assertions.
pub fn partition_holds(active: &[Order], historical: &[Order]) -> bool {
    let misplaced = active.iter().any(|o| o.order_status.is_terminal())
        || historical.iter().any(|o| !o.order_status.is_terminal());
    if misplaced {
        return false;
    }
    let duplicated = active
        .iter()
        .any(|a| historical.iter().any(|h| h.order_id == a.order_id));
    !duplicated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentMethod, PaymentStatus};

    fn order(order_id: i64, status: OrderStatus) -> Order {
        Order {
            order_id,
            customer_id: 9,
            vendor_id: 4,
            pnr_number: "8524179630".into(),
            train_number: "12951".into(),
            coach_number: "B4".into(),
            seat_number: "32".into(),
            delivery_station_id: "NDLS".into(),
            delivery_instructions: None,
            delivery_time: None,
            items: vec![],
            total_amount: 100.0,
            tax_amount: 5.0,
            delivery_charges: 10.0,
            discount_amount: None,
            final_amount: 115.0,
            order_status: status,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Cod,
            razorpay_order_id: None,
        }
    }

    #[test]
    fn test_terminal_update_migrates_to_historical() {
        let mut active = vec![order(501, OrderStatus::Dispatched)];
        let mut historical = vec![];

        let found =
            apply_status_update(&mut active, &mut historical, 501, OrderStatus::Delivered);

        assert!(found);
        assert!(active.iter().all(|o| o.order_id != 501));
        assert_eq!(historical.len(), 1);
        assert_eq!(historical[0].order_id, 501);
        assert_eq!(historical[0].order_status, OrderStatus::Delivered);
        assert!(partition_holds(&active, &historical));
    }

    #[test]
    fn test_non_terminal_update_patches_in_place() {
        let mut active = vec![order(7, OrderStatus::Placed), order(8, OrderStatus::Preparing)];
        let mut historical = vec![order(9, OrderStatus::Delivered)];

        let found = apply_status_update(&mut active, &mut historical, 7, OrderStatus::Preparing);

        assert!(found);
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].order_status, OrderStatus::Preparing);
        assert!(partition_holds(&active, &historical));
    }

    #[test]
    fn test_unknown_order_is_reported() {
        let mut active = vec![order(1, OrderStatus::Placed)];
        let mut historical = vec![];
        assert!(!apply_status_update(
            &mut active,
            &mut historical,
            999,
            OrderStatus::Preparing
        ));
        assert_eq!(active.len(), 1);
        assert!(historical.is_empty());
    }

    #[test]
    fn test_payment_update_never_migrates() {
        // DELIVERED order settles its COD payment late; it stays historical.
        let mut active = vec![];
        let mut historical = vec![order(42, OrderStatus::Delivered)];

        let found = apply_payment_update(
            &mut active,
            &mut historical,
            42,
            PaymentStatus::Completed,
        );

        assert!(found);
        assert!(active.is_empty());
        assert_eq!(historical[0].payment_status, PaymentStatus::Completed);
        assert_eq!(historical[0].order_status, OrderStatus::Delivered);
    }

    #[test]
    fn test_partition_detects_duplicates_and_misplacement() {
        let active = vec![order(1, OrderStatus::Delivered)];
        assert!(!partition_holds(&active, &[]));

        let active = vec![order(2, OrderStatus::Placed)];
        let historical = vec![order(2, OrderStatus::Cancelled)];
        assert!(!partition_holds(&active, &historical));
    }
}
