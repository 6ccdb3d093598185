//! Order board: the shared admin/vendor dashboard store.
//!
//! Holds the two in-memory buckets (active, historical), hydrates them from
//! the paged listing endpoints, and applies role-gated status and COD
//! payment mutations. Every mutation is validated against the state machine
//! before the call goes out (the UI only offers what
//! `allowed_transitions` returns, and the board rejects anything else again
//! defensively), and the response patches local state through the
//! reconciler instead of refetching the list.
//!
//! Updates for the same order are serialized: a second mutation for an
//! order with one in flight fails fast, since both the transition check and
//! the reconciler's locate-by-id step assume a single in-flight mutation.
//! Updates for different orders proceed concurrently.
//!
//! Free-text search goes through [`OrderBoard::search`], which holds each
//! keystroke for the debounce window before any request is issued; only the
//! newest pending value ever reaches the backend.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::api::OrderingBackend;
use crate::error::Error;
use crate::models::{Order, OrderStatus, PaymentMethod, PaymentStatus};
use crate::query::{build_query, Debouncer, OrderFilters, OrderScope, PageView, ResponseParser};
use crate::reconcile;
use crate::session::{Role, SessionContext};
use crate::status;

#[derive(Default)]
struct BoardState {
    active: Vec<Order>,
    historical: Vec<Order>,
}

/// Removes the order id from the in-flight set when the mutation resolves,
/// on success and on error alike.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<i64>>,
    order_id: i64,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<i64>>, order_id: i64) -> Result<Self, Error> {
        let mut in_flight = set.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(order_id) {
            return Err(Error::MutationInFlight(format!("order {order_id}")));
        }
        Ok(Self { set, order_id })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.set.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.remove(&self.order_id);
    }
}

pub struct OrderBoard {
    session: SessionContext,
    backend: Arc<dyn OrderingBackend>,
    state: Mutex<BoardState>,
    parser: Mutex<ResponseParser>,
    in_flight: Mutex<HashSet<i64>>,
    search_debounce: Debouncer<Option<String>>,
}

impl OrderBoard {
    pub fn new(session: SessionContext, backend: Arc<dyn OrderingBackend>) -> Self {
        Self {
            session,
            backend,
            state: Mutex::new(BoardState::default()),
            parser: Mutex::new(ResponseParser::new()),
            in_flight: Mutex::new(HashSet::new()),
            search_debounce: Debouncer::default(),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn active(&self) -> Vec<Order> {
        self.lock_state().active.clone()
    }

    pub fn historical(&self) -> Vec<Order> {
        self.lock_state().historical.clone()
    }

    pub fn find(&self, order_id: i64) -> Option<Order> {
        let state = self.lock_state();
        state
            .active
            .iter()
            .chain(state.historical.iter())
            .find(|o| o.order_id == order_id)
            .cloned()
    }

    /// Actions to offer for an order, per the state machine and the
    /// session's role.
    pub fn allowed_transitions(&self, order_id: i64) -> Result<BTreeSet<OrderStatus>, Error> {
        let order = self.find(order_id).ok_or(Error::OrderNotFound(order_id))?;
        Ok(status::next_allowed_statuses(
            order.order_status,
            self.session.role,
        ))
    }

    /// Load one page of the active or historical listing and replace that
    /// bucket's contents with it.
    pub async fn load_page(
        &self,
        scope: OrderScope,
        filters: &OrderFilters,
        page_number: u64,
        page_size: u64,
    ) -> Result<PageView<Order>, Error> {
        if !self.session.role.can_manage_orders() {
            return Err(Error::RoleNotPermitted {
                role: self.session.role,
                action: "list dashboard orders",
            });
        }

        let query = build_query(scope, filters, page_number, page_size);
        let envelope = self.backend.list_orders(self.session.role, &query).await?;

        let view = {
            let mut parser = self.parser.lock().unwrap_or_else(|e| e.into_inner());
            parser.parse(envelope)
        };

        {
            let mut state = self.lock_state();
            let ids: HashSet<i64> = view.items.iter().map(|o| o.order_id).collect();
            match scope {
                OrderScope::Active => {
                    state.active = view.items.clone();
                    state.historical.retain(|o| !ids.contains(&o.order_id));
                }
                OrderScope::Historical => {
                    state.historical = view.items.clone();
                    state.active.retain(|o| !ids.contains(&o.order_id));
                }
            }
        }

        Ok(view)
    }

    /// Record a free-text search keystroke and, once the quiet window passes
    /// with no newer keystroke, reload the first page with the latest text.
    ///
    /// Returns `Ok(None)` when a later keystroke superseded this one, in
    /// which case no request was issued. Blank text clears the filter.
    pub async fn search(
        &self,
        scope: OrderScope,
        filters: &OrderFilters,
        search: Option<String>,
        page_size: u64,
    ) -> Result<Option<PageView<Order>>, Error> {
        let Some(committed) = self.search_debounce.submit(search).await else {
            return Ok(None);
        };

        let mut filters = filters.clone();
        filters.set_search(committed);
        self.load_page(scope, &filters, 1, page_size).await.map(Some)
    }

    /// Apply an order-status transition through the role-appropriate
    /// endpoint, then patch local buckets in place.
    pub async fn update_status(
        &self,
        order_id: i64,
        new_status: OrderStatus,
        remarks: Option<&str>,
    ) -> Result<Order, Error> {
        let order = self.find(order_id).ok_or(Error::OrderNotFound(order_id))?;
        status::ensure_order_transition(order.order_status, new_status, self.session.role)?;

        let _guard = InFlightGuard::acquire(&self.in_flight, order_id)?;

        let updated = match self.session.role {
            Role::Admin => {
                self.backend
                    .update_order_status_admin(order_id, new_status, remarks)
                    .await?
            }
            Role::Vendor => {
                self.backend
                    .update_order_status_vendor(order_id, new_status, remarks, self.session.user_id)
                    .await?
            }
            // Unreachable in practice: customers have no allowed transitions.
            Role::Customer => {
                return Err(Error::RoleNotPermitted {
                    role: Role::Customer,
                    action: "update order status",
                })
            }
        };

        {
            let mut state = self.lock_state();
            let BoardState {
                ref mut active,
                ref mut historical,
            } = *state;
            reconcile::apply_status_update(active, historical, order_id, updated.order_status);
        }

        info!(
            order_id,
            from = ?order.order_status,
            to = ?updated.order_status,
            role = ?self.session.role,
            "order status updated"
        );
        Ok(updated)
    }

    /// Settle (or fail) a COD payment. Runs on the payment axis only: the
    /// order's status and bucket are untouched.
    pub async fn update_cod_payment(
        &self,
        order_id: i64,
        new_payment_status: PaymentStatus,
        remarks: Option<&str>,
    ) -> Result<(), Error> {
        let order = self.find(order_id).ok_or(Error::OrderNotFound(order_id))?;
        if order.payment_method != PaymentMethod::Cod {
            return Err(Error::NotCashOnDelivery(order_id));
        }
        status::ensure_cod_payment_transition(order.payment_status, new_payment_status)?;

        let _guard = InFlightGuard::acquire(&self.in_flight, order_id)?;

        match self.session.role {
            Role::Admin => {
                self.backend
                    .update_cod_payment_admin(order_id, new_payment_status, remarks)
                    .await?;
            }
            Role::Vendor => {
                // The vendor endpoint can only confirm receipt of cash.
                if new_payment_status != PaymentStatus::Completed {
                    return Err(Error::RoleNotPermitted {
                        role: Role::Vendor,
                        action: "mark a COD payment as anything but completed",
                    });
                }
                self.backend
                    .complete_cod_payment_vendor(order_id, self.session.user_id, remarks)
                    .await?;
            }
            Role::Customer => {
                return Err(Error::RoleNotPermitted {
                    role: Role::Customer,
                    action: "update COD payment status",
                })
            }
        }

        {
            let mut state = self.lock_state();
            let BoardState {
                ref mut active,
                ref mut historical,
            } = *state;
            reconcile::apply_payment_update(active, historical, order_id, new_payment_status);
        }

        info!(
            order_id,
            from = ?order.payment_status,
            to = ?new_payment_status,
            role = ?self.session.role,
            "COD payment updated"
        );
        Ok(())
    }
}
