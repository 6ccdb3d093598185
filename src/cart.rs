//! Cart store: a read-through cache over the backend cart.
//!
//! The backend owns every total (tax and delivery charges follow server-side
//! rules), so the store never computes quantities or amounts itself: every
//! mutation sends a signed quantity *delta* and then refetches the whole
//! summary. While a mutation is in flight the store keeps a pending-delta
//! overlay per item so steppers can render optimistically; the overlay entry
//! is dropped the moment the mutation round-trip resolves.
//!
//! Mutations for the same vendor cart are serialized: a second mutation
//! while one is in flight fails fast with `Error::MutationInFlight` so the
//! UI can disable the triggering control instead of racing the refetch.
//! Different vendors mutate concurrently, so the cached summary and the
//! pending overlay are both keyed by vendor; a late refetch can only land
//! in its own vendor's slot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::api::{AddItemRequest, OrderingBackend};
use crate::error::Error;
use crate::models::CartSummary;
use crate::session::{Role, SessionContext};

#[derive(Default)]
struct VendorCart {
    summary: Option<CartSummary>,
    /// Optimistic per-item deltas for mutations still in flight.
    pending: HashMap<i64, i64>,
}

/// Per-customer cart store, keyed internally by vendor.
pub struct CartStore {
    session: SessionContext,
    backend: Arc<dyn OrderingBackend>,
    carts: Mutex<HashMap<i64, VendorCart>>,
    vendor_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl CartStore {
    pub fn new(session: SessionContext, backend: Arc<dyn OrderingBackend>) -> Self {
        Self {
            session,
            backend,
            carts: Mutex::new(HashMap::new()),
            vendor_locks: Mutex::new(HashMap::new()),
        }
    }

    fn vendor_lock(&self, vendor_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.vendor_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(vendor_id).or_default())
    }

    fn lock_carts(&self) -> std::sync::MutexGuard<'_, HashMap<i64, VendorCart>> {
        self.carts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The last fetched summary for a vendor, if any.
    pub fn summary(&self, vendor_id: i64) -> Option<CartSummary> {
        self.lock_carts()
            .get(&vendor_id)
            .and_then(|cart| cart.summary.clone())
    }

    /// Quantity to display for an item: the backend-confirmed quantity plus
    /// any pending delta, floored at zero.
    pub fn display_quantity(&self, vendor_id: i64, item_id: i64) -> u32 {
        let carts = self.lock_carts();
        let Some(cart) = carts.get(&vendor_id) else {
            return 0;
        };
        let confirmed = cart
            .summary
            .as_ref()
            .map(|s| s.quantity_of(item_id))
            .unwrap_or(0) as i64;
        let pending = cart.pending.get(&item_id).copied().unwrap_or(0);
        (confirmed + pending).max(0) as u32
    }

    /// Fetch the cart summary for a vendor, replacing that vendor's local
    /// state wholesale.
    ///
    /// Cart state is customer-only: for any other role this clears the view
    /// and skips the backend call entirely. A fetch failure also resets the
    /// vendor's view to empty so stale totals are never displayed.
    pub async fn fetch_cart(&self, vendor_id: i64) -> Result<Option<CartSummary>, Error> {
        if self.session.role != Role::Customer {
            self.lock_carts().clear();
            return Ok(None);
        }

        let lock = self.vendor_lock(vendor_id);
        let _guard = lock.lock().await;
        self.refetch(vendor_id).await
    }

    /// Add a signed quantity delta for an item, then refetch the summary.
    pub async fn add_item(&self, req: AddItemRequest) -> Result<Option<CartSummary>, Error> {
        let lock = self.vendor_lock(req.vendor_id);
        let _guard = lock.try_lock().map_err(|_| {
            Error::MutationInFlight(format!("cart for vendor {}", req.vendor_id))
        })?;

        {
            let mut carts = self.lock_carts();
            let cart = carts.entry(req.vendor_id).or_default();
            *cart.pending.entry(req.item_id).or_insert(0) += i64::from(req.quantity);
        }

        let outcome = self.backend.add_cart_item(&req).await;
        // The overlay only covers the in-flight window; success or failure,
        // the next authoritative read supersedes it.
        {
            let mut carts = self.lock_carts();
            if let Some(cart) = carts.get_mut(&req.vendor_id) {
                cart.pending.remove(&req.item_id);
            }
        }
        if let Err(e) = outcome {
            warn!(item_id = req.item_id, vendor_id = req.vendor_id, "add item failed: {e}");
            return Err(e);
        }

        info!(
            item_id = req.item_id,
            vendor_id = req.vendor_id,
            delta = req.quantity,
            "cart delta applied"
        );
        self.refetch(req.vendor_id).await
    }

    /// Remove an item line entirely, then refetch the summary.
    pub async fn remove_item(
        &self,
        item_id: i64,
        vendor_id: i64,
    ) -> Result<Option<CartSummary>, Error> {
        let lock = self.vendor_lock(vendor_id);
        let _guard = lock
            .try_lock()
            .map_err(|_| Error::MutationInFlight(format!("cart for vendor {vendor_id}")))?;

        self.backend.remove_cart_item(item_id, vendor_id).await?;
        {
            let mut carts = self.lock_carts();
            if let Some(cart) = carts.get_mut(&vendor_id) {
                cart.pending.remove(&item_id);
            }
        }
        info!(item_id, vendor_id, "cart item removed");
        self.refetch(vendor_id).await
    }

    /// Clear the whole cart for a vendor, then refetch the summary.
    pub async fn clear_cart(&self, vendor_id: i64) -> Result<(), Error> {
        let lock = self.vendor_lock(vendor_id);
        let _guard = lock
            .try_lock()
            .map_err(|_| Error::MutationInFlight(format!("cart for vendor {vendor_id}")))?;

        self.backend.clear_cart(vendor_id).await?;
        {
            let mut carts = self.lock_carts();
            if let Some(cart) = carts.get_mut(&vendor_id) {
                cart.pending.clear();
            }
        }
        info!(vendor_id, "cart cleared");
        self.refetch(vendor_id).await?;
        Ok(())
    }

    /// Re-read the authoritative summary. On success the vendor's summary is
    /// replaced wholesale; on failure that vendor's view resets to empty and
    /// the error propagates.
    async fn refetch(&self, vendor_id: i64) -> Result<Option<CartSummary>, Error> {
        match self.backend.cart_summary(vendor_id).await {
            Ok(summary) => {
                let mut carts = self.lock_carts();
                carts.entry(vendor_id).or_default().summary = summary.clone();
                Ok(summary)
            }
            Err(e) => {
                self.lock_carts().remove(&vendor_id);
                Err(e)
            }
        }
    }
}
