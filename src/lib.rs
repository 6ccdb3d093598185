//! RailMeal client core.
//!
//! The headless order-lifecycle subsystem shared by the admin, vendor, and
//! customer dashboards of the RailMeal train-food-ordering platform: cart
//! aggregation, checkout orchestration with COD/online payment branching,
//! the order and payment status state machines, the paginated/filtered
//! order query layer, and the active/historical list reconciler.
//!
//! Rendering, routing, and form widgets live in the host application; the
//! backend owns persistence and all pricing rules. Components here talk to
//! it through [`api::OrderingBackend`] and receive an explicit
//! [`session::SessionContext`] at construction.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod api;
pub mod cart;
pub mod checkout;
pub mod error;
pub mod models;
pub mod orders;
pub mod query;
pub mod reconcile;
pub mod session;
pub mod status;

pub use api::{AddItemRequest, HttpBackend, OrderingBackend, PaymentProof};
pub use cart::CartStore;
pub use checkout::{CheckoutOrchestrator, CheckoutOutcome, GatewaySignal, PaymentGateway};
pub use error::{Error, FieldError};
pub use models::{
    Bucket, CartLine, CartSummary, DeliveryContext, Order, OrderItem, OrderStatus, PageEnvelope,
    PaymentMethod, PaymentStatus,
};
pub use orders::OrderBoard;
pub use query::{OrderFilters, OrderScope, PageMeta, PageView};
pub use session::{Role, SessionContext};

/// Install a console tracing subscriber for binaries and examples.
///
/// Honors `RUST_LOG`; defaults to `info` globally and `debug` for this
/// crate. Safe to call once per process.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,railmeal_client=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .init();
}
