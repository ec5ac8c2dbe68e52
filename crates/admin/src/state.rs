//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use driftwood_orders::gateway::{GatewayError, HttpPaymentGateway};
use driftwood_orders::repository::{PgOrderStore, PgRefundStore};
use driftwood_orders::{OrderService, RefundService};

use crate::config::AdminConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    orders: OrderService,
    refunds: RefundService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway HTTP client cannot be built.
    pub fn new(config: AdminConfig, pool: PgPool) -> Result<Self, GatewayError> {
        let gateway = Arc::new(HttpPaymentGateway::new(config.gateway.clone())?);
        let order_store = Arc::new(PgOrderStore::new(pool.clone()));
        let refund_store = Arc::new(PgRefundStore::new(pool.clone()));

        let orders = OrderService::new(order_store.clone(), gateway.clone(), config.currency);
        let refunds = RefundService::new(order_store, refund_store, gateway);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                orders,
                refunds,
            }),
        })
    }

    /// Get a reference to the admin configuration.
    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the order service.
    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    /// Get a reference to the refund service.
    #[must_use]
    pub fn refunds(&self) -> &RefundService {
        &self.inner.refunds
    }
}
