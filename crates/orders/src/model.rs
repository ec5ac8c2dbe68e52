//! Order and refund request records.
//!
//! `Order.amount_total` is computed exactly once at creation from the cart
//! collaborator's line items; `gateway_payment_id` and `gateway_signature`
//! are write-once and only set by a successful payment verification.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use driftwood_core::{
    AddressId, CurrencyCode, LineItem, OrderId, OrderStatus, RefundRequestId, RefundStatus,
    UserId,
};

/// One checkout attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID, generated at creation.
    pub id: OrderId,
    /// Customer who checked out (owned by the identity collaborator).
    pub user_id: UserId,
    /// Shipping address (owned by the address collaborator).
    pub address_id: AddressId,
    /// Priced positions; immutable after creation.
    pub line_items: Vec<LineItem>,
    /// Σ(unit_price × quantity), fixed at creation.
    pub amount_total: Decimal,
    /// Currency of `amount_total` and all line prices.
    pub currency: CurrencyCode,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Gateway payment intent, obtained before the order is persisted.
    pub gateway_intent_id: String,
    /// Gateway payment reference; write-once, set on verification.
    pub gateway_payment_id: Option<String>,
    /// Verified gateway signature; write-once, set on verification.
    pub gateway_signature: Option<String>,
    /// Optimistic concurrency counter; every status write increments it.
    pub version: i32,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
    /// When the order was last written.
    pub updated_at: DateTime<Utc>,
}

/// One recorded status transition of an order.
///
/// The history is the explicit record used to restore an order's prior
/// status when a refund request is rejected; the prior status is never
/// inferred from the current one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    /// Order this change belongs to.
    pub order_id: OrderId,
    /// Status before the change; `None` for the creation row.
    pub from: Option<OrderStatus>,
    /// Status after the change.
    pub to: OrderStatus,
    /// Who drove the change (e.g. `customer:42`, `admin:jane`, `gateway`).
    pub actor: String,
    /// When the change was recorded.
    pub changed_at: DateTime<Utc>,
}

/// One customer-initiated refund attempt tied to exactly one order.
///
/// Kept forever as an audit record; terminal states are final.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    /// Unique request ID.
    pub id: RefundRequestId,
    /// Owning order. At most one non-terminal request per order.
    pub order_id: OrderId,
    /// Customer who asked for the refund.
    pub user_id: UserId,
    /// Free-text reason, bounded length.
    pub reason: String,
    /// Current lifecycle status.
    pub status: RefundStatus,
    /// Comment the resolving admin left, if any.
    pub admin_comment: Option<String>,
    /// Admin who resolved the request.
    pub resolved_by: Option<String>,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// When the request was last written.
    pub updated_at: DateTime<Utc>,
}

/// Admin decision on a refund request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundDecision {
    Approve,
    Reject,
}

/// Everything the client needs to complete payment with the gateway.
///
/// Returned by `OrderService::create_order`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSummary {
    /// The newly created order.
    pub order_id: OrderId,
    /// Gateway payment intent to confirm client-side.
    pub gateway_intent_id: String,
    /// Amount the gateway will collect.
    pub amount_total: Decimal,
    /// Currency of the amount.
    pub currency: CurrencyCode,
    /// Publishable gateway key for the client SDK.
    pub publishable_key: String,
}
