//! Order and refund orchestration.
//!
//! Services own every mutation of orders and refund requests. Both follow
//! the same concurrency discipline: call the gateway first (no lock held
//! across the network), then apply a version-checked local write, retrying
//! the read-check-write cycle a bounded number of times before surfacing a
//! conflict.

pub mod orders;
pub mod refunds;

pub use orders::OrderService;
pub use refunds::RefundService;

/// Bounded retries for version-checked writes that lost a race.
pub(crate) const MAX_WRITE_ATTEMPTS: u32 = 3;
