//! Driftwood Orders - the order/payment/refund domain library.
//!
//! This crate is the transactional heart of the storefront. It owns:
//!
//! - [`model`] - the `Order` and `RefundRequest` records and their wire shapes
//! - [`repository`] - durable storage behind the [`repository::OrderStore`]
//!   and [`repository::RefundStore`] traits (Postgres and in-memory)
//! - [`gateway`] - the payment gateway adapter (HTTP and mock)
//! - [`service`] - `OrderService` and `RefundService`, which orchestrate the
//!   status state machine under optimistic concurrency
//!
//! Both the storefront and admin binaries depend on this crate; neither
//! touches the tables or the gateway directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod error;
pub mod gateway;
pub mod model;
pub mod repository;
pub mod service;

pub use error::OrderError;
pub use model::{CheckoutSummary, Order, RefundDecision, RefundRequest, StatusChange};
pub use service::{OrderService, RefundService};
