//! Driftwood Core - Shared types library.
//!
//! This crate provides common types used across all Driftwood components:
//! - `storefront` - Public-facing customer API
//! - `admin` - Internal administration API (private network only)
//! - `orders` - Order/payment/refund domain library
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, roles, and the
//!   order/refund status state machines
//! - [`claims`] - verification of the signed identity claims the identity
//!   service attaches to every request

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod claims;
pub mod types;

pub use types::*;
