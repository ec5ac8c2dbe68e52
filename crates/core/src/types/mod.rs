//! Core types for Driftwood.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod role;
pub mod status;

pub use id::*;
pub use money::{CurrencyCode, LineItem, line_items_total};
pub use role::Role;
pub use status::*;
