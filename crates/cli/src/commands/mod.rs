//! CLI subcommand implementations.

pub mod claims;
pub mod migrate;
