//! Mint identity claim headers for local API testing.
//!
//! Prints the four `x-auth-*` headers as curl `-H` flags, signed with
//! `AUTH_SIGNING_SECRET` from the environment. The output is only valid
//! for the claim freshness window.

use chrono::Utc;
use thiserror::Error;

use driftwood_core::claims::sign_claims;
use driftwood_core::{Role, UserId};

/// Claim minting failures.
#[derive(Debug, Error)]
pub enum ClaimsCommandError {
    #[error("Missing environment variable: AUTH_SIGNING_SECRET")]
    MissingSecret,
}

/// Print signed claim headers for the given user.
///
/// # Errors
///
/// Returns [`ClaimsCommandError`] if the signing secret is not set.
pub fn mint(user_id: i32, role: Role) -> Result<(), ClaimsCommandError> {
    dotenvy::dotenv().ok();

    let secret =
        std::env::var("AUTH_SIGNING_SECRET").map_err(|_| ClaimsCommandError::MissingSecret)?;

    let timestamp = Utc::now().timestamp();
    let signature = sign_claims(&secret, UserId::new(user_id), role, timestamp);

    #[allow(clippy::print_stdout)]
    {
        println!("-H 'x-auth-user-id: {user_id}'");
        println!("-H 'x-auth-role: {role}'");
        println!("-H 'x-auth-timestamp: {timestamp}'");
        println!("-H 'x-auth-signature: {signature}'");
    }

    Ok(())
}
