//! Signed identity claims.
//!
//! Authentication is owned by a separate identity service. It attaches
//! the caller's identity to each request as headers, signed with a secret
//! shared with the API binaries:
//!
//! - `x-auth-user-id` - numeric user id
//! - `x-auth-role` - `customer` or `admin`
//! - `x-auth-timestamp` - unix seconds when the claims were minted
//! - `x-auth-signature` - hex HMAC-SHA256 over `"{user_id}:{role}:{timestamp}"`
//!
//! This module is pure: the binaries pull the header values out of the
//! request and hand them here as strings.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::types::{Role, UserId};

/// Maximum accepted claim age (and future skew), in seconds.
pub const CLAIMS_MAX_AGE_SECS: i64 = 300;

/// Raw claim header values as read off the request.
#[derive(Debug, Clone, Copy)]
pub struct UnverifiedClaims<'a> {
    /// `x-auth-user-id` value.
    pub user_id: &'a str,
    /// `x-auth-role` value.
    pub role: &'a str,
    /// `x-auth-timestamp` value.
    pub timestamp: &'a str,
    /// `x-auth-signature` value.
    pub signature: &'a str,
}

/// Identity that passed signature and freshness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedClaims {
    /// User id asserted by the identity service.
    pub user_id: UserId,
    /// Role asserted by the identity service.
    pub role: Role,
}

/// Why a set of identity claims was rejected. Logged server-side only;
/// clients get a generic 401.
#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("malformed claim field {0}")]
    Malformed(&'static str),
    #[error("claims expired or from the future")]
    Stale,
    #[error("claim signature mismatch")]
    BadSignature,
}

/// Verify a set of claims against the shared signing secret.
///
/// The signature check runs in constant time and covers every field, so
/// none of them can be swapped after signing.
///
/// # Errors
///
/// Returns [`ClaimsError`] describing the first check that failed.
pub fn verify_claims(
    secret: &str,
    claims: &UnverifiedClaims<'_>,
    now_unix: i64,
) -> Result<VerifiedClaims, ClaimsError> {
    let user_id: i32 = claims
        .user_id
        .parse()
        .map_err(|_| ClaimsError::Malformed("user_id"))?;
    let role: Role = claims
        .role
        .parse()
        .map_err(|_| ClaimsError::Malformed("role"))?;
    let timestamp: i64 = claims
        .timestamp
        .parse()
        .map_err(|_| ClaimsError::Malformed("timestamp"))?;

    if (now_unix - timestamp).abs() > CLAIMS_MAX_AGE_SECS {
        return Err(ClaimsError::Stale);
    }

    let provided = hex::decode(claims.signature).map_err(|_| ClaimsError::BadSignature)?;
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| ClaimsError::BadSignature)?;
    mac.update(claim_message(claims.user_id, claims.role, claims.timestamp).as_bytes());
    // verify_slice is constant-time
    mac.verify_slice(&provided)
        .map_err(|_| ClaimsError::BadSignature)?;

    Ok(VerifiedClaims {
        user_id: UserId::new(user_id),
        role,
    })
}

/// Compute the hex signature the identity service attaches to its claims.
///
/// Exposed for tests and local tooling that mints claims by hand.
#[must_use]
pub fn sign_claims(secret: &str, user_id: UserId, role: Role, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(claim_message(&user_id.to_string(), &role.to_string(), &timestamp.to_string()).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn claim_message(user_id: &str, role: &str, timestamp: &str) -> String {
    format!("{user_id}:{role}:{timestamp}")
}
