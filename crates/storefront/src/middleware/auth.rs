//! Identity claim extraction.
//!
//! The identity service authenticates the caller and forwards signed
//! claim headers; [`driftwood_core::claims`] does the actual
//! verification. Any customer or admin claim is accepted here - the
//! storefront scopes everything to the caller's own records anyway.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use chrono::Utc;
use secrecy::ExposeSecret;

use driftwood_core::claims::{ClaimsError, UnverifiedClaims, verify_claims};
use driftwood_core::{Role, UserId};

use crate::error::AppError;
use crate::state::AppState;

/// Verified identity of the calling user.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    /// User id from the identity service.
    pub id: UserId,
    /// Role claim attached to the request.
    pub role: Role,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let verified = verify_claims(
            state.config().auth_signing_secret.expose_secret(),
            &claims_from_headers(&parts.headers)?,
            Utc::now().timestamp(),
        )
        .map_err(|e| {
            tracing::debug!(error = %e, "identity claims rejected");
            AppError::Unauthorized(e.to_string())
        })?;

        Ok(Self {
            id: verified.user_id,
            role: verified.role,
        })
    }
}

/// Pull the raw claim headers off the request.
///
/// # Errors
///
/// Returns `Unauthorized` if any claim header is missing or not valid
/// ASCII.
pub fn claims_from_headers(headers: &HeaderMap) -> Result<UnverifiedClaims<'_>, AppError> {
    Ok(UnverifiedClaims {
        user_id: header_str(headers, "x-auth-user-id")?,
        role: header_str(headers, "x-auth-role")?,
        timestamp: header_str(headers, "x-auth-timestamp")?,
        signature: header_str(headers, "x-auth-signature")?,
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .ok_or_else(|| AppError::Unauthorized(format!("missing claim header {name}")))?
        .to_str()
        .map_err(|_| AppError::Unauthorized(format!("malformed claim header {name}")))
}
