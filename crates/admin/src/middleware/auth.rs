//! Admin identity claim extraction.
//!
//! Same signed claim headers as the storefront, verified by
//! [`driftwood_core::claims`], but with an extra gate: the role claim
//! must be `admin`. A valid customer claim gets 403, not 401.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use chrono::Utc;
use secrecy::ExposeSecret;

use driftwood_core::claims::{UnverifiedClaims, verify_claims};
use driftwood_core::{Role, UserId};

use crate::error::AppError;
use crate::state::AppState;

/// Verified admin identity of the calling user.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser {
    /// User id from the identity service.
    pub id: UserId,
}

impl AdminUser {
    /// Actor string recorded in the order status history.
    #[must_use]
    pub fn actor(&self) -> String {
        format!("admin:{}", self.id)
    }
}

impl FromRequestParts<AppState> for AdminUser {
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

        if verified.role != Role::Admin {
            tracing::warn!(user_id = %verified.user_id, "non-admin claim on admin API");
            return Err(AppError::Forbidden);
        }

        Ok(Self {
            id: verified.user_id,
        })
    }
}

fn claims_from_headers(headers: &HeaderMap) -> Result<UnverifiedClaims<'_>, AppError> {
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
