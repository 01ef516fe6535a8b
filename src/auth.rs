// ABOUTME: JWT bearer authentication mapping a credential to a stable user id
// ABOUTME: Issues and validates HS256 tokens and extracts the caller from request headers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Authentication
//!
//! Identity resolution is deliberately narrow: a signed bearer token carries
//! the user id in its `sub` claim and every handler receives that id through
//! [`authenticate`]. Nothing else about the user is trusted from the token.

use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::service_names;
use crate::errors::{AppError, AppResult};

/// JWT claims for API access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Audience
    pub aud: String,
}

/// Result of authenticating a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    /// Authenticated user id
    pub user_id: String,
}

/// Issues and validates bearer tokens
#[derive(Clone)]
pub struct AuthManager {
    secret: Vec<u8>,
    token_expiry_hours: i64,
}

impl AuthManager {
    /// Create a new authentication manager
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>, token_expiry_hours: i64) -> Self {
        Self {
            secret: secret.into(),
            token_expiry_hours,
        }
    }

    /// Generate a signed token for a user
    ///
    /// # Errors
    ///
    /// Returns an error if JWT encoding fails
    pub fn generate_token(&self, user_id: &str) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_owned(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.token_expiry_hours)).timestamp(),
            aud: service_names::API_AUDIENCE.to_owned(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| AppError::internal(format!("Failed to sign token: {e}")))
    }

    /// Validate a token and return its claims
    ///
    /// # Errors
    ///
    /// Returns `AUTH_INVALID` if the signature, audience or expiry check fails
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_audience(&[service_names::API_AUDIENCE]);

        decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("JWT validation failed: {e}");
                AppError::auth_invalid(format!("Invalid token: {e}"))
            })
    }
}

/// Extract and authenticate the caller from the `Authorization` header
///
/// # Errors
///
/// Returns `AUTH_REQUIRED` when no bearer token is present and `AUTH_INVALID`
/// when the token does not validate
pub fn authenticate(headers: &HeaderMap, auth_manager: &AuthManager) -> AppResult<AuthResult> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(AppError::auth_required)?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::auth_invalid("Authorization header must use the Bearer scheme"))?;

    let claims = auth_manager.validate_token(token)?;
    if claims.sub.is_empty() {
        return Err(AppError::auth_invalid("Token has no subject"));
    }

    Ok(AuthResult {
        user_id: claims.sub,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use axum::http::HeaderValue;

    fn manager() -> AuthManager {
        AuthManager::new(b"test-secret".to_vec(), 1)
    }

    #[test]
    fn test_token_round_trip_preserves_user() {
        let auth = manager();
        let token = auth.generate_token("user-123").unwrap();
        let claims = auth.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.aud, service_names::API_AUDIENCE);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let token = AuthManager::new(b"other".to_vec(), 1)
            .generate_token("user-123")
            .unwrap();
        let error = manager().validate_token(&token).unwrap_err();
        assert_eq!(error.http_status(), 401);
    }

    #[test]
    fn test_authenticate_requires_header() {
        let error = authenticate(&HeaderMap::new(), &manager()).unwrap_err();
        assert_eq!(error.code, ErrorCode::AuthRequired);
    }

    #[test]
    fn test_authenticate_reads_bearer_token() {
        let auth = manager();
        let token = auth.generate_token("user-42").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        assert_eq!(authenticate(&headers, &auth).unwrap().user_id, "user-42");
    }
}
