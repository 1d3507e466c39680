//! Bearer tokens for the REST surface.
//!
//! Tokens are HS256 JWTs carrying the caller's identity plus `iat`/`exp`.
//! They are minted by the login service (or `eventhub-gateway token`) and
//! only verified here. The push socket does not use them.

use axum::{extract::FromRequestParts, http::request::Parts};
use eventhub_core::{
    types::{Identity, Role},
    EventhubError,
};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::app::AppState;
use crate::http::error::ApiError;

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Claims {
    /// User id (subject)
    sub: String,
    name: String,
    role: Role,
    /// Issued at (Unix seconds)
    iat: u64,
    /// Expiration (Unix seconds)
    exp: u64,
}

impl Claims {
    fn new(identity: &Identity, issued_at: u64, ttl_secs: u64) -> Self {
        Self {
            sub: identity.user_id.to_string(),
            name: identity.name.clone(),
            role: identity.role,
            iat: issued_at,
            exp: issued_at + ttl_secs,
        }
    }

    fn into_identity(self) -> Identity {
        Identity::new(self.sub, self.name, self.role)
    }
}

/// Sign an identity into a bearer token valid for `ttl_secs`.
pub fn issue_token(secret: &str, identity: &Identity, ttl_secs: u64) -> eventhub_core::Result<String> {
    let claims = Claims::new(identity, jsonwebtoken::get_current_timestamp(), ttl_secs);
    encode_claims(secret, &claims)
}

fn encode_claims(secret: &str, claims: &Claims) -> eventhub_core::Result<String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| EventhubError::TokenIssue(e.to_string()))
}

/// Check a token's signature and expiry and decode the identity it carries.
pub fn verify_token(secret: &str, token: &str) -> eventhub_core::Result<Identity> {
    let validation = Validation::new(Algorithm::HS256);
    let claims = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => EventhubError::TokenExpired,
            _ => EventhubError::AuthFailed(e.to_string()),
        })?;

    if claims.sub.trim().is_empty() {
        return Err(EventhubError::AuthFailed("token has no user id".to_string()));
    }
    Ok(claims.into_identity())
}

/// `Authorization: Bearer <token>`, scheme matched case-insensitively.
fn extract_bearer(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get("authorization")?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Extractor for handlers that require a signed-in caller.
pub struct AuthUser(pub Identity);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(parts).ok_or_else(|| {
            ApiError::unauthorized("Unauthorized. Set 'Authorization: Bearer <token>' header.")
        })?;
        let identity = verify_token(&state.config.gateway.auth.secret, token).map_err(|e| {
            debug!(error = %e, "bearer token rejected");
            ApiError::from(e)
        })?;
        Ok(AuthUser(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{build_router, test_state};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    const DAY: u64 = 24 * 60 * 60;

    fn alice() -> Identity {
        Identity::new("u-alice", "Alice", Role::Organizer)
    }

    fn parts_with(header: &str) -> Parts {
        Request::builder()
            .header("authorization", header)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn issued_token_verifies_to_same_identity() {
        let token = issue_token("secret", &alice(), DAY).unwrap();
        assert_eq!(verify_token("secret", &token).unwrap(), alice());
    }

    #[test]
    fn issued_token_carries_iat_and_exp() {
        let token = issue_token("secret", &alice(), DAY).unwrap();
        let claims = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap()
        .claims;
        assert_eq!(claims.exp - claims.iat, DAY);
        assert_eq!(claims.role, Role::Organizer);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token("secret", &alice(), DAY).unwrap();
        assert!(matches!(
            verify_token("other", &token),
            Err(EventhubError::AuthFailed(_))
        ));
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let token = issue_token("secret", &alice(), DAY).unwrap();
        let forged_claims = issue_token(
            "secret",
            &Identity::new("u-mallory", "Mallory", Role::Organizer),
            DAY,
        )
        .unwrap();
        // splice mallory's payload onto alice's signature
        let (head, rest) = token.split_once('.').unwrap();
        let (_, sig) = rest.split_once('.').unwrap();
        let payload = forged_claims.split('.').nth(1).unwrap();
        let forged = format!("{head}.{payload}.{sig}");
        assert!(verify_token("secret", &forged).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = jsonwebtoken::get_current_timestamp();
        let stale = Claims::new(&alice(), now - 2 * DAY, DAY);
        let token = encode_claims("secret", &stale).unwrap();
        assert!(matches!(
            verify_token("secret", &token),
            Err(EventhubError::TokenExpired)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(verify_token("secret", "not-a-token").is_err());
        assert!(verify_token("secret", "a.b.c").is_err());
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(extract_bearer(&parts_with("Bearer abc")), Some("abc"));
        assert_eq!(extract_bearer(&parts_with("bearer abc")), Some("abc"));
        assert_eq!(extract_bearer(&parts_with("BEARER  abc ")), Some("abc"));
        assert_eq!(extract_bearer(&parts_with("Basic abc")), None);
        assert_eq!(extract_bearer(&parts_with("Bearer ")), None);
        assert_eq!(extract_bearer(&parts_with("abc")), None);
    }

    #[tokio::test]
    async fn expired_token_gets_401_from_the_api() {
        let state = test_state();
        let secret = state.config.gateway.auth.secret.clone();
        let now = jsonwebtoken::get_current_timestamp();
        let me = Identity::new("u1", "Una", Role::Participant);

        let send = |token: String| {
            let router = build_router(state.clone());
            async move {
                router
                    .oneshot(
                        Request::builder()
                            .uri("/api/notifications")
                            .header("authorization", format!("bearer {token}"))
                            .body(Body::empty())
                            .unwrap(),
                    )
                    .await
                    .unwrap()
                    .status()
            }
        };

        let expired = encode_claims(&secret, &Claims::new(&me, now - 2 * DAY, DAY)).unwrap();
        assert_eq!(send(expired).await, StatusCode::UNAUTHORIZED);

        let fresh = issue_token(&secret, &me, DAY).unwrap();
        assert_eq!(send(fresh).await, StatusCode::OK);
    }
}
