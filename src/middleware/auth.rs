// SPDX-License-Identifier: MIT

//! JWT authentication middleware.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session cookie set after sign-in.
pub const SESSION_COOKIE: &str = "voluntree_token";

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (member uid)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    /// Display name from the identity provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Custom claim: platform administrator
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub admin: bool,
    /// Custom claim: organization this account manages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
}

/// Authenticated member extracted from the session JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub admin: bool,
    pub org_id: Option<String>,
}

impl AuthUser {
    /// Whether the caller may manage the given organization.
    pub fn manages_org(&self, org_id: &str) -> bool {
        self.admin || self.org_id.as_deref() == Some(org_id)
    }
}

/// Middleware that requires valid JWT authentication.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Try cookie first, then header
    let token = if let Some(cookie) = jar.get(SESSION_COOKIE) {
        cookie.value().to_string()
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header {
            Some(h) if h.starts_with("Bearer ") => h[7..].to_string(),
            _ => return Err(StatusCode::UNAUTHORIZED),
        }
    };

    let key = DecodingKey::from_secret(&state.config.jwt_signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data =
        decode::<Claims>(&token, &key, &validation).map_err(|_| StatusCode::UNAUTHORIZED)?;
    let claims = token_data.claims;

    if claims.sub.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let auth_user = AuthUser {
        uid: claims.sub,
        name: claims.name,
        email: claims.email,
        admin: claims.admin,
        org_id: claims.org_id,
    };
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Create a JWT for a member session.
pub fn create_jwt(uid: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    create_scoped_jwt(uid, None, None, false, None, signing_key)
}

/// Create a JWT carrying identity fields and custom claims.
pub fn create_scoped_jwt(
    uid: &str,
    name: Option<&str>,
    email: Option<&str>,
    admin: bool,
    org_id: Option<&str>,
    signing_key: &[u8],
) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: uid.to_string(),
        iat: now,
        exp: now + 30 * 24 * 60 * 60, // 30 days
        name: name.map(String::from),
        email: email.map(String::from),
        admin,
        org_id: org_id.map(String::from),
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn org_management_requires_matching_claim() {
        let plain = AuthUser {
            uid: "m1".to_string(),
            name: None,
            email: None,
            admin: false,
            org_id: None,
        };
        assert!(!plain.manages_org("o1"));

        let manager = AuthUser {
            org_id: Some("o1".to_string()),
            ..plain.clone()
        };
        assert!(manager.manages_org("o1"));
        assert!(!manager.manages_org("o2"));

        let admin = AuthUser {
            admin: true,
            ..plain
        };
        assert!(admin.manages_org("o1"));
    }

    #[test]
    fn jwt_roundtrip_preserves_claims() {
        let key = b"test_jwt_key_32_bytes_minimum!!";
        let token = create_scoped_jwt(
            "m1",
            Some("Ada"),
            Some("ada@example.com"),
            true,
            Some("o1"),
            key,
        )
        .unwrap();

        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(key),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();

        assert_eq!(decoded.claims.sub, "m1");
        assert_eq!(decoded.claims.name.as_deref(), Some("Ada"));
        assert!(decoded.claims.admin);
        assert_eq!(decoded.claims.org_id.as_deref(), Some("o1"));
    }
}
