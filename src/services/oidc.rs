// SPDX-License-Identifier: MIT

//! Google OIDC token verification for Cloud Tasks callbacks.
//!
//! Task handlers only accept requests signed by this service's own task
//! service account. Keys come from Google's JWKS endpoint and are cached;
//! a static-key mode exists for deterministic tests.

use anyhow::Context;
use axum::http::HeaderValue;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::Config;

const JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const JWKS_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// Verified Cloud Tasks principal extracted from a valid OIDC token.
#[derive(Debug, Clone)]
pub struct VerifiedTaskPrincipal {
    pub email: String,
    pub subject: String,
}

/// OIDC verification error categories.
#[derive(Debug, Clone)]
pub enum OidcError {
    /// The token is missing/invalid or claims do not match expectations.
    Forbidden(String),
    /// A transient infrastructure failure occurred (safe for task retry).
    Transient(String),
}

impl std::fmt::Display for OidcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OidcError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            OidcError::Transient(msg) => write!(f, "transient: {msg}"),
        }
    }
}

#[derive(Clone)]
enum VerifierMode {
    Google,
    StaticKey {
        kid: String,
        decoding_key: Arc<DecodingKey>,
    },
}

struct JwksCache {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for Cloud Tasks-issued OIDC ID tokens.
pub struct OidcVerifier {
    http: reqwest::Client,
    expected_audience: String,
    expected_service_account_email: String,
    mode: VerifierMode,
    jwks_cache: RwLock<Option<JwksCache>>,
}

impl OidcVerifier {
    /// Production verifier fetching and caching Google's JWKS keys.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building OIDC HTTP client")?;

        Ok(Self {
            http,
            expected_audience: config.api_url.trim_end_matches('/').to_string(),
            expected_service_account_email: format!(
                "voluntree-api@{}.iam.gserviceaccount.com",
                config.gcp_project_id
            ),
            mode: VerifierMode::Google,
            jwks_cache: RwLock::new(None),
        })
    }

    /// Verifier with a static RSA key for deterministic tests.
    pub fn new_with_static_key(
        config: &Config,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            expected_audience: config.api_url.trim_end_matches('/').to_string(),
            expected_service_account_email: format!(
                "voluntree-api@{}.iam.gserviceaccount.com",
                config.gcp_project_id
            ),
            mode: VerifierMode::StaticKey {
                kid: kid.into(),
                decoding_key: Arc::new(decoding_key),
            },
            jwks_cache: RwLock::new(None),
        }
    }

    /// Verify a Cloud Tasks OIDC bearer token from an Authorization header.
    pub async fn verify(
        &self,
        auth_header: Option<&HeaderValue>,
    ) -> Result<VerifiedTaskPrincipal, OidcError> {
        let token = extract_bearer_token(auth_header)?;

        let header = decode_header(token)
            .map_err(|e| OidcError::Forbidden(format!("invalid JWT header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(OidcError::Forbidden(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| OidcError::Forbidden("missing JWT kid".to_string()))?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&["https://accounts.google.com", "accounts.google.com"]);
        validation.set_audience(&[self.expected_audience.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let token_data = decode::<GoogleIdTokenClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(|e| OidcError::Forbidden(format!("JWT validation failed: {e}")))?;
        let claims = token_data.claims;

        let email = claims
            .email
            .ok_or_else(|| OidcError::Forbidden("missing email claim".to_string()))?;
        if email != self.expected_service_account_email {
            return Err(OidcError::Forbidden(format!(
                "unexpected service account email: {email}"
            )));
        }
        if claims.email_verified != Some(true) {
            return Err(OidcError::Forbidden(
                "email_verified claim missing or false".to_string(),
            ));
        }

        Ok(VerifiedTaskPrincipal {
            email,
            subject: claims.sub,
        })
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, OidcError> {
        if let VerifierMode::StaticKey {
            kid: static_kid,
            decoding_key,
        } = &self.mode
        {
            if kid == static_kid {
                return Ok(decoding_key.clone());
            }
            return Err(OidcError::Forbidden(format!(
                "unknown JWT kid for static verifier: {kid}"
            )));
        }

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }
        self.refresh_jwks().await?;
        self.lookup_cached_key(kid)
            .await
            .ok_or_else(|| OidcError::Forbidden(format!("JWT kid not found in JWKS: {kid}")))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > Instant::now())
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self) -> Result<(), OidcError> {
        let response = self
            .http
            .get(JWKS_URL)
            .send()
            .await
            .map_err(|e| OidcError::Transient(format!("JWKS request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(OidcError::Transient(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| OidcError::Transient(format!("invalid JWKS JSON: {e}")))?;

        let mut keys_by_kid = HashMap::new();
        for jwk in jwks.keys {
            if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
                continue;
            }
            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys_by_kid.insert(jwk.kid, Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                }
            }
        }
        if keys_by_kid.is_empty() {
            return Err(OidcError::Transient(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        *self.jwks_cache.write().await = Some(JwksCache {
            keys_by_kid,
            expires_at: Instant::now() + JWKS_CACHE_TTL,
        });
        tracing::debug!("Google JWKS cache refreshed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct GoogleIdTokenClaims {
    #[allow(dead_code)]
    iss: String,
    #[allow(dead_code)]
    aud: String,
    sub: String,
    #[allow(dead_code)]
    exp: usize,
    email: Option<String>,
    email_verified: Option<bool>,
}

fn extract_bearer_token(auth_header: Option<&HeaderValue>) -> Result<&str, OidcError> {
    let value = auth_header
        .ok_or_else(|| OidcError::Forbidden("missing Authorization header".to_string()))?
        .to_str()
        .map_err(|_| OidcError::Forbidden("invalid Authorization header".to_string()))?;

    let token = value.strip_prefix("Bearer ").ok_or_else(|| {
        OidcError::Forbidden("Authorization header must be Bearer token".to_string())
    })?;

    if token.is_empty() {
        return Err(OidcError::Forbidden("Bearer token is empty".to_string()));
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_bearer_token_errors() {
        assert!(matches!(
            extract_bearer_token(None),
            Err(OidcError::Forbidden(_))
        ));

        let bad = HeaderValue::from_static("Basic abc");
        assert!(matches!(
            extract_bearer_token(Some(&bad)),
            Err(OidcError::Forbidden(_))
        ));

        let empty = HeaderValue::from_static("Bearer ");
        assert!(matches!(
            extract_bearer_token(Some(&empty)),
            Err(OidcError::Forbidden(_))
        ));
    }

    #[test]
    fn extract_bearer_token_ok() {
        let good = HeaderValue::from_static("Bearer abc.def.ghi");
        assert_eq!(extract_bearer_token(Some(&good)).unwrap(), "abc.def.ghi");
    }
}
