//! # Google service-account token exchange
//!
//! Implements the OAuth 2.0 JWT-bearer grant (RFC 7523) that Google uses for
//! service accounts. No user is involved: the service signs a short assertion
//! with its own private key and trades it for a bearer token.
//!
//! ## Flow
//!
//! 1. **[`sign_assertion`](ServiceAccountAuth::sign_assertion)** — builds the claim set
//!    (`iss` = service account email, `scope` = spreadsheets, `aud` = token endpoint,
//!    `iat` = now, `exp` = now + [`ASSERTION_LIFETIME_SECS`]) and signs it with RS256.
//!
//! 2. **[`acquire_token`](ServiceAccountAuth::acquire_token)** — form-posts
//!    `grant_type=urn:ietf:params:oauth:grant-type:jwt-bearer` and the assertion to the
//!    token endpoint and parses the standard token response. Non-2xx responses are
//!    decoded as OAuth error bodies where possible.
//!
//! 3. **[`get_valid_token`](ServiceAccountAuth::get_valid_token)** — optional cache in
//!    front of step 2. It keeps the last issued [`Credential`] and exchanges again only
//!    when it is within a minute of expiring.
//!
//! [`token`](ServiceAccountAuth::token) picks between 2 and 3 according to
//! [`ServiceAccountConfig::cache_tokens`]. Without the cache every call is a fresh
//! exchange, which is fine at this service's request volume.

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use oauth2::basic::{BasicErrorResponse, BasicTokenResponse};
use oauth2::{AccessToken, TokenResponse};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::config::ServiceAccountConfig;
use super::AuthError;

/// Lifetime requested for each signed assertion.
pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Cached tokens are refreshed this long before they expire.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Claim set of the signed assertion.
#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// A bearer token and the moment it stops being valid.
#[derive(Debug, Clone)]
pub struct Credential {
    token: AccessToken,
    expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(secret: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: AccessToken::new(secret),
            expires_at,
        }
    }

    pub fn secret(&self) -> &str {
        self.token.secret()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token can still be used at `now`, leaving a refresh margin.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Token provider for a single service account.
pub struct ServiceAccountAuth {
    config: ServiceAccountConfig,
    http: Client,
    cached: Mutex<Option<Credential>>,
}

impl ServiceAccountAuth {
    pub fn new(config: ServiceAccountConfig, http: Client) -> Self {
        Self {
            config,
            http,
            cached: Mutex::new(None),
        }
    }

    /// A credential for the next round of store calls, cached or fresh per config.
    pub async fn token(&self) -> Result<Credential, AuthError> {
        if self.config.cache_tokens {
            self.get_valid_token().await
        } else {
            self.acquire_token().await
        }
    }

    /// Build and sign the JWT assertion for `now`.
    pub fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: &self.config.key.client_email,
            scope: &self.config.scope,
            aud: self.config.token_url.as_str(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let key = EncodingKey::from_rsa_pem(self.config.key.private_key.as_bytes())
            .map_err(|e| AuthError::InvalidKey(e.to_string()))?;

        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Exchange a freshly signed assertion for a new credential.
    pub async fn acquire_token(&self) -> Result<Credential, AuthError> {
        let now = Utc::now();
        let assertion = self.sign_assertion(now)?;

        let response = self
            .http
            .post(self.config.token_url.as_str())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<BasicErrorResponse>(&body) {
                Ok(oauth_error) => oauth_error.to_string(),
                Err(_) => body,
            };
            warn!(status = status.as_u16(), %detail, "token exchange rejected");
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let token: BasicTokenResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::MissingToken(e.to_string()))?;

        let secret = token.access_token().secret();
        if secret.is_empty() {
            return Err(AuthError::MissingToken("access_token is empty".to_string()));
        }

        let lifetime = token
            .expires_in()
            .and_then(|d| TimeDelta::from_std(d).ok())
            .unwrap_or_else(|| TimeDelta::seconds(ASSERTION_LIFETIME_SECS));

        debug!(expires_in = lifetime.num_seconds(), "acquired access token");
        Ok(Credential::new(secret.clone(), now + lifetime))
    }

    /// Return the cached credential while it is fresh, otherwise exchange a new one.
    pub async fn get_valid_token(&self) -> Result<Credential, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(credential) = cached.as_ref() {
            if credential.is_fresh_at(Utc::now()) {
                return Ok(credential.clone());
            }
        }
        let credential = self.acquire_token().await?;
        *cached = Some(credential.clone());
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ServiceAccountKey;
    use httpmock::prelude::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use serde::Deserialize;

    const TEST_KEY: &str = include_str!("../../tests/fixtures/service_account_key.pem");

    const GRANT_FORM: &str = "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer";

    fn auth_for(server: &MockServer, cache: bool) -> ServiceAccountAuth {
        let key = ServiceAccountKey {
            client_email: "ledger@test.iam.gserviceaccount.com".to_string(),
            private_key: TEST_KEY.to_string(),
            token_uri: Some(server.url("/token")),
        };
        let config = ServiceAccountConfig::new(key).unwrap().with_cache(cache);
        ServiceAccountAuth::new(config, Client::new())
    }

    #[derive(Debug, Deserialize)]
    struct DecodedClaims {
        iss: String,
        scope: String,
        aud: String,
        iat: i64,
        exp: i64,
    }

    #[tokio::test]
    async fn test_assertion_claims() {
        let server = MockServer::start_async().await;
        let auth = auth_for(&server, false);
        let now = Utc::now();

        let jwt = auth.sign_assertion(now).unwrap();

        let header = jsonwebtoken::decode_header(&jwt).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);

        // Only the claim values matter here, not the signature.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.insecure_disable_signature_validation();
        validation.set_audience(&[server.url("/token")]);
        let claims = decode::<DecodedClaims>(&jwt, &DecodingKey::from_secret(b""), &validation)
            .unwrap()
            .claims;

        assert_eq!(claims.iss, "ledger@test.iam.gserviceaccount.com");
        assert_eq!(claims.scope, crate::auth::SPREADSHEETS_SCOPE);
        assert_eq!(claims.aud, server.url("/token"));
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp - claims.iat, ASSERTION_LIFETIME_SECS);
    }

    #[tokio::test]
    async fn test_acquire_token_posts_jwt_bearer_grant() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/token")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body_contains(GRANT_FORM)
                    .body_contains("assertion=");
                then.status(200).json_body(serde_json::json!({
                    "access_token": "ya29.test",
                    "token_type": "Bearer",
                    "expires_in": 3599
                }));
            })
            .await;
        let auth = auth_for(&server, false);

        let credential = auth.acquire_token().await.unwrap();

        assert_eq!(credential.secret(), "ya29.test");
        assert!(credential.is_fresh_at(Utc::now()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_exchange_is_auth_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(400).json_body(serde_json::json!({
                    "error": "invalid_grant",
                    "error_description": "Invalid JWT Signature."
                }));
            })
            .await;
        let auth = auth_for(&server, false);

        let err = auth.acquire_token().await.unwrap_err();

        match err {
            AuthError::Rejected { status, detail } => {
                assert_eq!(status, 400);
                assert!(detail.contains("invalid_grant"), "{}", detail);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_response_without_token_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200).json_body(serde_json::json!({ "token_type": "Bearer" }));
            })
            .await;
        let auth = auth_for(&server, false);

        let err = auth.acquire_token().await.unwrap_err();

        assert!(matches!(err, AuthError::MissingToken(_)));
    }

    #[tokio::test]
    async fn test_without_cache_every_call_exchanges() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200).json_body(serde_json::json!({
                    "access_token": "ya29.fresh",
                    "token_type": "Bearer",
                    "expires_in": 3600
                }));
            })
            .await;
        let auth = auth_for(&server, false);

        auth.token().await.unwrap();
        auth.token().await.unwrap();

        assert_eq!(mock.hits_async().await, 2);
    }

    #[tokio::test]
    async fn test_cache_reuses_fresh_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200).json_body(serde_json::json!({
                    "access_token": "ya29.cached",
                    "token_type": "Bearer",
                    "expires_in": 3600
                }));
            })
            .await;
        let auth = auth_for(&server, true);

        let first = auth.token().await.unwrap();
        let second = auth.token().await.unwrap();

        assert_eq!(first.secret(), second.secret());
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_cache_refreshes_near_expiry() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200).json_body(serde_json::json!({
                    "access_token": "ya29.short",
                    "token_type": "Bearer",
                    "expires_in": 30
                }));
            })
            .await;
        let auth = auth_for(&server, true);

        // 30s lifetime is inside the refresh margin, so nothing is reused.
        auth.token().await.unwrap();
        auth.token().await.unwrap();

        assert_eq!(mock.hits_async().await, 2);
    }

    #[test]
    fn test_invalid_pem_is_reported() {
        let key = ServiceAccountKey {
            client_email: "a@b".to_string(),
            private_key: "not a key".to_string(),
            token_uri: None,
        };
        let auth = ServiceAccountAuth::new(ServiceAccountConfig::new(key).unwrap(), Client::new());
        assert!(matches!(
            auth.sign_assertion(Utc::now()),
            Err(AuthError::InvalidKey(_))
        ));
    }
}
