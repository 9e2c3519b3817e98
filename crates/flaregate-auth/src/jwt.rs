//! Bearer JWT verification against an issuer's JWKS endpoint, with a
//! single-flight refresh-on-unknown-kid cache.

use crate::errors::{AuthError, Result};
use crate::identity::{Identity, IdentitySource};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

const CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    iss: String,
    email: Option<String>,
    #[serde(default)]
    tier: Option<String>,
    #[serde(default)]
    features: Option<Vec<String>>,
    #[serde(default)]
    job_id: Option<String>,
}

struct CachedJwks {
    jwks: JwkSet,
    fetched_at: Instant,
}

impl CachedJwks {
    fn is_stale(&self) -> bool {
        self.fetched_at.elapsed() > CACHE_TTL
    }

    fn has_kid(&self, kid: &str) -> bool {
        self.jwks.find(kid).is_some()
    }
}

/// Verifies Bearer JWTs issued by a single identity provider, caching
/// its JWKS for up to an hour and refreshing early on an unknown key id.
pub struct JwksVerifier {
    issuer: String,
    jwks_url: String,
    client: reqwest::Client,
    cache: RwLock<Option<CachedJwks>>,
    refresh_lock: Mutex<()>,
}

impl JwksVerifier {
    pub fn new(issuer: impl Into<String>, jwks_url: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            jwks_url: jwks_url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client builds with a timeout"),
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    async fn fetch(&self) -> Result<JwkSet> {
        let jwks: JwkSet = self
            .client
            .get(&self.jwks_url)
            .send()
            .await?
            .json()
            .await?;
        Ok(jwks)
    }

    async fn refresh(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        // Another refresh may have completed while we waited for the lock.
        if let Some(cached) = self.cache.read().await.as_ref() {
            if !cached.is_stale() {
                return Ok(());
            }
        }

        let jwks = self.fetch().await?;
        debug!(issuer = %self.issuer, keys = jwks.keys.len(), "refreshed JWKS");
        *self.cache.write().await = Some(CachedJwks {
            jwks,
            fetched_at: Instant::now(),
        });
        Ok(())
    }

    async fn key_for(&self, kid: &str) -> Result<DecodingKey> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if !cached.is_stale() && cached.has_kid(kid) {
                    let jwk = cached.jwks.find(kid).unwrap();
                    return Ok(DecodingKey::from_jwk(jwk)?);
                }
            }
        }

        self.refresh().await?;

        let cache = self.cache.read().await;
        let cached = cache.as_ref().expect("refresh populates the cache");
        let jwk = cached
            .jwks
            .find(kid)
            .ok_or_else(|| AuthError::UnknownKeyId(kid.to_string()))?;
        Ok(DecodingKey::from_jwk(jwk)?)
    }

    /// Verifies a token (with or without a leading `Bearer ` prefix).
    pub async fn verify(&self, token: &str) -> Result<Identity> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();

        let header = decode_header(token)?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::MalformedToken("token is missing a key id".to_string()))?;

        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["sub", "iss"]);

        let data = decode::<Claims>(token, &key, &validation)?;
        let claims = data.claims;

        if claims.iss != self.issuer {
            warn!(issuer = %claims.iss, expected = %self.issuer, "JWT issuer mismatch");
            return Err(AuthError::MalformedToken("issuer mismatch".to_string()));
        }

        Ok(Identity {
            user_id: claims.sub,
            email: claims.email,
            tier: claims
                .tier
                .as_deref()
                .map(crate::identity::strip_tier_prefix)
                .map(str::to_string),
            features: claims.features.unwrap_or_default(),
            job_id: claims.job_id,
            source: IdentitySource::Jwt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn cached_jwks_reports_staleness() {
        let cached = CachedJwks {
            jwks: JwkSet { keys: vec![] },
            fetched_at: Instant::now() - Duration::from_secs(3601),
        };
        assert!(cached.is_stale());
    }

    #[tokio::test]
    async fn verify_fetches_jwks_and_rejects_an_unknown_key_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "keys": [] })))
            .mount(&server)
            .await;

        let verifier = JwksVerifier::new("https://issuer.example.com", format!("{}/.well-known/jwks.json", server.uri()));

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("no-such-key".to_string());
        let token = jsonwebtoken::encode(
            &header,
            &serde_json::json!({ "sub": "user-1", "iss": "https://issuer.example.com" }),
            &EncodingKey::from_secret(b"irrelevant-for-this-test"),
        )
        .unwrap();

        let err = verifier.verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownKeyId(kid) if kid == "no-such-key"));
    }
}
