//! HMAC-SHA256 verification of internally-signed request headers.

use crate::errors::{AuthError, Result};
use crate::identity::{Identity, IdentitySource};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const REPLAY_WINDOW_SECS: i64 = 300;

/// The raw header values a caller must present for signed-header auth.
#[derive(Debug, Clone, Default)]
pub struct SignedHeaders {
    pub signature: String,
    pub timestamp: String,
    pub user_id: String,
    pub tier: Option<String>,
    pub features: Option<String>,
    pub email: Option<String>,
    pub job_id: Option<String>,
}

/// Verifies an HMAC-signed request and returns the identity it carries.
///
/// The signed message binds the timestamp, user id, tier, features, job
/// id, and a SHA-256 digest of the request body, so the caller must pass
/// the exact bytes that were hashed when the signature was produced.
pub struct HmacVerifier {
    secret: Vec<u8>,
}

impl HmacVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn verify(&self, headers: &SignedHeaders, body: &[u8]) -> Result<Identity> {
        let ts: i64 = headers
            .timestamp
            .parse()
            .map_err(|_| AuthError::StaleOrInvalidTimestamp)?;

        let now = Utc::now().timestamp();
        if (now - ts).abs() > REPLAY_WINDOW_SECS {
            return Err(AuthError::StaleOrInvalidTimestamp);
        }

        let body_hash = hex::encode(Sha256::digest(body));
        let tier = headers.tier.clone().unwrap_or_default();
        let features = headers.features.clone().unwrap_or_default();
        let job_id = headers.job_id.clone().unwrap_or_default();

        let message = format!(
            "{}|{}|{}|{}|{}|{}",
            headers.timestamp, headers.user_id, tier, features, job_id, body_hash
        );

        let signature_bytes =
            hex::decode(&headers.signature).map_err(|_| AuthError::SignatureMismatch)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts a key of any length");
        mac.update(message.as_bytes());
        mac.verify_slice(&signature_bytes)
            .map_err(|_| AuthError::SignatureMismatch)?;

        Ok(Identity {
            user_id: headers.user_id.clone(),
            email: headers.email.clone(),
            tier: headers.tier.as_deref().map(crate::identity::strip_tier_prefix).map(str::to_string),
            features: headers
                .features
                .as_deref()
                .map(|f| f.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
                .unwrap_or_default(),
            job_id: headers.job_id.clone(),
            source: IdentitySource::SignedHeader,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &[u8], message: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn verifies_a_correctly_signed_request() {
        let secret = b"test-secret";
        let verifier = HmacVerifier::new(secret.to_vec());
        let body = b"{}";
        let ts = Utc::now().timestamp().to_string();
        let body_hash = hex::encode(Sha256::digest(body));
        let message = format!("{}|{}|{}|{}|{}|{}", ts, "user-1", "pro", "f1,f2", "job-1", body_hash);
        let signature = sign(secret, &message);

        let headers = SignedHeaders {
            signature,
            timestamp: ts,
            user_id: "user-1".to_string(),
            tier: Some("u:pro".to_string()),
            features: Some("f1, f2".to_string()),
            email: None,
            job_id: Some("job-1".to_string()),
        };

        let identity = verifier.verify(&headers, body).unwrap();
        assert_eq!(identity.user_id, "user-1");
        assert_eq!(identity.tier.as_deref(), Some("pro"));
        assert_eq!(identity.features, vec!["f1", "f2"]);
    }

    #[test]
    fn rejects_a_tampered_signature() {
        let secret = b"test-secret";
        let verifier = HmacVerifier::new(secret.to_vec());
        let ts = Utc::now().timestamp().to_string();

        let headers = SignedHeaders {
            signature: "00".repeat(32),
            timestamp: ts,
            user_id: "user-1".to_string(),
            tier: None,
            features: None,
            email: None,
            job_id: None,
        };

        assert!(matches!(
            verifier.verify(&headers, b"{}"),
            Err(AuthError::SignatureMismatch)
        ));
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let secret = b"test-secret";
        let verifier = HmacVerifier::new(secret.to_vec());
        let stale_ts = (Utc::now().timestamp() - 1000).to_string();

        let headers = SignedHeaders {
            signature: "00".repeat(32),
            timestamp: stale_ts,
            user_id: "user-1".to_string(),
            tier: None,
            features: None,
            email: None,
            job_id: None,
        };

        assert!(matches!(
            verifier.verify(&headers, b"{}"),
            Err(AuthError::StaleOrInvalidTimestamp)
        ));
    }
}
