//! Error types for the flaregate-auth crate.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("signature timestamp is too old or malformed")]
    StaleOrInvalidTimestamp,

    #[error("signature verification failed")]
    SignatureMismatch,

    #[error("token is malformed: {0}")]
    MalformedToken(String),

    #[error("token key id '{0}' was not found in the issuer's JWKS")]
    UnknownKeyId(String),

    #[error("token verification failed: {0}")]
    TokenInvalid(#[from] jsonwebtoken::errors::Error),

    #[error("failed to fetch JWKS: {0}")]
    JwksFetch(#[from] reqwest::Error),

    #[error("no verifier is configured and unauthenticated access is not enabled")]
    NotConfigured,

    #[error("identity lacks required feature: {0}")]
    MissingFeature(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
