//! Identity verification for the gateway's two accepted caller types:
//! HMAC-signed internal headers from the scraping platform, and Bearer
//! JWTs validated against an identity provider's JWKS.
//!
//! This crate is deliberately framework-agnostic — it has no dependency
//! on axum or any HTTP server. Header extraction, route bypass lists,
//! and middleware wiring live in the server crate; this crate only
//! answers "is this caller who they claim to be, and what can they do."

mod errors;
mod identity;
mod jwt;
mod signed;

pub use errors::{AuthError, Result};
pub use identity::{strip_tier_prefix, Identity, IdentitySource};
pub use jwt::JwksVerifier;
pub use signed::{HmacVerifier, SignedHeaders};
