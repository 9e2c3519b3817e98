//! Shared application state handed to every axum handler.

use crate::config::GatewayConfig;
use crate::idle::IdleMonitor;
use flaregate_auth::{HmacVerifier, JwksVerifier};
use flaregate_challenge::SolverChain;
use flaregate_pool::BrowserPool;
use flaregate_session::SessionManager;
use std::sync::Arc;
use std::time::Duration;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<BrowserPool>,
    pub sessions: Arc<SessionManager>,
    pub chain: Arc<SolverChain>,
    pub hmac: Option<Arc<HmacVerifier>>,
    pub jwks: Option<Arc<JwksVerifier>>,
    pub allow_unauthenticated: bool,
    pub required_feature: Option<String>,
    pub challenge_timeout: Duration,
    pub idle: Arc<IdleMonitor>,
}

impl AppState {
    pub fn new(
        config: &GatewayConfig,
        pool: Arc<BrowserPool>,
        sessions: Arc<SessionManager>,
        chain: Arc<SolverChain>,
        hmac: Option<Arc<HmacVerifier>>,
        jwks: Option<Arc<JwksVerifier>>,
        idle: Arc<IdleMonitor>,
    ) -> Self {
        Self {
            pool,
            sessions,
            chain,
            hmac,
            jwks,
            allow_unauthenticated: config.allow_unauthenticated,
            required_feature: config.required_feature.clone(),
            challenge_timeout: config.challenge_timeout,
            idle,
        }
    }
}
