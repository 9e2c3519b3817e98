//! Binary entry point (C8): builds every component in dependency order,
//! assembles the axum router, and serves until a shutdown signal or the
//! idle monitor fires.

use flaregate_auth::{HmacVerifier, JwksVerifier};
use flaregate_challenge::{ExternalProviderSolver, SolverChain, WaitSolver};
use flaregate_pool::{BrowserPool, PoolConfig};
use flaregate_server::config::GatewayConfig;
use flaregate_server::idle::IdleMonitor;
use flaregate_server::state::AppState;
use flaregate_server::build_router;
use flaregate_session::{SessionManager, SqliteStore};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = GatewayConfig::from_env();
    tracing::info!(port = config.port, pool_capacity = config.pool_capacity, "starting flaregate");

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let store = SqliteStore::connect(&config.session_db_path).await?;

    let sessions = SessionManager::new(config.pool_capacity, config.session_max_idle, Some(store)).await?;

    let pool_config = PoolConfig {
        capacity: config.pool_capacity,
        warm_up: (config.pool_capacity / 2).max(1),
        browser_options: {
            let mut opts = flaregate_core::BrowserOptions::default();
            opts.stealth = Some(!config.disable_stealth);
            if let Some(path) = &config.driver_path {
                opts.executable_path = Some(path.clone());
            }
            opts
        },
        idle_timeout: config.browser_idle_timeout,
        max_age: config.browser_max_age,
        max_requests: config.browser_max_requests,
        ..PoolConfig::default()
    };
    let pool = BrowserPool::new(pool_config).await?;
    pool.wait_ready().await;

    let chain = Arc::new(build_solver_chain(&config));

    let hmac = config.hmac_secret.as_ref().map(|secret| Arc::new(HmacVerifier::new(secret.clone().into_bytes())));
    let jwks = match (&config.jwks_issuer, &config.jwks_url) {
        (Some(issuer), Some(url)) => Some(Arc::new(JwksVerifier::new(issuer.clone(), url.clone()))),
        _ => None,
    };

    let idle = IdleMonitor::new(config.idle_shutdown);
    idle.clone().spawn();

    let state = AppState::new(&config, pool.clone(), sessions.clone(), chain, hmac, jwks, idle.clone());
    let app = build_router(state, metrics_handle);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(idle))
        .await?;

    tracing::info!("shutting down: releasing pool and sessions");
    pool.close().await;
    sessions.close().await;

    Ok(())
}

/// Builds the solver fallback chain: the free wait solver first, then
/// every configured paid provider in the order its API key was found.
fn build_solver_chain(config: &GatewayConfig) -> SolverChain {
    let mut solvers: Vec<Box<dyn flaregate_challenge::Solver>> =
        vec![Box::new(WaitSolver::new(config.challenge_wait))];
    for provider in &config.captcha_providers {
        solvers.push(Box::new(ExternalProviderSolver::new(
            provider.name.clone(),
            provider.api_key.clone(),
            provider.base_url.clone(),
        )));
    }
    SolverChain::new(solvers)
}

/// Resolves on whichever comes first: an OS termination signal, or the
/// idle monitor declaring the process has been quiet long enough.
async fn shutdown_signal(idle: Arc<IdleMonitor>) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let idle_fired = idle.wait_for_shutdown();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
        _ = idle_fired => {
            tracing::info!("idle timeout reached, shutting down");
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flaregate_challenge::{ChallengeKind, SolveParams};
    use flaregate_server::config::ProviderConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn empty_config() -> GatewayConfig {
        GatewayConfig {
            port: 8191,
            pool_capacity: 10,
            browser_idle_timeout: Duration::from_secs(300),
            browser_max_age: Duration::from_secs(1800),
            browser_max_requests: 100,
            challenge_timeout: Duration::from_secs(60),
            challenge_wait: Duration::from_millis(50),
            session_max_idle: Duration::from_secs(600),
            session_db_path: ":memory:".to_string(),
            idle_shutdown: Duration::from_secs(0),
            allow_unauthenticated: false,
            required_feature: None,
            driver_path: None,
            disable_stealth: false,
            hmac_secret: None,
            jwks_issuer: None,
            jwks_url: None,
            captcha_providers: Vec::new(),
        }
    }

    #[tokio::test]
    async fn chain_with_no_providers_only_carries_the_free_wait_solver() {
        let chain = build_solver_chain(&empty_config());
        assert_eq!(chain.cost(ChallengeKind::CfInterstitial), Some(0.0));
        assert_eq!(chain.cost(ChallengeKind::Turnstile), None);
    }

    #[tokio::test]
    async fn chain_dispatches_a_turnstile_challenge_to_the_configured_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/createTask"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "errorId": 0,
                "taskId": 7,
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/getTaskResult"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "errorId": 0,
                "status": "ready",
                "solution": { "token": "mocked-token" },
            })))
            .mount(&server)
            .await;

        let mut config = empty_config();
        config.captcha_providers.push(ProviderConfig {
            name: "2captcha".to_string(),
            api_key: "test-key".to_string(),
            base_url: server.uri(),
        });
        let chain = build_solver_chain(&config);

        let page = flaregate_core::Page::for_tests();
        let params = SolveParams {
            page: &page,
            kind: ChallengeKind::Turnstile,
            site_url: "https://example.com".to_string(),
            timeout: Duration::from_secs(5),
            site_key: Some("0xsitekey".to_string()),
            action: None,
            cdata: None,
        };

        let (solver_name, outcome, cost) = chain.resolve(params).await.unwrap();
        assert_eq!(solver_name, "2captcha");
        assert_eq!(outcome.token.as_deref(), Some("mocked-token"));
        assert_eq!(cost, 0.002);
    }
}
