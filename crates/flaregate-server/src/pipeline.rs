//! FlareSolverr-compatible request/response envelope and the request
//! pipeline that drives a browser through navigation, challenge
//! detection, and resolution on behalf of a caller (C6).

use crate::error::GatewayError;
use crate::state::AppState;
use base64::Engine;
use flaregate_challenge::{detector, ChallengeKind, SolveParams};
use flaregate_core::{Cookie as DriverCookie, Page, PageOptions, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

/// Top-level FlareSolverr-style request body. `cmd` selects the handler;
/// the remaining fields are interpreted according to it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V1Request {
    pub cmd: String,
    pub url: Option<String>,
    #[serde(default)]
    pub post_data: Option<String>,
    #[serde(default)]
    pub max_timeout: Option<u64>,
    #[serde(default)]
    pub proxy: Option<WireProxyConfig>,
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub session_ttl_minutes: Option<u64>,
    #[serde(default)]
    pub cookies: Option<Vec<WireCookie>>,
    #[serde(default)]
    pub return_only_cookies: Option<bool>,
    #[serde(default)]
    pub screenshot: Option<bool>,
    /// Deprecated FlareSolverr fields, accepted and ignored rather than
    /// rejected, matching the upstream protocol's own tolerance.
    #[serde(default)]
    pub headers: Option<serde_json::Value>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub download: Option<bool>,
    #[serde(default)]
    pub return_raw_html: Option<bool>,
    #[serde(default)]
    pub wait: Option<WaitCondition>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct WaitCondition {
    pub selector: Option<String>,
    pub delay_ms: Option<u64>,
    pub network_idle: Option<bool>,
    pub load: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WireProxyConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WireCookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<f64>,
    pub http_only: Option<bool>,
    pub secure: Option<bool>,
    pub same_site: Option<String>,
}

impl WireCookie {
    fn into_driver_cookie(self, fallback_domain: &str) -> DriverCookie {
        DriverCookie {
            name: self.name,
            value: self.value,
            domain: self.domain.unwrap_or_else(|| fallback_domain.to_string()),
            path: self.path.unwrap_or_else(|| "/".to_string()),
            expires: self.expires,
            http_only: self.http_only,
            secure: self.secure,
            same_site: self.same_site.and_then(|s| match s.as_str() {
                "Strict" => Some(SameSite::Strict),
                "Lax" => Some(SameSite::Lax),
                "None" => Some(SameSite::None),
                _ => None,
            }),
        }
    }

    fn from_driver_cookie(c: DriverCookie) -> Self {
        Self {
            name: c.name,
            value: c.value,
            domain: Some(c.domain),
            path: Some(c.path),
            expires: c.expires,
            http_only: c.http_only,
            secure: c.secure,
            same_site: c.same_site.map(|s| match s {
                SameSite::Strict => "Strict".to_string(),
                SameSite::Lax => "Lax".to_string(),
                SameSite::None => "None".to_string(),
            }),
        }
    }
}

/// The per-request cost breakdown reported alongside a solution, naming
/// which solver (if any) was invoked and what it cost.
#[derive(Debug, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UsageBlock {
    pub browser_time_ms: u64,
    pub solver_cost: f64,
    pub solver_name: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResolutionResult {
    pub url: String,
    pub status: u16,
    pub headers: serde_json::Value,
    pub response: Option<String>,
    pub cookies: Vec<WireCookie>,
    pub user_agent: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct V1Response {
    pub status: String,
    pub message: String,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<ChallengeResolutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_type: Option<ChallengeKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenged: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageBlock>,
}

impl V1Response {
    fn ok(message: impl Into<String>, start: i64) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            start_timestamp: start,
            end_timestamp: chrono::Utc::now().timestamp_millis(),
            version: crate::state::VERSION.to_string(),
            solution: None,
            challenge_type: None,
            solver_used: None,
            challenged: None,
            solved: None,
            method: None,
            session: None,
            sessions: None,
            usage: None,
        }
    }

    /// Used both by the dispatcher's explicit error replies and by
    /// `GatewayError`'s `IntoResponse` impl.
    pub fn error(message: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            status: "error".to_string(),
            message: message.into(),
            start_timestamp: now,
            end_timestamp: now,
            version: crate::state::VERSION.to_string(),
            solution: None,
            challenge_type: None,
            solver_used: None,
            challenged: None,
            solved: None,
            method: None,
            session: None,
            sessions: None,
            usage: None,
        }
    }
}

/// Dispatches a decoded request to the handler named by `cmd`.
pub async fn handle(state: &AppState, req: V1Request, cancel: CancellationToken) -> Result<V1Response, GatewayError> {
    let start = chrono::Utc::now().timestamp_millis();

    match req.cmd.as_str() {
        "sessions.create" => handle_sessions_create(state, req, start).await,
        "sessions.list" => handle_sessions_list(state, start).await,
        "sessions.destroy" => handle_sessions_destroy(state, req, start).await,
        "request.get" | "request.post" => handle_request(state, req, start, cancel).await,
        other => Err(GatewayError::InvalidRequest(format!("unknown command '{other}'"))),
    }
}

async fn handle_sessions_create(state: &AppState, req: V1Request, start: i64) -> Result<V1Response, GatewayError> {
    let name = req.session.ok_or_else(|| GatewayError::InvalidRequest("session name required".to_string()))?;

    let opts = flaregate_session::SessionOptions {
        headless: Some(true),
        window_width: None,
        window_height: None,
        proxy_url: req.proxy.as_ref().map(|p| p.url.clone()),
        user_agent: req.user_agent,
    };

    let created = state.sessions.create(&name, opts).await?;
    let mut resp = V1Response::ok("Session created successfully.", start);
    resp.session = Some(created);
    Ok(resp)
}

async fn handle_sessions_list(state: &AppState, start: i64) -> Result<V1Response, GatewayError> {
    let mut resp = V1Response::ok("", start);
    resp.sessions = Some(state.sessions.list().await);
    Ok(resp)
}

async fn handle_sessions_destroy(state: &AppState, req: V1Request, start: i64) -> Result<V1Response, GatewayError> {
    let name = req.session.ok_or_else(|| GatewayError::InvalidRequest("session name required".to_string()))?;
    state.sessions.destroy(&name).await?;
    Ok(V1Response::ok("Session destroyed successfully.", start))
}

/// A held resource: either a leased browser (fresh page created for this
/// one request) or a named session's page, plus what's needed to give it
/// back on every exit path.
enum Held {
    Pooled(flaregate_pool::Leased),
    Session(flaregate_session::Leased),
}

struct Resolution {
    solution: ChallengeResolutionResult,
    usage: UsageBlock,
    kind: ChallengeKind,
    method: Option<String>,
}

async fn handle_request(
    state: &AppState,
    req: V1Request,
    start: i64,
    cancel: CancellationToken,
) -> Result<V1Response, GatewayError> {
    let url_str = req.url.clone().ok_or_else(|| GatewayError::InvalidRequest("url required".to_string()))?;
    let parsed = Url::parse(&url_str).map_err(|e| GatewayError::InvalidRequest(format!("invalid url: {e}")))?;
    let fallback_domain = parsed.host_str().unwrap_or_default().to_string();

    let timeout = req
        .max_timeout
        .map(Duration::from_millis)
        .unwrap_or(state.challenge_timeout)
        .min(state.challenge_timeout);

    let had_session = req.session.is_some();
    let browser_clock = Instant::now();

    // 1. Resource acquisition: a named session's page, or a fresh stealth
    // page from a pool-leased browser. Every branch below must release
    // its hold before returning, success or failure.
    let (held, page) = match &req.session {
        Some(name) => {
            if let Some(minutes) = req.session_ttl_minutes {
                state.sessions.set_ttl(name, Duration::from_secs(minutes * 60)).await;
            }
            let leased = state.sessions.acquire(name, &cancel).await?;
            let page = leased.page.clone();
            (Held::Session(leased), page)
        }
        None => {
            let leased = state.pool.acquire(&cancel).await?;
            let context = leased.browser.new_context().await.map_err(GatewayError::from)?;
            let user_agent = req.user_agent.clone().or_else(|| realistic_user_agent(&url_str));
            let page = Arc::new(
                context
                    .new_page_with_options(PageOptions {
                        user_agent,
                        ..PageOptions::default()
                    })
                    .await
                    .map_err(GatewayError::from)?,
            );
            (Held::Pooled(leased), page)
        }
    };

    // `run_request` drives navigation, detection, and solving — none of
    // which check `cancel` on their own — so it is itself bounded by the
    // same deadline rather than relying solely on the caller's wrapping.
    let result = match tokio::time::timeout(
        timeout,
        run_request(state, &page, &url_str, &fallback_domain, &req, timeout, had_session),
    )
    .await
    {
        Ok(r) => r,
        Err(_) => Err(GatewayError::DeadlineExceeded),
    };

    // Guaranteed release regardless of how `run_request` concluded.
    match held {
        Held::Pooled(leased) => state.pool.release(leased).await,
        Held::Session(leased) => {
            if let Err(e) = state.sessions.release(leased).await {
                warn!(error = %e, "failed to release session after request");
            }
        }
    }

    let resolution = result?;
    let mut resp = V1Response::ok("Challenge solved.", start);
    resp.session = req.session;
    resp.challenge_type = Some(resolution.kind);
    resp.solver_used = resolution.usage.solver_name.clone();
    resp.challenged = Some(resolution.kind != ChallengeKind::None);
    resp.solved = Some(true);
    resp.method = resolution.method;
    resp.solution = Some(resolution.solution);
    resp.usage = Some(UsageBlock {
        browser_time_ms: browser_clock.elapsed().as_millis() as u64,
        ..resolution.usage
    });
    Ok(resp)
}

async fn run_request(
    state: &AppState,
    page: &Arc<Page>,
    url: &str,
    fallback_domain: &str,
    req: &V1Request,
    timeout: Duration,
    had_session: bool,
) -> Result<Resolution, GatewayError> {
    // 2. Cookie seeding, before navigation. Failures are logged, non-fatal.
    if let Some(cookies) = &req.cookies {
        let driver_cookies: Vec<DriverCookie> = cookies
            .iter()
            .cloned()
            .map(|c| c.into_driver_cookie(fallback_domain))
            .collect();
        if !driver_cookies.is_empty() {
            if let Err(e) = page.set_cookies(&driver_cookies).await {
                warn!(error = %e, "failed to seed cookies, continuing");
            }
        }
    }

    // 3. User-agent override. For freshly-created pages this already
    // happened via `PageOptions`; nothing further to set here.

    // 4. Navigation: fatal on failure.
    page.goto(url).await.map_err(GatewayError::from)?;

    // 5. Detection.
    let detection = detector::detect(page).await.map_err(GatewayError::from)?;
    let kind = detection.kind;

    // 6. Resolution.
    let mut usage = UsageBlock::default();
    let mut method = None;
    if kind != ChallengeKind::None {
        let (solver_name, outcome, cost) = state
            .chain
            .resolve(SolveParams {
                page,
                kind,
                site_url: url.to_string(),
                timeout,
                site_key: detection.site_key.clone(),
                action: detection.action.clone(),
                cdata: detection.cdata.clone(),
            })
            .await
            .map_err(GatewayError::from)?;

        if let Some(token) = &outcome.token {
            inject_token(page, kind, token).await.map_err(GatewayError::from)?;
            tokio::time::sleep(Duration::from_secs(2)).await;
        }

        method = Some(solver_name.clone());
        usage.solver_name = Some(solver_name);
        usage.solver_cost = cost;
    } else if had_session {
        method = Some("cached".to_string());
    }

    // 7. Optional wait condition, in order {selector, delay, network-idle,
    // load}. Each sub-wait is bounded; failures log-and-continue.
    if let Some(wait) = &req.wait {
        if let Some(selector) = &wait.selector {
            if let Err(e) = page.wait_for_selector(selector, Some(timeout.as_millis() as u64)).await {
                warn!(error = %e, selector, "wait-for-selector failed, continuing");
            }
        }
        if let Some(delay_ms) = wait.delay_ms {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        if wait.network_idle.unwrap_or(false) {
            if let Err(e) = wait_for_network_idle(page, timeout).await {
                warn!(error = %e, "network-idle wait failed, continuing");
            }
        }
        if wait.load.unwrap_or(false) {
            if let Err(e) = page.goto(url).await {
                warn!(error = %e, "load wait re-navigation failed, continuing");
            }
        }
    }

    // 8. Readout.
    let html = page.content().await.map_err(GatewayError::from)?;
    let final_url = page.url().await.map_err(GatewayError::from)?;
    let user_agent = page.user_agent().await.unwrap_or_default();
    let cookies = page.cookies().await.map_err(GatewayError::from)?;
    let title = page.title().await.unwrap_or_default();

    let screenshot = if req.screenshot.unwrap_or(false) {
        match page.screenshot_bytes().await {
            Ok(bytes) => Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
            Err(e) => {
                warn!(error = %e, "screenshot capture failed, omitting from response");
                None
            }
        }
    } else {
        None
    };

    let include_body = !req.return_only_cookies.unwrap_or(false);

    let solution = ChallengeResolutionResult {
        url: final_url,
        status: 200,
        headers: serde_json::json!({}),
        response: if include_body { Some(html) } else { None },
        cookies: cookies.into_iter().map(WireCookie::from_driver_cookie).collect(),
        user_agent,
        title,
        screenshot,
    };

    info!(kind = ?kind, solver = ?usage.solver_name, "request resolved");

    // 9. Response assembled by the caller.
    Ok(Resolution { solution, usage, kind, method })
}

/// Generates a realistic default user agent for freshly-created pages
/// the caller didn't pin to a specific one. Best-effort: a generation
/// failure just leaves the page on its driver default.
fn realistic_user_agent(url: &str) -> Option<String> {
    flaregate_headers::get_header(url, None)
        .ok()
        .map(|h| h.user_agent.to_string())
}

async fn wait_for_network_idle(page: &Page, timeout: Duration) -> flaregate_core::Result<()> {
    let script = "document.readyState === 'complete'";
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        let done: bool = page.evaluate(script).await?;
        if done {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    Ok(())
}

/// Injects a solved token into the DOM input(s) the target page expects
/// and fires any registered JS callback, per challenge kind.
async fn inject_token(page: &Page, kind: ChallengeKind, token: &str) -> flaregate_core::Result<()> {
    let selectors: &[&str] = match kind {
        ChallengeKind::Turnstile => &["[name=\"cf-turnstile-response\"]"],
        ChallengeKind::HCaptcha => &["[name=\"h-captcha-response\"]", "[name=\"g-recaptcha-response\"]"],
        ChallengeKind::RecaptchaV2 | ChallengeKind::RecaptchaV3 => &["[name=\"g-recaptcha-response\"]"],
        ChallengeKind::CfJs
        | ChallengeKind::CfInterstitial
        | ChallengeKind::DdosGuard
        | ChallengeKind::Unknown
        | ChallengeKind::None => return Ok(()),
    };

    for selector in selectors {
        let script = format!(
            r#"(function() {{
                const el = document.querySelector('{selector}');
                if (el) {{
                    el.value = '{token}';
                    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                }}
                if (typeof window.turnstileCallback === 'function') {{ window.turnstileCallback('{token}'); }}
                if (typeof window.hcaptchaCallback === 'function') {{ window.hcaptchaCallback('{token}'); }}
                if (typeof window.grecaptchaCallback === 'function') {{ window.grecaptchaCallback('{token}'); }}
                return true;
            }})()"#
        );
        let _: bool = page.evaluate(&script).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn wire_cookie_round_trips_through_driver_cookie() {
        let wire = WireCookie {
            name: "sid".to_string(),
            value: "abc".to_string(),
            domain: None,
            path: None,
            expires: Some(1234.0),
            http_only: Some(true),
            secure: Some(true),
            same_site: Some("Lax".to_string()),
        };
        let driver = wire.clone().into_driver_cookie("example.com");
        assert_eq!(driver.domain, "example.com");
        assert_eq!(driver.path, "/");
        assert!(matches!(driver.same_site, Some(SameSite::Lax)));

        let back = WireCookie::from_driver_cookie(driver);
        assert_eq!(back.name, "sid");
        assert_eq!(back.same_site.as_deref(), Some("Lax"));
    }

    #[test]
    fn error_response_has_error_status_and_no_solution() {
        let resp = V1Response::error("boom");
        assert_eq!(resp.status, "error");
        assert!(resp.solution.is_none());
        assert_eq!(resp.message, "boom");
    }
}
