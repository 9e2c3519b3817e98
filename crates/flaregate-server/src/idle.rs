//! Per-process activity tracking that signals graceful shutdown after a
//! configured span of inactivity (C5). Health-check traffic is invisible
//! to the tracker so a load balancer's probes never reset the clock.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::info;

const HEALTH_PATHS: [&str; 4] = ["/health", "/healthz", "/livez", "/readyz"];
const HEALTH_USER_AGENT_MARKER: &str = "HealthCheck";
const POLL_INTERVAL: Duration = Duration::from_secs(10);

fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

/// True when a request should be excluded from idle accounting.
pub fn is_health_check(path: &str, user_agent: Option<&str>) -> bool {
    HEALTH_PATHS.contains(&path)
        || user_agent
            .map(|ua| ua.contains(HEALTH_USER_AGENT_MARKER))
            .unwrap_or(false)
}

/// Tracks inbound activity and fires a one-shot shutdown signal after
/// `timeout` has elapsed with zero active requests. Disabled entirely
/// when `timeout` is zero.
pub struct IdleMonitor {
    last_request_at: AtomicI64,
    active_request_count: AtomicI64,
    timeout: Duration,
    shutdown: Notify,
    shutdown_fired: AtomicBool,
}

impl IdleMonitor {
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            last_request_at: AtomicI64::new(now_epoch()),
            active_request_count: AtomicI64::new(0),
            timeout,
            shutdown: Notify::new(),
            shutdown_fired: AtomicBool::new(false),
        })
    }

    pub fn enabled(&self) -> bool {
        !self.timeout.is_zero()
    }

    /// Records entry into a handler. Returns whether this request counted
    /// as activity (callers must pass the same value back to `on_exit`).
    pub fn on_enter(&self, path: &str, user_agent: Option<&str>) -> bool {
        if is_health_check(path, user_agent) {
            return false;
        }
        self.active_request_count.fetch_add(1, Ordering::SeqCst);
        self.last_request_at.store(now_epoch(), Ordering::SeqCst);
        true
    }

    pub fn on_exit(&self, counted: bool) {
        if counted {
            self.active_request_count.fetch_sub(1, Ordering::SeqCst);
            self.last_request_at.store(now_epoch(), Ordering::SeqCst);
        }
    }

    /// Blocks until the idle-shutdown signal fires. Never resolves if
    /// idle-shutdown is disabled.
    pub async fn wait_for_shutdown(&self) {
        if self.shutdown_fired.load(Ordering::SeqCst) {
            return;
        }
        self.shutdown.notified().await;
    }

    /// Spawns the polling task. A no-op when idle-shutdown is disabled.
    pub fn spawn(self: Arc<Self>) {
        if !self.enabled() {
            return;
        }

        tokio::spawn(async move {
            let poll_interval = (self.timeout / 4).clamp(Duration::from_millis(50), POLL_INTERVAL);
            let mut interval = tokio::time::interval(poll_interval);
            loop {
                interval.tick().await;

                let idle_for = now_epoch() - self.last_request_at.load(Ordering::SeqCst);
                let active = self.active_request_count.load(Ordering::SeqCst);

                if idle_for as u64 > self.timeout.as_secs() && active == 0 {
                    info!(idle_for, "idle timeout reached with no active requests, signalling shutdown");
                    self.shutdown_fired.store(true, Ordering::SeqCst);
                    self.shutdown.notify_waiters();
                    break;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_paths_are_recognized() {
        assert!(is_health_check("/health", None));
        assert!(is_health_check("/healthz", Some("curl/8.0")));
        assert!(is_health_check("/v1", Some("Mozilla/5.0 HealthCheck/1.0")));
        assert!(!is_health_check("/v1", Some("Mozilla/5.0")));
    }

    #[tokio::test]
    async fn disabled_monitor_never_signals_shutdown() {
        let monitor = IdleMonitor::new(Duration::ZERO);
        assert!(!monitor.enabled());
        monitor.clone().spawn();
        // No task was spawned; wait_for_shutdown would hang forever, so we
        // just assert the monitor reports itself disabled.
    }

    #[tokio::test]
    async fn enter_and_exit_balance_the_active_count() {
        let monitor = IdleMonitor::new(Duration::from_secs(60));
        let counted = monitor.on_enter("/v1", Some("curl/8.0"));
        assert!(counted);
        assert_eq!(monitor.active_request_count.load(Ordering::SeqCst), 1);
        monitor.on_exit(counted);
        assert_eq!(monitor.active_request_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn health_check_requests_do_not_affect_active_count() {
        let monitor = IdleMonitor::new(Duration::from_secs(60));
        let counted = monitor.on_enter("/health", None);
        assert!(!counted);
        assert_eq!(monitor.active_request_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn short_idle_timeout_fires_shutdown_once_quiet() {
        let monitor = IdleMonitor::new(Duration::from_secs(1));
        monitor.clone().spawn();

        tokio::time::timeout(Duration::from_secs(5), monitor.wait_for_shutdown())
            .await
            .expect("idle monitor did not signal shutdown within the backstop window");
    }

    #[tokio::test]
    async fn active_request_suppresses_shutdown_until_released() {
        let monitor = IdleMonitor::new(Duration::from_secs(1));
        let counted = monitor.on_enter("/v1", None);
        monitor.clone().spawn();

        let fired = tokio::time::timeout(Duration::from_secs(2), monitor.wait_for_shutdown()).await;
        assert!(fired.is_err(), "monitor must not shut down while a request is active");

        monitor.on_exit(counted);
        tokio::time::timeout(Duration::from_secs(5), monitor.wait_for_shutdown())
            .await
            .expect("idle monitor did not signal shutdown after the active request finished");
    }
}
