//! A pool of warm browser instances, handed out FIFO to concurrent
//! requests and recycled on age/use/health limits.

use flaregate_core::{Browser, BrowserOptions, Driver};
use metrics::gauge;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{oneshot, Mutex, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("pool is closed")]
    Closed,

    #[error("acquire was cancelled")]
    Cancelled,

    #[error("driver error: {0}")]
    Driver(#[from] flaregate_core::Error),
}

pub type Result<T> = std::result::Result<T, PoolError>;

/// Configuration governing pool sizing and browser recycling.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub capacity: usize,
    pub warm_up: usize,
    pub browser_type: String,
    pub browser_options: BrowserOptions,
    pub idle_timeout: Duration,
    pub max_age: Duration,
    pub max_requests: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            warm_up: 0,
            browser_type: "chromium".to_string(),
            browser_options: BrowserOptions {
                headless: Some(true),
                stealth: Some(true),
                ..BrowserOptions::default()
            },
            idle_timeout: Duration::from_secs(300),
            max_age: Duration::from_secs(1800),
            max_requests: 100,
        }
    }
}

struct Entry {
    id: Uuid,
    browser: Arc<Browser>,
    in_use: bool,
    created_at: Instant,
    last_used_at: Instant,
    request_count: u32,
}

impl Entry {
    fn exceeds_limits(&self, cfg: &PoolConfig) -> bool {
        self.created_at.elapsed() > cfg.max_age || self.request_count >= cfg.max_requests
    }
}

struct Waiter {
    tx: oneshot::Sender<Arc<Browser>>,
}

struct State {
    entries: Vec<Entry>,
    waiters: VecDeque<Waiter>,
    closed: bool,
}

/// A pool of warm browsers handed out to callers under a FIFO discipline.
///
/// The internal map and waiter queue share a single lock; browser-launch
/// and driver calls always happen after the lock is released, per the
/// no-await-while-locked discipline this pool is built around.
pub struct BrowserPool {
    driver: Driver,
    config: PoolConfig,
    state: Mutex<State>,
    ready: Notify,
    is_ready: AtomicBool,
}

/// A browser on loan from the pool. Callers must release it on every
/// exit path, including cancellation, or its slot leaks until shutdown.
pub struct Leased {
    pub id: Uuid,
    pub browser: Arc<Browser>,
}

impl BrowserPool {
    pub async fn new(config: PoolConfig) -> Result<Arc<Self>> {
        let driver = Driver::new().await?;

        let pool = Arc::new(Self {
            driver,
            config,
            state: Mutex::new(State {
                entries: Vec::new(),
                waiters: VecDeque::new(),
                closed: false,
            }),
            ready: Notify::new(),
            is_ready: AtomicBool::new(false),
        });

        pool.clone().warm_up();
        pool.clone().spawn_cleanup_task();

        Ok(pool)
    }

    /// Pre-creates up to `warm_up` browsers, then fires the ready signal.
    fn warm_up(self: Arc<Self>) {
        tokio::spawn(async move {
            for _ in 0..self.config.warm_up {
                match self.create_browser().await {
                    Ok(id) => {
                        let mut state = self.state.lock().await;
                        if let Some(entry) = state.entries.iter_mut().find(|e| e.id == id) {
                            entry.in_use = false;
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to warm up browser"),
                }
            }
            self.is_ready.store(true, Ordering::SeqCst);
            self.ready.notify_waiters();
            info!(warm_up = self.config.warm_up, "browser pool ready");
        });
    }

    /// Blocks until warm-up has completed.
    pub async fn wait_ready(&self) {
        if self.is_ready.load(Ordering::SeqCst) {
            return;
        }
        self.ready.notified().await;
    }

    /// Launches a new browser and inserts it already marked `in_use`.
    async fn create_browser(&self) -> Result<Uuid> {
        let browser_type = self
            .driver
            .browser_type(&self.config.browser_type)
            .ok_or_else(|| {
                flaregate_core::Error::BrowserTypeNotFound(self.config.browser_type.clone())
            })?;

        let browser = browser_type
            .launch_with_options(self.config.browser_options.clone())
            .await?;

        let id = Uuid::new_v4();
        let now = Instant::now();

        let mut state = self.state.lock().await;
        state.entries.push(Entry {
            id,
            browser: Arc::new(browser),
            in_use: true,
            created_at: now,
            last_used_at: now,
            request_count: 0,
        });
        gauge!("flaregate_pool_size", state.entries.len() as f64);

        Ok(id)
    }

    /// Returns idle candidate ids in insertion order, without awaiting
    /// while the lock is held.
    async fn idle_candidates(&self) -> (Vec<(Uuid, Arc<Browser>)>, bool, bool) {
        let state = self.state.lock().await;
        let candidates = state
            .entries
            .iter()
            .filter(|e| !e.in_use)
            .map(|e| (e.id, e.browser.clone()))
            .collect();
        let has_capacity = state.entries.len() < self.config.capacity;
        (candidates, has_capacity, state.closed)
    }

    async fn claim(&self, id: Uuid) -> Option<Leased> {
        let mut state = self.state.lock().await;
        let entry = state.entries.iter_mut().find(|e| e.id == id)?;
        if entry.in_use {
            return None;
        }
        entry.in_use = true;
        entry.last_used_at = Instant::now();
        let leased = Leased {
            id: entry.id,
            browser: entry.browser.clone(),
        };
        gauge!(
            "flaregate_pool_available",
            state.entries.iter().filter(|e| !e.in_use).count() as f64
        );
        Some(leased)
    }

    async fn evict(&self, id: Uuid) {
        let mut state = self.state.lock().await;
        state.entries.retain(|e| e.id != id);
        gauge!("flaregate_pool_size", state.entries.len() as f64);
    }

    /// Acquires a browser, blocking FIFO-fair behind any earlier waiters
    /// until one becomes available, cancellation fires, or the pool closes.
    pub async fn acquire(&self, cancel: &tokio_util::sync::CancellationToken) -> Result<Leased> {
        loop {
            let (candidates, has_capacity, closed) = self.idle_candidates().await;
            if closed {
                return Err(PoolError::Closed);
            }

            for (id, browser) in &candidates {
                if !browser.is_alive().await {
                    debug!(id = %id, "evicting unhealthy browser during acquire");
                    self.evict(*id).await;
                    let _ = browser.close().await;
                    continue;
                }
                let exceeds = {
                    let state = self.state.lock().await;
                    state
                        .entries
                        .iter()
                        .find(|e| e.id == *id)
                        .map(|e| e.exceeds_limits(&self.config))
                        .unwrap_or(true)
                };
                if exceeds {
                    self.evict(*id).await;
                    let _ = browser.close().await;
                    continue;
                }
                if let Some(leased) = self.claim(*id).await {
                    return Ok(leased);
                }
                // Someone else claimed it first; keep scanning.
            }

            if has_capacity {
                let id = self.create_browser().await?;
                if let Some(leased) = self.claim(id).await {
                    return Ok(leased);
                }
                continue;
            }

            let rx = {
                let mut state = self.state.lock().await;
                if state.closed {
                    return Err(PoolError::Closed);
                }
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(Waiter { tx });
                rx
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(PoolError::Cancelled);
                }
                result = rx => {
                    match result {
                        Ok(browser) => {
                            let state = self.state.lock().await;
                            if let Some(entry) = state.entries.iter().find(|e| Arc::ptr_eq(&e.browser, &browser)) {
                                return Ok(Leased { id: entry.id, browser: entry.browser.clone() });
                            }
                            // Entry vanished between hand-off and lock; retry from the top.
                        }
                        Err(_) => return Err(PoolError::Closed),
                    }
                }
            }
        }
    }

    /// Returns a leased browser to the pool, recycling it if it has aged
    /// out, exceeded its request budget, or the pool has been closed.
    pub async fn release(&self, leased: Leased) {
        let closed = {
            let mut state = self.state.lock().await;
            if state.closed {
                true
            } else {
                if let Some(entry) = state.entries.iter_mut().find(|e| e.id == leased.id) {
                    entry.request_count += 1;
                    entry.last_used_at = Instant::now();
                }
                false
            }
        };

        if closed {
            let _ = leased.browser.close().await;
            return;
        }

        let needs_recycle = {
            let state = self.state.lock().await;
            state
                .entries
                .iter()
                .find(|e| e.id == leased.id)
                .map(|e| e.exceeds_limits(&self.config))
                .unwrap_or(false)
        };

        if needs_recycle {
            self.evict(leased.id).await;
            let _ = leased.browser.close().await;
            debug!(id = %leased.id, "recycled browser past age/request limit");

            match self.create_browser().await {
                Ok(id) => {
                    // A replacement just joined marked in_use; if a waiter
                    // is queued, hand it straight over instead of idling.
                    let waiter = {
                        let mut state = self.state.lock().await;
                        state.waiters.pop_front()
                    };
                    if let Some(waiter) = waiter {
                        let state = self.state.lock().await;
                        if let Some(entry) = state.entries.iter().find(|e| e.id == id) {
                            let _ = waiter.tx.send(entry.browser.clone());
                        }
                    } else {
                        let mut state = self.state.lock().await;
                        if let Some(entry) = state.entries.iter_mut().find(|e| e.id == id) {
                            entry.in_use = false;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "failed to create replacement browser"),
            }
            return;
        }

        let mut state = self.state.lock().await;
        if let Some(waiter) = state.waiters.pop_front() {
            if let Some(entry) = state.entries.iter_mut().find(|e| e.id == leased.id) {
                entry.in_use = true;
                entry.last_used_at = Instant::now();
                let _ = waiter.tx.send(entry.browser.clone());
                return;
            }
        }
        if let Some(entry) = state.entries.iter_mut().find(|e| e.id == leased.id) {
            entry.in_use = false;
        }
    }

    pub async fn size(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn available(&self) -> usize {
        self.state
            .lock()
            .await
            .entries
            .iter()
            .filter(|e| !e.in_use)
            .count()
    }

    fn spawn_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                self.cleanup_idle().await;
            }
        });
    }

    async fn cleanup_idle(&self) {
        let idle_timeout = self.config.idle_timeout;
        let to_close: Vec<(Uuid, Arc<Browser>)> = {
            let state = self.state.lock().await;
            if state.closed {
                return;
            }
            state
                .entries
                .iter()
                .filter(|e| !e.in_use && e.last_used_at.elapsed() > idle_timeout)
                .map(|e| (e.id, e.browser.clone()))
                .collect()
        };

        if to_close.is_empty() {
            return;
        }

        {
            let mut state = self.state.lock().await;
            state
                .entries
                .retain(|e| !to_close.iter().any(|(id, _)| *id == e.id));
        }

        for (id, browser) in to_close {
            debug!(id = %id, "evicting idle browser");
            let _ = browser.close().await;
        }
    }

    /// Closes every browser and fails every outstanding waiter.
    pub async fn close(&self) {
        let (waiters, entries) = {
            let mut state = self.state.lock().await;
            state.closed = true;
            (
                std::mem::take(&mut state.waiters),
                std::mem::take(&mut state.entries),
            )
        };

        for waiter in waiters {
            drop(waiter.tx);
        }
        for entry in entries {
            let _ = entry.browser.close().await;
        }

        info!("browser pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn pool_config_defaults_match_documented_values() {
        let cfg = PoolConfig::default();
        assert_eq!(cfg.capacity, 10);
        assert_eq!(cfg.idle_timeout, Duration::from_secs(300));
        assert_eq!(cfg.max_age, Duration::from_secs(1800));
        assert_eq!(cfg.max_requests, 100);
    }

    fn dummy_entry(in_use: bool) -> Entry {
        let now = Instant::now();
        Entry {
            id: Uuid::new_v4(),
            browser: Arc::new(Browser::dummy()),
            in_use,
            created_at: now,
            last_used_at: now,
            request_count: 0,
        }
    }

    async fn pool_with_one_seeded_entry(in_use: bool) -> (Arc<BrowserPool>, Uuid) {
        let config = PoolConfig {
            capacity: 1,
            warm_up: 0,
            ..PoolConfig::default()
        };
        let pool = BrowserPool::new(config).await.unwrap();
        pool.wait_ready().await;

        let entry = dummy_entry(in_use);
        let id = entry.id;
        pool.state.lock().await.entries.push(entry);
        (pool, id)
    }

    #[tokio::test]
    async fn acquire_hands_waiters_the_released_browser_in_fifo_order() {
        let (pool, seeded_id) = pool_with_one_seeded_entry(false).await;

        let first = pool.acquire(&CancellationToken::new()).await.unwrap();
        assert_eq!(first.id, seeded_id);

        let order = Arc::new(Mutex::new(Vec::new()));

        let pool_a = pool.clone();
        let order_a = order.clone();
        let task_a = tokio::spawn(async move {
            let leased = pool_a.acquire(&CancellationToken::new()).await.unwrap();
            order_a.lock().await.push("a");
            pool_a.release(leased).await;
        });

        // Give task_a time to queue as the first waiter before task_b starts.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let pool_b = pool.clone();
        let order_b = order.clone();
        let task_b = tokio::spawn(async move {
            let leased = pool_b.acquire(&CancellationToken::new()).await.unwrap();
            order_b.lock().await.push("b");
            pool_b.release(leased).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;

        pool.release(first).await;

        task_a.await.unwrap();
        task_b.await.unwrap();

        assert_eq!(*order.lock().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn acquire_returns_cancelled_once_the_token_fires_while_queued() {
        let (pool, _seeded_id) = pool_with_one_seeded_entry(true).await;

        let cancel = CancellationToken::new();
        let waiter_cancel = cancel.clone();
        let pool_clone = pool.clone();
        let waiter = tokio::spawn(async move { pool_clone.acquire(&waiter_cancel).await });

        // Let the task reach the waiter queue before cancelling.
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("acquire task did not finish after cancellation")
            .expect("acquire task panicked");

        assert!(matches!(result, Err(PoolError::Cancelled)));
    }
}
