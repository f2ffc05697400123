use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::models::news::{ContextCacheEntry, ContextKey};
use super::context_service::ContextCache;

#[derive(Default)]
struct RotationState {
    portfolio_ids: Vec<String>,
    current: usize,
}

#[derive(Clone, Copy)]
enum Step {
    Forward,
    Back,
}

/// Advance the current index with wrap-around. `None` with fewer than two portfolios.
fn step(state: &Mutex<RotationState>, direction: Step) -> Option<(usize, String)> {
    let mut st = state.lock();
    let len = st.portfolio_ids.len();
    if len < 2 {
        return None;
    }
    st.current = match direction {
        Step::Forward => (st.current + 1) % len,
        Step::Back => (st.current + len - 1) % len,
    };
    Some((st.current, st.portfolio_ids[st.current].clone()))
}

/// Cycles the displayed portfolio on a fixed period and refreshes its
/// context news on every step.
///
/// At most one timer task is ever armed: `start` aborts any previous task
/// before spawning, `stop` is idempotent, and dropping the scheduler tears
/// the task down. Subscribers receive the current index through a `watch`
/// channel so they can rerun their own per-portfolio work.
pub struct RotationScheduler {
    cache: Arc<ContextCache>,
    interval: Duration,
    state: Arc<Mutex<RotationState>>,
    index_tx: Arc<watch::Sender<usize>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Shortest period the timer accepts, matching the smallest valid
/// `rotation_interval_secs`.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

impl RotationScheduler {
    /// A period shorter than [`MIN_INTERVAL`] is raised to it.
    pub fn new(cache: Arc<ContextCache>, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            warn!(?interval, minimum = ?MIN_INTERVAL, "rotation interval too short, clamping");
        }
        let interval = interval.max(MIN_INTERVAL);
        let (index_tx, _) = watch::channel(0);
        Self {
            cache,
            interval,
            state: Arc::new(Mutex::new(RotationState::default())),
            index_tx: Arc::new(index_tx),
            handle: Mutex::new(None),
        }
    }

    /// Replace the rotation list. The current index resets to 0 if it no
    /// longer points into the list; a running timer is re-armed.
    pub fn set_portfolios(&self, portfolio_ids: Vec<String>) {
        let current = {
            let mut st = self.state.lock();
            st.portfolio_ids = portfolio_ids;
            if st.current >= st.portfolio_ids.len() {
                st.current = 0;
            }
            st.current
        };
        self.index_tx.send_replace(current);
        if self.is_running() {
            self.restart();
        }
    }

    pub fn portfolio_count(&self) -> usize {
        self.state.lock().portfolio_ids.len()
    }

    /// Current index and portfolio id, if any portfolio is loaded.
    pub fn current(&self) -> Option<(usize, String)> {
        let st = self.state.lock();
        st.portfolio_ids
            .get(st.current)
            .map(|id| (st.current, id.clone()))
    }

    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.index_tx.subscribe()
    }

    /// Arm the rotation timer. No-op with fewer than two portfolios or
    /// outside a tokio runtime.
    pub fn start(&self) {
        let count = self.portfolio_count();
        if count < 2 {
            debug!(count, "rotation not started: fewer than two portfolios");
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("rotation not started: no tokio runtime");
            return;
        };

        let mut handle = self.handle.lock();
        if let Some(previous) = handle.take() {
            previous.abort();
        }

        let state = Arc::clone(&self.state);
        let cache = Arc::clone(&self.cache);
        let index_tx = Arc::clone(&self.index_tx);
        let period = self.interval;

        *handle = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some((index, portfolio_id)) = step(&state, Step::Forward) else {
                    continue;
                };
                debug!(index, portfolio_id = %portfolio_id, "rotating portfolio");
                index_tx.send_replace(index);
                cache.get(&ContextKey::Portfolio(portfolio_id)).await;
            }
        }));
        info!(count, period_secs = period.as_secs(), "portfolio rotation started");
    }

    /// Cancel the timer if armed.
    pub fn stop(&self) {
        if let Some(task) = self.handle.lock().take() {
            task.abort();
            info!("portfolio rotation stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Show the portfolio at `index` and restart the timer so the next
    /// automatic step is a full period away. Out-of-range indices are ignored.
    pub async fn select(&self, index: usize) -> Option<ContextCacheEntry> {
        let portfolio_id = {
            let mut st = self.state.lock();
            let id = st.portfolio_ids.get(index)?.clone();
            st.current = index;
            id
        };
        self.index_tx.send_replace(index);
        self.restart();
        Some(self.cache.get(&ContextKey::Portfolio(portfolio_id)).await)
    }

    /// Manually step forward without touching the timer.
    pub async fn next(&self) -> Option<ContextCacheEntry> {
        self.manual_step(Step::Forward).await
    }

    /// Manually step back without touching the timer.
    pub async fn previous(&self) -> Option<ContextCacheEntry> {
        self.manual_step(Step::Back).await
    }

    async fn manual_step(&self, direction: Step) -> Option<ContextCacheEntry> {
        let (index, portfolio_id) = step(&self.state, direction)?;
        self.index_tx.send_replace(index);
        Some(self.cache.get(&ContextKey::Portfolio(portfolio_id)).await)
    }

    fn restart(&self) {
        self.stop();
        self.start();
    }
}

impl Drop for RotationScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.handle.get_mut().take() {
            task.abort();
        }
    }
}
