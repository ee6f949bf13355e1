//! Cursor-based long-poll ingestion loop.
//!
//! [`Poller`] owns the Idle/Active lifecycle; the loop itself runs as one tokio task that fetches a
//! batch, advances the cursor, then dispatches the batch's items in order. Transport failures are
//! counted, and once the count exceeds [`PollingConfig::max_consecutive_failures`] the task ends
//! with [`DbotError::PollingExhausted`]. The host decides what to do with that result.

use std::env;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::dispatcher::UpdateHandler;
use crate::error::{DbotError, Result};
use crate::transport::UpdateSource;

/// Failure policy for the polling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    /// The loop stops when consecutive failures exceed this value (3 means the 4th failure stops it).
    pub max_consecutive_failures: u32,
    /// Pause after a failed fetch before retrying.
    pub retry_delay: Duration,
    /// Whether a dispatch error also counts as a failed iteration.
    pub count_dispatch_errors: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
            retry_delay: Duration::from_secs(2),
            count_dispatch_errors: false,
        }
    }
}

impl PollingConfig {
    /// Reads `POLL_MAX_FAILURES` and `POLL_RETRY_DELAY_MS`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_consecutive_failures = env::var("POLL_MAX_FAILURES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_consecutive_failures);
        let retry_delay = env::var("POLL_RETRY_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_delay);
        Self {
            max_consecutive_failures,
            retry_delay,
            count_dispatch_errors: defaults.count_dispatch_errors,
        }
    }

    /// No retry pause; used by tests and tight local loops.
    pub fn without_delay(mut self) -> Self {
        self.retry_delay = Duration::ZERO;
        self
    }
}

/// State of one polling run. Only the loop task mutates it; it is handed back when the loop ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingSession<C> {
    pub active: bool,
    pub cursor: C,
    pub consecutive_failures: u32,
}

impl<C> PollingSession<C> {
    fn new(cursor: C) -> Self {
        Self {
            active: true,
            cursor,
            consecutive_failures: 0,
        }
    }

    /// Counts one failure; returns true when the loop must give up.
    fn record_failure(&mut self, config: &PollingConfig) -> bool {
        self.consecutive_failures += 1;
        self.consecutive_failures > config.max_consecutive_failures
    }
}

/// Runs the loop until `cancel` fires or the failure threshold is exceeded.
///
/// Cancellation abandons an in-flight fetch (the cursor is in memory only, so nothing is lost) but
/// never interrupts dispatch of a batch that was already received.
#[instrument(skip_all)]
pub async fn run_polling_loop<S, H>(
    source: Arc<S>,
    handler: Arc<H>,
    config: PollingConfig,
    cursor: S::Cursor,
    cancel: CancellationToken,
) -> Result<PollingSession<S::Cursor>>
where
    S: UpdateSource,
    H: UpdateHandler<S::Update> + ?Sized,
{
    let mut session = PollingSession::new(cursor);
    info!(cursor = ?session.cursor, "step: polling loop started");

    while !cancel.is_cancelled() {
        let fetched = tokio::select! {
            biased;
            res = source.fetch(&session.cursor) => Some(res),
            _ = cancel.cancelled() => None,
        };
        let Some(fetched) = fetched else {
            debug!("step: fetch abandoned on stop");
            break;
        };

        match fetched {
            Ok(batch) => {
                session.cursor = batch.next_cursor;
                session.consecutive_failures = 0;
                let total = batch.items.len();
                debug!(items = total, cursor = ?session.cursor, "step: batch received");

                for (index, update) in batch.items.iter().enumerate() {
                    if let Err(e) = handler.handle_update(update) {
                        error!(
                            error = %e,
                            index = index,
                            skipped = total - index - 1,
                            "step: dispatch failed, rest of batch skipped"
                        );
                        if config.count_dispatch_errors && session.record_failure(&config) {
                            return Err(exhausted(&mut session));
                        }
                        break;
                    }
                }
            }
            Err(e) => {
                let give_up = session.record_failure(&config);
                warn!(
                    error = %e,
                    consecutive_failures = session.consecutive_failures,
                    max = config.max_consecutive_failures,
                    "step: fetch failed"
                );
                if give_up {
                    return Err(exhausted(&mut session));
                }
                if !config.retry_delay.is_zero() {
                    tokio::select! {
                        _ = tokio::time::sleep(config.retry_delay) => {}
                        _ = cancel.cancelled() => {}
                    }
                }
            }
        }
    }

    session.active = false;
    info!(cursor = ?session.cursor, "step: polling loop stopped");
    Ok(session)
}

fn exhausted<C>(session: &mut PollingSession<C>) -> DbotError {
    session.active = false;
    error!(
        failures = session.consecutive_failures,
        "step: update stream unrecoverable, polling terminated"
    );
    DbotError::PollingExhausted {
        failures: session.consecutive_failures,
    }
}

type LoopTask<C> = JoinHandle<Result<PollingSession<C>>>;

enum Phase {
    Idle,
    Starting,
    Active(CancellationToken),
}

struct PollerState<C> {
    phase: Phase,
    task: Option<LoopTask<C>>,
}

/// Idle/Active lifecycle around [`run_polling_loop`].
pub struct Poller<S: UpdateSource, H: ?Sized> {
    source: Arc<S>,
    handler: Arc<H>,
    config: PollingConfig,
    state: Mutex<PollerState<S::Cursor>>,
}

impl<S, H> Poller<S, H>
where
    S: UpdateSource,
    H: UpdateHandler<S::Update> + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, handler: Arc<H>, config: PollingConfig) -> Self {
        Self {
            source,
            handler,
            config,
            state: Mutex::new(PollerState {
                phase: Phase::Idle,
                task: None,
            }),
        }
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PollerState<S::Cursor>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while a loop task is running and has not been asked to stop.
    pub fn is_active(&self) -> bool {
        let state = self.lock();
        match state.phase {
            Phase::Active(_) => state.task.as_ref().is_some_and(|t| !t.is_finished()),
            Phase::Starting => true,
            Phase::Idle => false,
        }
    }

    /// Idle → Active. A no-op when already active.
    ///
    /// Runs the source's init call first (e.g. obtaining a long-poll session); if that fails the
    /// poller stays Idle and the error is returned. Must be called inside a tokio runtime.
    #[instrument(skip(self))]
    pub async fn start_polling(&self) -> Result<()> {
        {
            let mut state = self.lock();
            let running = match state.phase {
                Phase::Starting => true,
                Phase::Active(_) => state.task.as_ref().is_some_and(|t| !t.is_finished()),
                Phase::Idle => false,
            };
            if running {
                debug!("start_polling ignored: already active");
                return Ok(());
            }
            state.phase = Phase::Starting;
        }

        let cursor = match self.source.init().await {
            Ok(cursor) => cursor,
            Err(e) => {
                self.lock().phase = Phase::Idle;
                error!(error = %e, "step: polling init failed");
                return Err(e);
            }
        };

        let mut state = self.lock();
        if !matches!(state.phase, Phase::Starting) {
            info!("stop requested during init, polling not started");
            return Ok(());
        }
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_polling_loop(
            Arc::clone(&self.source),
            Arc::clone(&self.handler),
            self.config.clone(),
            cursor,
            cancel.clone(),
        ));
        if let Some(previous) = state.task.replace(task) {
            debug!(finished = previous.is_finished(), "dropping handle of previous loop");
        }
        state.phase = Phase::Active(cancel);
        Ok(())
    }

    /// Active → Idle. The loop notices at its next suspension point; a batch already being
    /// dispatched is finished first.
    pub fn stop_polling(&self) {
        let mut state = self.lock();
        match std::mem::replace(&mut state.phase, Phase::Idle) {
            Phase::Active(cancel) => {
                cancel.cancel();
                info!("step: polling stop requested");
            }
            Phase::Starting => info!("step: polling stop requested during init"),
            Phase::Idle => {}
        }
    }

    /// Waits for the current (or last stopped) loop task and returns how it ended.
    ///
    /// `Ok(None)` when no loop was ever started. `Err(PollingExhausted)` when the stream was
    /// given up on.
    pub async fn join(&self) -> Result<Option<PollingSession<S::Cursor>>> {
        let task = self.lock().task.take();
        let Some(task) = task else {
            return Ok(None);
        };
        let outcome = task
            .await
            .map_err(|e| DbotError::Task(format!("polling task failed: {}", e)));
        {
            let mut state = self.lock();
            if state.task.is_none() {
                state.phase = Phase::Idle;
            }
        }
        outcome?.map(Some)
    }
}
