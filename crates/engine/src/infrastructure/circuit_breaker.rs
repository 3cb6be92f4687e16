//! Circuit breaker for the policy backend.
//!
//! When the backend keeps failing, asking it again only stalls every teleport
//! until the timeout fires. The breaker short-circuits those calls:
//!
//! - **Closed**: normal operation, requests pass through
//! - **Open**: backend failing, requests rejected immediately
//! - **HalfOpen**: open period elapsed, a limited number of probes pass

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Duration the circuit stays open before transitioning to half-open
    pub open_duration: Duration,
    /// Probes allowed in half-open state before deciding to open or close
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(30),
            half_open_max_requests: 1,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn from_settings(failure_threshold: u32, open_duration_secs: u64) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            open_duration: Duration::from_secs(open_duration_secs),
            half_open_max_requests: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Returned when the breaker rejects a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Circuit breaker is open, retry after {retry_after:?}")]
pub struct CircuitOpenError {
    pub retry_after: Duration,
}

struct InternalState {
    state: CircuitState,
    opened_at: Option<Instant>,
    half_open_requests: u32,
    half_open_successes: u32,
}

/// Snapshot of breaker counters, logged on state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub total_successes: u64,
    pub open_count: u64,
}

/// Thread-safe circuit breaker
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<InternalState>,
    consecutive_failures: AtomicU32,
    total_failures: AtomicU64,
    total_successes: AtomicU64,
    open_count: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(InternalState {
                state: CircuitState::Closed,
                opened_at: None,
                half_open_requests: 0,
                half_open_successes: 0,
            }),
            consecutive_failures: AtomicU32::new(0),
            total_failures: AtomicU64::new(0),
            total_successes: AtomicU64::new(0),
            open_count: AtomicU64::new(0),
        }
    }

    // A panic while holding the lock leaves plain counters behind; keep going.
    fn lock(&self) -> MutexGuard<'_, InternalState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current state, moving Open -> HalfOpen once the open period elapsed.
    pub fn state(&self) -> CircuitState {
        let mut state = self.lock();
        self.refresh(&mut state);
        state.state
    }

    fn refresh(&self, state: &mut InternalState) {
        if state.state != CircuitState::Open {
            return;
        }
        let elapsed = state
            .opened_at
            .map_or(true, |at| at.elapsed() >= self.config.open_duration);
        if elapsed {
            state.state = CircuitState::HalfOpen;
            state.half_open_requests = 0;
            state.half_open_successes = 0;
            tracing::info!("Policy circuit breaker half-open, probing backend");
        }
    }

    /// Admit one call. The returned permit must be settled with
    /// [`CallPermit::succeeded`] or [`CallPermit::failed`]; a permit dropped
    /// unsettled (the caller gave up waiting) counts as a failure, so a
    /// half-open probe slot is never lost.
    pub fn acquire(&self) -> Result<CallPermit<'_>, CircuitOpenError> {
        self.allow_request()?;
        Ok(CallPermit {
            breaker: self,
            settled: false,
        })
    }

    /// `Ok(())` if the request may proceed.
    pub fn allow_request(&self) -> Result<(), CircuitOpenError> {
        let mut state = self.lock();
        self.refresh(&mut state);

        match state.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let retry_after = state
                    .opened_at
                    .map(|at| self.config.open_duration.saturating_sub(at.elapsed()))
                    .unwrap_or(self.config.open_duration);
                Err(CircuitOpenError { retry_after })
            }
            CircuitState::HalfOpen => {
                if state.half_open_requests < self.config.half_open_max_requests {
                    state.half_open_requests += 1;
                    Ok(())
                } else {
                    Err(CircuitOpenError {
                        retry_after: Duration::from_secs(1),
                    })
                }
            }
        }
    }

    pub fn record_success(&self) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);

        let mut state = self.lock();
        if state.state == CircuitState::HalfOpen {
            state.half_open_successes += 1;
            if state.half_open_successes >= self.config.half_open_max_requests {
                state.state = CircuitState::Closed;
                state.opened_at = None;
                tracing::info!(
                    probes = state.half_open_successes,
                    metrics = ?self.snapshot(&state),
                    "Policy circuit breaker closed, backend recovered"
                );
            }
        }
    }

    pub fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;

        let mut state = self.lock();
        match state.state {
            CircuitState::Closed if failures >= self.config.failure_threshold => {
                self.open(&mut state);
                tracing::warn!(
                    consecutive_failures = failures,
                    threshold = self.config.failure_threshold,
                    open_duration_secs = self.config.open_duration.as_secs(),
                    metrics = ?self.snapshot(&state),
                    "Policy circuit breaker opening due to consecutive failures"
                );
            }
            CircuitState::Closed => {}
            CircuitState::HalfOpen => {
                self.open(&mut state);
                tracing::warn!(
                    metrics = ?self.snapshot(&state),
                    "Policy circuit breaker re-opening after failed probe"
                );
            }
            CircuitState::Open => {
                state.opened_at = Some(Instant::now());
            }
        }
    }

    fn open(&self, state: &mut InternalState) {
        state.state = CircuitState::Open;
        state.opened_at = Some(Instant::now());
        self.open_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let state = self.lock();
        self.snapshot(&state)
    }

    fn snapshot(&self, state: &InternalState) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            state: state.state,
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_successes: self.total_successes.load(Ordering::Relaxed),
            open_count: self.open_count.load(Ordering::Relaxed),
        }
    }
}

/// Admission for one call through a [`CircuitBreaker`].
#[must_use = "settle the permit with `succeeded` or `failed`"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl CallPermit<'_> {
    pub fn succeeded(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn failed(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!("Policy call abandoned before completing, counting as failure");
            self.breaker.record_failure();
        }
    }
}
