//! Per-backend concurrency cap + adaptive circuit breaker.
//!
//! The breaker's trip/cooldown thresholds are this crate's own
//! conservative defaults; counters are tracked per backend but the
//! transition rules aren't derived from any external spec.

use std::sync::Arc;
use std::time::{Duration, Instant};

use inv_domain::config::ResolvedThrottle;
use inv_domain::{Error, Result};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    HalfOpen,
    Open,
}

struct Window {
    started_at: Instant,
    successes: u32,
    rate_limited: u32,
    server_errors: u32,
}

impl Window {
    fn fresh(now: Instant) -> Self {
        Self {
            started_at: now,
            successes: 0,
            rate_limited: 0,
            server_errors: 0,
        }
    }
}

struct Inner {
    state: CircuitState,
    open_until: Option<Instant>,
    window: Window,
}

/// Bounds concurrent queries to one backend and fails fast while that
/// backend is unhealthy.
pub struct ThrottleGate {
    semaphore: Arc<Semaphore>,
    config: ResolvedThrottle,
    inner: Mutex<Inner>,
}

/// A held concurrency slot. Releases automatically on drop.
#[derive(Debug)]
pub struct ThrottlePermit {
    _permit: OwnedSemaphorePermit,
}

impl ThrottleGate {
    pub fn new(config: ResolvedThrottle) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.capacity)),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                open_until: None,
                window: Window::fresh(Instant::now()),
            }),
        }
    }

    /// Acquire a concurrency slot. Fails fast with `CircuitOpen` if the
    /// circuit is open and the cooldown has not elapsed; otherwise waits
    /// for a semaphore permit (bounded by `capacity` concurrent holders).
    pub async fn acquire(&self) -> Result<ThrottlePermit> {
        self.check_circuit()?;
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::Other("throttle gate semaphore closed".into()))?;
        // Re-check after waiting: the circuit may have opened while queued.
        self.check_circuit()?;
        Ok(ThrottlePermit { _permit: permit })
    }

    fn check_circuit(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::Open {
            let now = Instant::now();
            if let Some(until) = inner.open_until {
                if now >= until {
                    inner.state = CircuitState::HalfOpen;
                } else {
                    let retry_after_secs = (until - now).as_secs_f64();
                    return Err(Error::CircuitOpen { retry_after_secs });
                }
            }
        }
        Ok(())
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        self.roll_window_if_stale(&mut inner);
        inner.window.successes += 1;
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Closed;
            inner.open_until = None;
        }
    }

    pub fn record_429(&self) {
        let mut inner = self.inner.lock();
        self.roll_window_if_stale(&mut inner);
        inner.window.rate_limited += 1;
    }

    pub fn record_server_error(&self) {
        let mut inner = self.inner.lock();
        self.roll_window_if_stale(&mut inner);
        inner.window.server_errors += 1;

        if inner.state == CircuitState::HalfOpen {
            self.open(&mut inner);
            return;
        }
        if inner.state == CircuitState::Closed
            && inner.window.server_errors > self.config.error_threshold
        {
            self.open(&mut inner);
        }
    }

    fn open(&self, inner: &mut Inner) {
        inner.state = CircuitState::Open;
        inner.open_until = Some(Instant::now() + Duration::from_secs(self.config.cooldown_secs));
    }

    fn roll_window_if_stale(&self, inner: &mut Inner) {
        let now = Instant::now();
        if now.duration_since(inner.window.started_at) >= Duration::from_secs(self.config.window_secs)
        {
            inner.window = Window::fresh(now);
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
