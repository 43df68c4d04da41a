//! Upstream server descriptors and availability tracking.
//!
//! A [`Server`] is one backend instance of a pool: its base URL, its
//! round-robin weight, and an [`Availability`] capability the selector
//! consults before handing it out. [`PassiveHealth`] derives availability
//! from forwarding outcomes; [`AlwaysAvailable`] never takes a server out
//! of rotation.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use url::Url;

use crate::config::model::HeaderRules;

/// Whether a server may currently receive traffic.
///
/// `is_available` must be cheap and free of side effects; the selector
/// may call it many times within a single selection. The `record_*`
/// hooks are called by the forwarder after each upstream attempt.
pub trait Availability: Send + Sync {
    fn is_available(&self) -> bool;

    fn record_success(&self) {}

    fn record_failure(&self) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAvailable;

impl Availability for AlwaysAvailable {
    fn is_available(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
struct HealthState {
    failures: u32,
    last_failure: Option<Instant>,
}

/// Passive health tracking based on consecutive failures.
///
/// After `max_fails` consecutive failures the server is unavailable until
/// `fail_timeout` has passed since the most recent failure. Once the
/// timeout elapses the server is offered again; a single success clears
/// the failure count, another failure takes it out for a fresh window.
#[derive(Debug)]
pub struct PassiveHealth {
    max_fails: u32,
    fail_timeout: Duration,
    state: Mutex<HealthState>,
}

impl PassiveHealth {
    #[must_use]
    pub fn new(max_fails: u32, fail_timeout: Duration) -> Self {
        Self {
            max_fails,
            fail_timeout,
            state: Mutex::new(HealthState::default()),
        }
    }

    #[must_use]
    pub fn failures(&self) -> u32 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failures
    }
}

impl Availability for PassiveHealth {
    fn is_available(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.failures < self.max_fails {
            return true;
        }
        state
            .last_failure
            .map_or(true, |at| at.elapsed() >= self.fail_timeout)
    }

    fn record_success(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.failures = 0;
        state.last_failure = None;
    }

    fn record_failure(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.failures = state.failures.saturating_add(1);
        state.last_failure = Some(Instant::now());
    }
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// One backend instance of a pool.
pub struct Server {
    url: Url,
    weight: u32,
    timeout: Duration,
    headers: Arc<HeaderRules>,
    availability: Box<dyn Availability>,
}

impl Server {
    /// Creates a server that is always available.
    ///
    /// A weight of zero is treated as one.
    #[must_use]
    pub fn new(url: Url, weight: u32) -> Self {
        Self {
            url,
            weight: weight.max(1),
            timeout: DEFAULT_TIMEOUT,
            headers: Arc::new(HeaderRules::default()),
            availability: Box::new(AlwaysAvailable),
        }
    }

    #[must_use]
    pub fn with_availability(mut self, availability: impl Availability + 'static) -> Self {
        self.availability = Box::new(availability);
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Arc<HeaderRules>) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// `host:port` of the server, used as its identity in logs.
    #[must_use]
    pub fn address(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        self.url
            .port_or_known_default()
            .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"))
    }

    #[must_use]
    pub const fn weight(&self) -> u32 {
        self.weight
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderRules {
        &self.headers
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.availability.is_available()
    }

    pub fn record_success(&self) {
        self.availability.record_success();
    }

    pub fn record_failure(&self) {
        self.availability.record_failure();
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("url", &self.url.as_str())
            .field("weight", &self.weight)
            .field("available", &self.is_available())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.as_str())
    }
}
