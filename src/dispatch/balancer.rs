//! Weighted round-robin server selection.
//!
//! [`RoundRobin`] walks a pool's servers in order. A server with weight
//! `W` is handed out on `W` consecutive selections before the cursor
//! moves past it. Unavailable candidates are skipped immediately; if no
//! available server turns up within [`SELECT_TIMEOUT`] the selection
//! fails. The cursor lock is held only while the cursor moves, never
//! while a server's availability is probed.
//!
//! The pool topology is fixed for the lifetime of a selector, so the
//! cursor wraps with a plain modulo over the server count.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::upstream::Server;
use crate::error::DispatchError;

/// Upper bound on the time a single selection spends looking for an
/// available server.
pub const SELECT_TIMEOUT: Duration = Duration::from_millis(10);

/// Pause between full sweeps of an unavailable pool.
const SWEEP_PAUSE: Duration = Duration::from_micros(100);

#[derive(Debug)]
struct Cursor {
    next: usize,
    repeats: Vec<u32>,
}

#[derive(Debug)]
pub struct RoundRobin {
    servers: Vec<Arc<Server>>,
    cursor: Mutex<Cursor>,
    /// Candidates one full pass over the pool yields (sum of weights).
    sweep: u64,
    deadline: Duration,
}

impl RoundRobin {
    /// Returns `None` for an empty server list.
    #[must_use]
    pub fn new(servers: Vec<Arc<Server>>) -> Option<Self> {
        Self::with_deadline(servers, SELECT_TIMEOUT)
    }

    #[must_use]
    pub fn with_deadline(servers: Vec<Arc<Server>>, deadline: Duration) -> Option<Self> {
        if servers.is_empty() {
            return None;
        }
        let sweep = servers.iter().map(|s| u64::from(s.weight())).sum();
        Some(Self {
            cursor: Mutex::new(Cursor {
                next: 0,
                repeats: vec![0; servers.len()],
            }),
            servers,
            sweep,
            deadline,
        })
    }

    #[must_use]
    pub fn servers(&self) -> &[Arc<Server>] {
        &self.servers
    }

    /// Returns the next available server, or `None` once the deadline
    /// elapses without finding one.
    #[must_use]
    pub fn next_server(&self) -> Option<Arc<Server>> {
        let start = Instant::now();
        let mut probes: u64 = 0;

        loop {
            let candidate = self.advance();
            if candidate.is_available() {
                return Some(candidate);
            }
            if start.elapsed() >= self.deadline {
                return None;
            }
            probes += 1;
            if probes % self.sweep == 0 {
                std::thread::sleep(SWEEP_PAUSE);
            }
        }
    }

    fn advance(&self) -> Arc<Server> {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let len = self.servers.len();
        let idx = cursor.next % len;
        let server = &self.servers[idx];

        let repeats = cursor.repeats[idx] + 1;
        if repeats >= server.weight() {
            cursor.repeats[idx] = 0;
            cursor.next = (idx + 1) % len;
        } else {
            cursor.repeats[idx] = repeats;
            cursor.next = idx;
        }

        Arc::clone(server)
    }
}

/// The servers behind one routing rule, with their selector.
#[derive(Debug)]
pub struct Pool {
    name: String,
    balancer: RoundRobin,
}

impl Pool {
    pub fn new(name: impl Into<String>, servers: Vec<Server>) -> Result<Self, DispatchError> {
        Self::with_deadline(name, servers, SELECT_TIMEOUT)
    }

    pub fn with_deadline(
        name: impl Into<String>,
        servers: Vec<Server>,
        deadline: Duration,
    ) -> Result<Self, DispatchError> {
        let name = name.into();
        let servers = servers.into_iter().map(Arc::new).collect();
        let Some(balancer) = RoundRobin::with_deadline(servers, deadline) else {
            return Err(DispatchError::InvalidPool {
                pool: name,
                reason: "pool has no servers".into(),
            });
        };
        Ok(Self { name, balancer })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn servers(&self) -> &[Arc<Server>] {
        self.balancer.servers()
    }

    pub fn next_server(&self) -> Result<Arc<Server>, DispatchError> {
        self.balancer.next_server().ok_or_else(|| {
            tracing::warn!(pool = %self.name, "no available upstream server");
            DispatchError::UpstreamUnavailable {
                pool: self.name.clone(),
            }
        })
    }
}
