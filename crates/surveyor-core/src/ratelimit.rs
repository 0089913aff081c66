//! Sliding-window request admission control.
//!
//! Each identity gets an independent window of recent admission instants;
//! `admit` prunes stamps older than the role's window, then admits iff the
//! remaining count is below the role's cap. Windows live in a DashMap so
//! one user's load cannot starve another's admission check. The limiter
//! never blocks and never evicts -- idle entries are removed by the
//! cleanup scheduler to keep this hot path allocation-free.

use dashmap::DashMap;
use surveyor_types::config::RateLimitConfig;
use surveyor_types::identity::{Identity, Role};

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// One identity's trailing window of admitted requests.
#[derive(Debug)]
struct Window {
    stamps: VecDeque<Instant>,
    last_seen: Instant,
}

/// Per-identity sliding-window rate limiter.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<Identity, Window>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Admission budget for a role: (max requests, window length).
    fn budget(&self, role: Role) -> (usize, Duration) {
        match role {
            Role::User => (
                self.config.user_max_requests,
                Duration::from_secs(self.config.user_window_secs),
            ),
            Role::Admin => (
                self.config.admin_max_requests,
                Duration::from_secs(self.config.admin_window_secs),
            ),
        }
    }

    /// Admit or deny one request. Never blocks; mutates only this
    /// identity's window.
    pub fn admit(&self, identity: Identity, role: Role) -> bool {
        self.admit_at(identity, role, Instant::now())
    }

    /// Admission check against an explicit clock, for deterministic tests.
    pub fn admit_at(&self, identity: Identity, role: Role, now: Instant) -> bool {
        let (max_requests, window) = self.budget(role);

        let mut entry = self.windows.entry(identity).or_insert_with(|| Window {
            stamps: VecDeque::new(),
            last_seen: now,
        });
        entry.last_seen = now;

        while let Some(oldest) = entry.stamps.front() {
            if now.duration_since(*oldest) >= window {
                entry.stamps.pop_front();
            } else {
                break;
            }
        }

        if entry.stamps.len() < max_requests {
            entry.stamps.push_back(now);
            true
        } else {
            false
        }
    }

    /// Remove windows idle since before `now - idle`. Called by the
    /// cleanup scheduler; keys are snapshotted first so the sweep never
    /// holds a shard lock across the whole table.
    pub fn evict_idle(&self, idle: Duration, now: Instant) -> usize {
        let stale: Vec<Identity> = self
            .windows
            .iter()
            .filter(|entry| now.duration_since(entry.value().last_seen) >= idle)
            .map(|entry| *entry.key())
            .collect();

        let mut evicted = 0;
        for identity in stale {
            // Re-check under the entry: the identity may have come back
            // between snapshot and removal.
            if self
                .windows
                .remove_if(&identity, |_, w| now.duration_since(w.last_seen) >= idle)
                .is_some()
            {
                evicted += 1;
            }
        }
        evicted
    }

    /// Number of identities currently tracked.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}
