//! Per-expert health statistics
//!
//! Written by the tracked call path, read by the load-aware router. The
//! tracker holds one entry per registered expert; each entry's fields are
//! updated inside a single critical section so per-expert reads are
//! internally consistent. There is no global lock: the map is sharded, so
//! writers for one expert do not serialize behind writers for another.
//!
//! Unknown expert ids are silently ignored on write and read as absent.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use crate::domain_types::{ExpertId, RateLimitRps};

/// EMA coefficient for latency samples
const EMA_ALPHA: f64 = 0.3;

/// Width of the rate-limit detection window
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(1);

/// Mutable per-expert counters; guarded by the owning map entry
#[derive(Debug, Default)]
struct ExpertStats {
    /// EMA of latency samples; `None` until the first sample lands
    latency_ema_ms: Option<f64>,
    request_count: u64,
    error_count: u64,
    /// Monotonic timestamps of recent requests, oldest first
    request_timestamps: VecDeque<Instant>,
    rate_limit_rps: Option<RateLimitRps>,
}

impl ExpertStats {
    fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.request_timestamps.push_back(now);
    }

    fn record_result(&mut self, latency_ms: f64, success: bool) {
        self.latency_ema_ms = Some(match self.latency_ema_ms {
            None => latency_ms,
            Some(prev) => EMA_ALPHA * latency_ms + (1.0 - EMA_ALPHA) * prev,
        });
        if !success {
            self.error_count += 1;
        }
    }

    fn error_rate(&self) -> f64 {
        if self.request_count == 0 {
            return 0.0;
        }
        self.error_count as f64 / self.request_count as f64
    }

    /// Purges entries older than the window, then checks the limit
    fn is_rate_limited(&mut self, now: Instant) -> bool {
        let Some(rps) = self.rate_limit_rps else {
            return false;
        };
        if let Some(cutoff) = now.checked_sub(RATE_LIMIT_WINDOW) {
            while self
                .request_timestamps
                .front()
                .is_some_and(|t| *t < cutoff)
            {
                self.request_timestamps.pop_front();
            }
        }
        self.request_timestamps.len() as f64 >= rps.as_f64()
    }

    fn observe(&mut self, now: Instant) -> ExpertSnapshot {
        ExpertSnapshot {
            latency_ema_ms: self.latency_ema_ms.unwrap_or(0.0),
            error_rate: self.error_rate(),
            request_count: self.request_count,
            is_rate_limited: self.is_rate_limited(now),
        }
    }
}

/// Point-in-time view of one expert's health
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpertSnapshot {
    /// EMA of observed latencies, 0.0 before the first sample
    pub latency_ema_ms: f64,
    /// `error_count / max(request_count, 1)`
    pub error_rate: f64,
    /// Total requests recorded
    pub request_count: u64,
    /// True iff a limit is set and the live window is at or over it
    pub is_rate_limited: bool,
}

/// Snapshot of every tracked expert, suitable for logging
pub type StatsSnapshot = HashMap<ExpertId, ExpertSnapshot>;

/// Thread-safe per-expert statistics, keyed by expert id
///
/// The expert set is fixed at construction. Shared between the tracked
/// call path (writer) and the load-aware router (reader).
#[derive(Debug)]
pub struct StatsTracker {
    stats: DashMap<ExpertId, ExpertStats>,
}

impl StatsTracker {
    /// Creates a tracker for the given expert set
    #[must_use]
    pub fn new(experts: impl IntoIterator<Item = ExpertId>) -> Self {
        let stats = DashMap::new();
        for expert in experts {
            stats.insert(expert, ExpertStats::default());
        }
        Self { stats }
    }

    /// True iff the id was registered at construction
    #[must_use]
    pub fn tracks(&self, expert_id: &ExpertId) -> bool {
        self.stats.contains_key(expert_id)
    }

    /// Counts a request and stamps the rate-limit window
    pub fn record_request(&self, expert_id: &ExpertId) {
        if let Some(mut entry) = self.stats.get_mut(expert_id) {
            entry.record_request(Instant::now());
        }
    }

    /// Feeds a latency sample and the success bit into the EMA and counters
    pub fn record_result(&self, expert_id: &ExpertId, latency_ms: f64, success: bool) {
        if let Some(mut entry) = self.stats.get_mut(expert_id) {
            entry.record_result(latency_ms, success);
        }
    }

    /// Sets or clears the expert's rate limit
    pub fn set_rate_limit(&self, expert_id: &ExpertId, rps: Option<RateLimitRps>) {
        if let Some(mut entry) = self.stats.get_mut(expert_id) {
            entry.rate_limit_rps = rps;
        }
    }

    /// True iff a limit is set and the live 1-second window is at or over it
    ///
    /// Unknown ids read as not limited.
    #[must_use]
    pub fn is_rate_limited(&self, expert_id: &ExpertId) -> bool {
        self.stats
            .get_mut(expert_id)
            .is_some_and(|mut entry| entry.is_rate_limited(Instant::now()))
    }

    /// The expert's current error rate, absent for unknown ids
    #[must_use]
    pub fn error_rate(&self, expert_id: &ExpertId) -> Option<f64> {
        self.stats.get(expert_id).map(|entry| entry.error_rate())
    }

    /// The expert's latency EMA, absent for unknown ids or before any sample
    #[must_use]
    pub fn latency_ema(&self, expert_id: &ExpertId) -> Option<f64> {
        self.stats.get(expert_id).and_then(|entry| entry.latency_ema_ms)
    }

    /// Reads one expert's four health fields under a single entry lock
    #[must_use]
    pub fn probe(&self, expert_id: &ExpertId) -> Option<ExpertSnapshot> {
        let now = Instant::now();
        self.stats
            .get_mut(expert_id)
            .map(|mut entry| entry.observe(now))
    }

    /// A per-expert-consistent snapshot of every tracked expert
    ///
    /// Each expert's fields are read under its own entry lock; the
    /// snapshot is not atomic across experts, which is fine for its
    /// logging consumers.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let now = Instant::now();
        let mut out = HashMap::with_capacity(self.stats.len());
        for mut entry in self.stats.iter_mut() {
            let snapshot = entry.value_mut().observe(now);
            out.insert(entry.key().clone(), snapshot);
        }
        out
    }
}
