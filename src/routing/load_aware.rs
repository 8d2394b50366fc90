//! Load-aware routing
//!
//! Wraps any base router and overrides its choice only when live health
//! stats say the preferred expert is degraded. The base router expresses
//! semantic fit; this wrapper steers traffic away from rate-limited or
//! error-prone experts.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain_types::ExpertId;
use crate::stats::StatsTracker;

use super::{Router, RouterBuildError, validate_experts};

/// Default latency penalty threshold in milliseconds
pub const DEFAULT_LATENCY_PENALTY_MS: f64 = 1000.0;

/// Default error-rate threshold above which an expert is avoided
pub const DEFAULT_ERROR_RATE_THRESHOLD: f64 = 0.5;

/// Penalty added to the load score of a rate-limited expert
const RATE_LIMIT_PENALTY: f64 = 10_000.0;

/// Penalty added to the load score of an error-prone expert
const ERROR_RATE_PENALTY: f64 = 5_000.0;

/// Health-aware wrapper over a base routing strategy
pub struct LoadAwareRouter {
    experts: Vec<ExpertId>,
    base: Box<dyn Router>,
    stats: Arc<StatsTracker>,
    latency_penalty_ms: f64,
    error_rate_threshold: f64,
}

impl LoadAwareRouter {
    /// Creates the wrapper with default thresholds
    pub fn new(
        experts: Vec<ExpertId>,
        base: Box<dyn Router>,
        stats: Arc<StatsTracker>,
    ) -> Result<Self, RouterBuildError> {
        validate_experts(&experts)?;
        Ok(Self {
            experts,
            base,
            stats,
            latency_penalty_ms: DEFAULT_LATENCY_PENALTY_MS,
            error_rate_threshold: DEFAULT_ERROR_RATE_THRESHOLD,
        })
    }

    /// Overrides the avoidance thresholds
    #[must_use]
    pub fn with_thresholds(mut self, latency_penalty_ms: f64, error_rate_threshold: f64) -> Self {
        self.latency_penalty_ms = latency_penalty_ms;
        self.error_rate_threshold = error_rate_threshold;
        self
    }

    /// The configured latency penalty threshold
    #[must_use]
    pub fn latency_penalty_ms(&self) -> f64 {
        self.latency_penalty_ms
    }

    /// The configured error-rate threshold
    #[must_use]
    pub fn error_rate_threshold(&self) -> f64 {
        self.error_rate_threshold
    }

    /// An expert with no stats entry is available
    fn is_available(&self, expert: &ExpertId) -> bool {
        match self.stats.probe(expert) {
            None => true,
            Some(health) => {
                !health.is_rate_limited && health.error_rate < self.error_rate_threshold
            }
        }
    }

    /// Lower is better: latency EMA plus degradation penalties
    fn load_score(&self, expert: &ExpertId) -> f64 {
        let Some(health) = self.stats.probe(expert) else {
            return 0.0;
        };
        let mut score = health.latency_ema_ms;
        if health.is_rate_limited {
            score += RATE_LIMIT_PENALTY;
        }
        if health.error_rate >= self.error_rate_threshold {
            score += ERROR_RATE_PENALTY;
        }
        score
    }
}

impl Router for LoadAwareRouter {
    fn experts(&self) -> &[ExpertId] {
        &self.experts
    }

    fn route(&mut self, query: &str) -> ExpertId {
        let preferred = self.base.route(query);
        if self.is_available(&preferred) {
            return preferred;
        }

        let mut best: Option<(ExpertId, f64)> = None;
        for expert in &self.experts {
            if *expert == preferred || !self.is_available(expert) {
                continue;
            }
            let score = self.load_score(expert);
            if best.as_ref().is_none_or(|(_, top)| score < *top) {
                best = Some((expert.clone(), score));
            }
        }

        match best {
            Some((expert, score)) => {
                debug!(
                    preferred = %preferred,
                    rerouted_to = %expert,
                    load_score = score,
                    "preferred expert degraded, rerouting"
                );
                expert
            }
            None => {
                warn!(preferred = %preferred, "all experts degraded, using fallback");
                self.fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_types::RateLimitRps;

    fn id(s: &str) -> ExpertId {
        ExpertId::try_new(s.to_string()).unwrap()
    }

    fn ids(names: &[&str]) -> Vec<ExpertId> {
        names.iter().map(|n| id(n)).collect()
    }

    /// Base router that always prefers one expert
    struct Pinned {
        experts: Vec<ExpertId>,
        pick: ExpertId,
    }

    impl Router for Pinned {
        fn experts(&self) -> &[ExpertId] {
            &self.experts
        }

        fn route(&mut self, _query: &str) -> ExpertId {
            self.pick.clone()
        }
    }

    fn pinned(names: &[&str], pick: &str) -> Box<dyn Router> {
        Box::new(Pinned {
            experts: ids(names),
            pick: id(pick),
        })
    }

    fn rate_limit(stats: &StatsTracker, expert: &ExpertId, rps: f64) {
        stats.set_rate_limit(expert, Some(RateLimitRps::try_new(rps).unwrap()));
        stats.record_request(expert);
    }

    #[test]
    fn healthy_preferred_expert_passes_through() {
        let names = ["A", "B", "C"];
        let stats = Arc::new(StatsTracker::new(ids(&names)));
        let mut router =
            LoadAwareRouter::new(ids(&names), pinned(&names, "A"), stats).unwrap();
        assert_eq!(router.route("x").to_string(), "A");
    }

    #[test]
    fn rate_limited_preferred_reroutes_to_lowest_load_score() {
        let names = ["A", "B", "C"];
        let stats = Arc::new(StatsTracker::new(ids(&names)));
        rate_limit(&stats, &id("A"), 1.0);
        stats.record_result(&id("B"), 500.0, true);
        stats.record_result(&id("C"), 50.0, true);

        let mut router =
            LoadAwareRouter::new(ids(&names), pinned(&names, "A"), Arc::clone(&stats)).unwrap();
        assert_eq!(router.route("x").to_string(), "C");
    }

    #[test]
    fn error_prone_preferred_is_avoided() {
        let names = ["A", "B"];
        let stats = Arc::new(StatsTracker::new(ids(&names)));
        for _ in 0..4 {
            stats.record_request(&id("A"));
            stats.record_result(&id("A"), 10.0, false);
        }
        let mut router =
            LoadAwareRouter::new(ids(&names), pinned(&names, "A"), stats).unwrap();
        assert_eq!(router.route("x").to_string(), "B");
    }

    #[test]
    fn all_degraded_falls_back_to_first_registered() {
        let names = ["A", "B"];
        let stats = Arc::new(StatsTracker::new(ids(&names)));
        rate_limit(&stats, &id("A"), 1.0);
        rate_limit(&stats, &id("B"), 1.0);
        let mut router =
            LoadAwareRouter::new(ids(&names), pinned(&names, "B"), stats).unwrap();
        assert_eq!(router.route("x").to_string(), "A");
    }

    #[test]
    fn missing_stats_means_available() {
        let names = ["A", "B"];
        // Tracker knows neither expert: everything is available.
        let stats = Arc::new(StatsTracker::new(Vec::<ExpertId>::new()));
        let mut router =
            LoadAwareRouter::new(ids(&names), pinned(&names, "B"), stats).unwrap();
        assert_eq!(router.route("x").to_string(), "B");
    }

    #[test]
    fn error_rate_below_threshold_keeps_preferred() {
        let names = ["A", "B"];
        let stats = Arc::new(StatsTracker::new(ids(&names)));
        for i in 0..10 {
            stats.record_request(&id("A"));
            stats.record_result(&id("A"), 10.0, i > 3);
        }
        // 4 errors in 10 requests: below the 0.5 default threshold.
        let mut router =
            LoadAwareRouter::new(ids(&names), pinned(&names, "A"), stats).unwrap();
        assert_eq!(router.route("x").to_string(), "A");
    }
}
