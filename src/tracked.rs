//! Stats-feeding remote callable
//!
//! Adapts [`Publisher::ask`] into an expert callable that reports every
//! invocation to the [`StatsTracker`]: the request event before the call,
//! the latency sample and success bit after it. The tracker is updated
//! before any failure is re-raised, so the load-aware router sees the
//! error even when the caller bails out.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::bus::Publisher;
use crate::domain_types::ExpertId;
use crate::error::ExpertError;
use crate::expert::Expert;
use crate::stats::StatsTracker;

/// Remote expert adapter that records health stats around each call
#[derive(Debug)]
pub struct TrackedRemote {
    publisher: Arc<Publisher>,
    expert_id: ExpertId,
    stats: Arc<StatsTracker>,
}

impl TrackedRemote {
    /// Creates the adapter for one expert
    #[must_use]
    pub fn new(publisher: Arc<Publisher>, expert_id: ExpertId, stats: Arc<StatsTracker>) -> Self {
        Self {
            publisher,
            expert_id,
            stats,
        }
    }

    /// Sends the query to the remote expert, feeding the tracker
    ///
    /// # Errors
    /// [`ExpertError::Failed`] with the remote error message when the
    /// response status is ERROR.
    pub fn call(&self, query: &str) -> Result<String, ExpertError> {
        self.stats.record_request(&self.expert_id);
        let started = Instant::now();
        let response = self.publisher.ask(&self.expert_id, query);
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        let success = response.is_success();
        self.stats
            .record_result(&self.expert_id, latency_ms, success);
        debug!(
            expert_id = %self.expert_id,
            latency_ms,
            success,
            "remote call tracked"
        );

        if success {
            Ok(response.payload)
        } else {
            let message = if response.error_message.is_empty() {
                "remote expert error".to_string()
            } else {
                response.error_message
            };
            Err(ExpertError::failed("RemoteError", message))
        }
    }

    /// Wraps the adapter into an [`Expert`] for the dispatcher's table
    #[must_use]
    pub fn into_expert(self) -> Expert {
        let expert_id = self.expert_id.clone();
        Expert::with_callable(expert_id, move |query| self.call(query))
    }
}
