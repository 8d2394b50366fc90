//! Dispatcher + load-aware feedback loop, end to end without a bus
//!
//! The experts here record their own outcomes into the shared tracker,
//! standing in for the tracked remote adapter, so the loop
//! "dispatch -> stats -> routing decision" can be exercised hermetically.

use std::sync::Arc;

use ditq::{
    Dispatcher, Expert, ExpertId, LoadAwareRouter, RoundRobinRouter, Router, StatsTracker,
    expert_table,
};

fn id(s: &str) -> ExpertId {
    ExpertId::try_new(s.to_string()).unwrap()
}

fn ids(names: &[&str]) -> Vec<ExpertId> {
    names.iter().map(|n| id(n)).collect()
}

/// Base router that always prefers its first expert
struct Sticky(Vec<ExpertId>);

impl Router for Sticky {
    fn experts(&self) -> &[ExpertId] {
        &self.0
    }
    fn route(&mut self, _query: &str) -> ExpertId {
        self.0[0].clone()
    }
}

/// Expert that records a result into the tracker on every call
fn reporting_expert(
    expert_id: ExpertId,
    stats: Arc<StatsTracker>,
    latency_ms: f64,
    fail: bool,
) -> Expert {
    let own_id = expert_id.clone();
    Expert::with_callable(expert_id, move |query| {
        stats.record_request(&own_id);
        stats.record_result(&own_id, latency_ms, !fail);
        if fail {
            Err(ditq::ExpertError::failed("Boom", "synthetic failure"))
        } else {
            Ok(format!("[{own_id}] {query}"))
        }
    })
}

#[test_log::test]
fn traffic_shifts_away_from_a_failing_expert() {
    let experts = ids(&["primary", "backup"]);
    let stats = Arc::new(StatsTracker::new(experts.iter().cloned()));

    let table = expert_table([
        reporting_expert(id("primary"), Arc::clone(&stats), 20.0, true),
        reporting_expert(id("backup"), Arc::clone(&stats), 80.0, false),
    ]);
    let router = LoadAwareRouter::new(
        experts.clone(),
        Box::new(Sticky(experts)),
        Arc::clone(&stats),
    )
    .unwrap();
    let dispatcher = Dispatcher::new(table, Box::new(router));

    // The first calls hit the preferred expert and fail; each failure
    // feeds the tracker until its error rate crosses the 0.5 threshold.
    let mut failures = 0;
    let mut reroutes = 0;
    for _ in 0..10 {
        match dispatcher.exec("question") {
            Err(_) => failures += 1,
            Ok(result) => {
                assert_eq!(result.expert, id("backup"));
                reroutes += 1;
            }
        }
    }
    assert!(failures >= 1, "preferred expert should fail at least once");
    assert!(reroutes >= 1, "traffic should shift to the healthy expert");

    // Once shifted, it stays shifted: the failing expert's error rate
    // never recovers without successes.
    let result = dispatcher.exec("again").unwrap();
    assert_eq!(result.expert, id("backup"));
}

#[test]
fn router_swap_changes_decisions_between_calls() {
    let experts = ids(&["a", "b"]);
    let table = expert_table(experts.iter().map(|e| Expert::echo(e.clone())));
    let dispatcher = Dispatcher::new(
        table,
        Box::new(Sticky(experts.clone())),
    );

    assert_eq!(dispatcher.exec("q").unwrap().expert, id("a"));
    assert_eq!(dispatcher.exec("q").unwrap().expert, id("a"));

    dispatcher.set_router(Box::new(RoundRobinRouter::new(ids(&["b", "a"])).unwrap()));
    assert_eq!(dispatcher.exec("q").unwrap().expert, id("b"));
    assert_eq!(dispatcher.exec("q").unwrap().expert, id("a"));
}

#[test]
fn snapshot_reflects_dispatched_traffic() {
    let experts = ids(&["solo"]);
    let stats = Arc::new(StatsTracker::new(experts.iter().cloned()));
    let table = expert_table([reporting_expert(
        id("solo"),
        Arc::clone(&stats),
        15.0,
        false,
    )]);
    let dispatcher = Dispatcher::new(
        table,
        Box::new(RoundRobinRouter::new(experts).unwrap()),
    );

    for _ in 0..5 {
        dispatcher.exec("q").unwrap();
    }

    let snapshot = stats.snapshot();
    let solo = &snapshot[&id("solo")];
    assert_eq!(solo.request_count, 5);
    assert!((solo.latency_ema_ms - 15.0).abs() < 1e-9);
    assert!(!solo.is_rate_limited);
    assert!(solo.error_rate.abs() < 1e-9);
}
