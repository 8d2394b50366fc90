//! Routing strategy benchmarks
//!
//! Measures the per-query cost of each routing family over a fixed
//! expert set, with a trivial encoder standing in for the real one so
//! the embedding numbers reflect the router, not the model.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};

use ditq::routing::DescriptorMapping;
use ditq::{
    DomainRouter, EmbeddingRouter, Encoder, ExpertId, FirstMatchDomainRouter, LoadAwareRouter,
    RoundRobinRouter, Router, StatsTracker,
};

fn ids(names: &[&str]) -> Vec<ExpertId> {
    names
        .iter()
        .map(|n| ExpertId::try_new((*n).to_string()).unwrap())
        .collect()
}

fn mapping() -> DescriptorMapping {
    let entries: &[(&str, &[&str])] = &[
        ("travel", &["flight", "hotel", "visa", "airport"]),
        ("sports", &["match", "league", "medal", "athlete"]),
        ("finance", &["stock", "loan", "budget", "dividend"]),
        ("literature", &["novel", "poem", "author", "prose"]),
    ];
    entries
        .iter()
        .map(|(expert, descriptors)| {
            (
                ExpertId::try_new((*expert).to_string()).unwrap(),
                descriptors.iter().map(|d| (*d).to_string()).collect(),
            )
        })
        .collect()
}

/// Hash-bucket encoder: cheap, deterministic, unit-norm
struct BucketEncoder;

impl Encoder for BucketEncoder {
    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; 16];
        for token in text.split_whitespace() {
            let bucket = token
                .bytes()
                .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
                % vec.len();
            vec[bucket] += 1.0;
        }
        let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vec {
                *x /= norm;
            }
        }
        vec
    }
}

const QUERY: &str = "what budget should a stock and loan heavy portfolio keep for travel";

fn bench_routers(c: &mut Criterion) {
    let experts = ids(&["travel", "sports", "finance", "literature"]);
    let mapping = mapping();

    let mut group = c.benchmark_group("route");

    let mut round_robin = RoundRobinRouter::new(experts.clone()).unwrap();
    group.bench_function("round_robin", |b| {
        b.iter(|| black_box(round_robin.route(black_box(QUERY))));
    });

    let mut domain = DomainRouter::new(experts.clone(), &mapping).unwrap();
    group.bench_function("domain_tally", |b| {
        b.iter(|| black_box(domain.route(black_box(QUERY))));
    });

    let mut first_match = FirstMatchDomainRouter::new(experts.clone(), &mapping).unwrap();
    group.bench_function("domain_first_match", |b| {
        b.iter(|| black_box(first_match.route(black_box(QUERY))));
    });

    let mut embedding = EmbeddingRouter::new(experts.clone(), Arc::new(BucketEncoder)).unwrap();
    group.bench_function("embedding", |b| {
        b.iter(|| black_box(embedding.route(black_box(QUERY))));
    });

    let stats = Arc::new(StatsTracker::new(experts.iter().cloned()));
    for expert in &experts {
        stats.record_request(expert);
        stats.record_result(expert, 25.0, true);
    }
    let base = DomainRouter::new(experts.clone(), &mapping).unwrap();
    let mut load_aware =
        LoadAwareRouter::new(experts.clone(), Box::new(base), Arc::clone(&stats)).unwrap();
    group.bench_function("load_aware_domain", |b| {
        b.iter(|| black_box(load_aware.route(black_box(QUERY))));
    });

    group.finish();
}

fn bench_stats(c: &mut Criterion) {
    let experts = ids(&["travel", "sports", "finance", "literature"]);
    let stats = StatsTracker::new(experts.iter().cloned());
    let target = &experts[0];

    let mut group = c.benchmark_group("stats");
    group.bench_function("record_request_and_result", |b| {
        b.iter(|| {
            stats.record_request(black_box(target));
            stats.record_result(black_box(target), black_box(12.5), true);
        });
    });
    group.bench_function("snapshot", |b| {
        b.iter(|| black_box(stats.snapshot()));
    });
    group.finish();
}

criterion_group!(benches, bench_routers, bench_stats);
criterion_main!(benches);
