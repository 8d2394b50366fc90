//! ditq client CLI
//!
//! Builds a dispatcher over a set of experts and streams queries through
//! it. Experts are either remote workers reached over the bus (the
//! default) or local echo callables (`--echo`) for runs without a bus.
//! Prints one JSON line per query and a stats snapshot at the end.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::warn;

use ditq::routing::DescriptorMapping;
use ditq::{
    BusConfig, Dispatcher, DomainRouter, Expert, ExpertId, FirstMatchDomainRouter,
    LoadAwareRouter, MaxRetries, Publisher, RoundRobinRouter, Router, StatsTracker, TimeoutMs,
    TrackedRemote, expert_table,
};

/// Routing strategy selection
#[derive(Debug, Clone, Copy, ValueEnum)]
enum RouterChoice {
    /// Cycle through experts in registration order
    RoundRobin,
    /// Tally descriptor keyword hits per expert
    Domain,
    /// First descriptor keyword hit wins
    DomainFirst,
    /// Health-aware wrapper over the domain router
    LoadAware,
}

/// Client for the ditq dispatcher
#[derive(Parser)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Bus address
    #[arg(long, default_value = ditq::config::DEFAULT_BUS_URL)]
    nats_url: String,

    /// Expert ids matching the workers' --expert-id values
    #[arg(long, required = true, num_args = 1..)]
    experts: Vec<String>,

    /// Routing strategy
    #[arg(long, value_enum, default_value = "round-robin")]
    router: RouterChoice,

    /// JSON file mapping expert ids to descriptor keywords
    #[arg(long)]
    mapping_file: Option<PathBuf>,

    /// Per-attempt reply timeout in milliseconds
    #[arg(long, default_value_t = 3000)]
    timeout_ms: u64,

    /// Additional attempts after the first
    #[arg(long, default_value_t = 2)]
    retries: u32,

    /// Use local echo experts instead of the bus
    #[arg(long)]
    echo: bool,

    /// Queries to dispatch; reads stdin lines when empty
    queries: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("ditq=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let expert_ids = args
        .experts
        .iter()
        .map(|name| ExpertId::try_new(name.clone()).with_context(|| format!("bad expert id: {name}")))
        .collect::<Result<Vec<_>>>()?;
    let mapping = load_mapping(args.mapping_file.as_deref())?;
    let stats = Arc::new(StatsTracker::new(expert_ids.iter().cloned()));

    let publisher = if args.echo {
        None
    } else {
        let config = BusConfig::new(args.nats_url.clone())
            .with_timeout_ms(TimeoutMs::try_new(args.timeout_ms)?)
            .with_max_retries(MaxRetries::try_new(args.retries)?);
        Some(Arc::new(Publisher::connect(config)?))
    };

    let table = expert_table(expert_ids.iter().map(|id| match &publisher {
        Some(publisher) => TrackedRemote::new(
            Arc::clone(publisher),
            id.clone(),
            Arc::clone(&stats),
        )
        .into_expert(),
        None => Expert::echo(id.clone()),
    }));

    let router = build_router(args.router, &expert_ids, &mapping, &stats)?;
    let dispatcher = Dispatcher::new(table, router);

    if args.queries.is_empty() {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = line.context("stdin read failed")?;
            if !line.trim().is_empty() {
                dispatch_one(&dispatcher, &line);
            }
        }
    } else {
        for query in &args.queries {
            dispatch_one(&dispatcher, query);
        }
    }

    println!("{}", serde_json::to_string_pretty(&stats.snapshot())?);
    if let Some(publisher) = publisher {
        publisher.close();
    }
    Ok(())
}

/// Dispatches one query and prints the outcome as a JSON line
fn dispatch_one(dispatcher: &Dispatcher, query: &str) {
    match dispatcher.exec(query) {
        Ok(result) => println!(
            "{}",
            serde_json::json!({
                "query": query,
                "expert": result.expert.to_string(),
                "response": result.response,
            })
        ),
        Err(err) => {
            warn!(error = %err, "dispatch failed");
            println!(
                "{}",
                serde_json::json!({
                    "query": query,
                    "error": err.to_string(),
                })
            );
        }
    }
}

/// Loads the descriptor mapping, empty when no file is given
fn load_mapping(path: Option<&std::path::Path>) -> Result<DescriptorMapping> {
    let Some(path) = path else {
        return Ok(DescriptorMapping::new());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read mapping file {}", path.display()))?;
    let parsed: HashMap<String, Vec<String>> =
        serde_json::from_str(&raw).context("mapping file is not an id -> keywords object")?;
    parsed
        .into_iter()
        .map(|(name, descriptors)| {
            let id = ExpertId::try_new(name.clone())
                .with_context(|| format!("bad expert id in mapping: {name}"))?;
            Ok((id, descriptors))
        })
        .collect()
}

/// Builds the selected routing strategy
fn build_router(
    choice: RouterChoice,
    expert_ids: &[ExpertId],
    mapping: &DescriptorMapping,
    stats: &Arc<StatsTracker>,
) -> Result<Box<dyn Router>> {
    let experts = expert_ids.to_vec();
    let router: Box<dyn Router> = match choice {
        RouterChoice::RoundRobin => Box::new(RoundRobinRouter::new(experts)?),
        RouterChoice::Domain => Box::new(DomainRouter::new(experts, mapping)?),
        RouterChoice::DomainFirst => Box::new(FirstMatchDomainRouter::new(experts, mapping)?),
        RouterChoice::LoadAware => {
            let base = DomainRouter::new(experts.clone(), mapping)?;
            Box::new(LoadAwareRouter::new(
                experts,
                Box::new(base),
                Arc::clone(stats),
            )?)
        }
    };
    Ok(router)
}
