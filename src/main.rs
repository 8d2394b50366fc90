//! ditq worker daemon
//!
//! Serves one expert over the bus: subscribes to `models.<expert_id>` in
//! a worker group and answers requests. Without a real model backend the
//! worker binds an echo expert, which is enough to smoke-test routing and
//! transport end to end.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use ditq::{BusConfig, Expert, ExpertId, MaxInflight, Subscriber};

/// Expert-side worker for the ditq bus
#[derive(Parser)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Bus address
    #[arg(long, default_value = ditq::config::DEFAULT_BUS_URL)]
    nats_url: String,

    /// Expert id to serve; also selects subject and default queue group
    #[arg(long)]
    expert_id: String,

    /// Worker group override (default: ditq.<expert_id>)
    #[arg(long)]
    queue_group: Option<String>,

    /// Bound on concurrent in-flight expert invocations
    #[arg(long, default_value_t = 64)]
    max_inflight: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("ditq=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let expert_id = ExpertId::try_new(args.expert_id)?;

    let mut config = BusConfig::new(args.nats_url)
        .with_max_inflight(MaxInflight::try_new(args.max_inflight)?);
    if let Some(group) = args.queue_group {
        config = config.with_queue_group(group);
    }

    let expert = Arc::new(Expert::echo(expert_id.clone()));
    let subscriber = Subscriber::new(config, expert_id.clone(), expert);

    info!(expert_id = %expert_id, "worker starting");
    tokio::select! {
        served = subscriber.serve() => served?,
        _ = tokio::signal::ctrl_c() => info!("interrupt received, shutting down"),
    }
    Ok(())
}
