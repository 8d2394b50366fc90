//! # ditq - Distributed Inference Router & Dispatcher
//!
//! ditq is a small control plane for routing free-text queries across a
//! fleet of remote model workers ("experts"). A pluggable routing policy
//! picks an expert, a NATS request-reply transport carries the query to a
//! worker group with timeouts and jittered retries, and a live health
//! feedback loop (latency EMA, error rate, rate-limit windows) steers
//! routing away from degraded experts.
//!
//! ## Architecture
//!
//! ```text
//! client --> Dispatcher --> Router (round-robin | domain | embedding | load-aware)
//!               |                          ^
//!               v                          | reads
//!            Expert (tracked remote) --> StatsTracker
//!               |                          ^
//!               v                          | feeds
//!            Publisher ==== bus subject models.<expert_id> ==== Subscriber --> Expert
//! ```
//!
//! The publisher owns exactly one scheduler thread driving all bus I/O;
//! caller threads submit work and block on completion handles. Workers
//! subscribe in queue group `ditq.<expert_id>` so each request reaches
//! exactly one member, and they always reply - success or structured
//! error.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use ditq::{Dispatcher, Expert, ExpertId, RoundRobinRouter, expert_table};
//!
//! let ids: Vec<ExpertId> = ["flan-t5", "biomedlm"]
//!     .into_iter()
//!     .map(|name| ExpertId::try_new(name.to_string()).unwrap())
//!     .collect();
//! let table = expert_table(ids.iter().map(|id| Expert::echo(id.clone())));
//! let router = RoundRobinRouter::new(ids).unwrap();
//!
//! let dispatcher = Dispatcher::new(table, Box::new(router));
//! let result = dispatcher.exec("hello").unwrap();
//! assert_eq!(result.expert.as_str(), "flan-t5");
//! ```

pub mod bus;
pub mod config;
pub mod dispatcher;
pub mod domain_types;
pub mod error;
pub mod expert;
pub mod routing;
pub mod stats;
pub mod tracked;
pub mod wire;

pub use crate::bus::{Publisher, Subscriber};
pub use crate::config::BusConfig;
pub use crate::dispatcher::{Dispatch, Dispatcher};
pub use crate::domain_types::{ExpertId, MaxInflight, MaxRetries, RateLimitRps, TimeoutMs};
pub use crate::error::{
    ConfigError, DispatchError, ExpertError, PublishError, SubscribeError, WireError,
};
pub use crate::expert::{Expert, ExpertFn, ExpertTable, ModelLoader, expert_table};
pub use crate::routing::{
    DescriptorMapping, DomainIndex, DomainRouter, EmbeddingRouter, Encoder,
    FirstMatchDomainRouter, LoadAwareRouter, RoundRobinRouter, Router, RouterBuildError,
};
pub use crate::stats::{ExpertSnapshot, StatsSnapshot, StatsTracker};
pub use crate::tracked::TrackedRemote;
pub use crate::wire::Status;
