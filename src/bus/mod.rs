//! Bus transport: subject conventions and the request-reply peers
//!
//! Requests for an expert travel on subject `models.<expert_id>`; workers
//! for that expert share the queue group `ditq.<expert_id>` (overridable)
//! so the bus delivers each request to exactly one member. Both peers use
//! the same connection policy: unbounded reconnect attempts 500 ms apart
//! and a 10 s liveness ping.

mod publisher;
mod subscriber;

pub use publisher::Publisher;
pub use subscriber::Subscriber;

use std::time::Duration;

use tracing::{info, warn};

use crate::config::{PING_INTERVAL_SECS, RECONNECT_DELAY_MS};
use crate::domain_types::ExpertId;

/// Subject prefix for expert request subjects
pub const SUBJECT_PREFIX: &str = "models";

/// Prefix of the default worker group names
pub const QUEUE_GROUP_PREFIX: &str = "ditq";

/// The request subject for an expert
#[must_use]
pub fn subject_for(expert_id: &ExpertId) -> String {
    format!("{SUBJECT_PREFIX}.{expert_id}")
}

/// The default worker group for an expert
#[must_use]
pub fn default_queue_group(expert_id: &ExpertId) -> String {
    format!("{QUEUE_GROUP_PREFIX}.{expert_id}")
}

/// Connects to the bus with the shared reconnect/ping policy
pub(crate) async fn connect(url: &str) -> Result<async_nats::Client, async_nats::ConnectError> {
    async_nats::ConnectOptions::new()
        .max_reconnects(None::<usize>)
        .reconnect_delay_callback(|_attempts| Duration::from_millis(RECONNECT_DELAY_MS))
        .ping_interval(Duration::from_secs(PING_INTERVAL_SECS))
        .event_callback(|event| async move {
            match event {
                async_nats::Event::Connected => info!("bus connected"),
                async_nats::Event::Disconnected => warn!("bus disconnected, reconnecting"),
                other => info!(event = %other, "bus event"),
            }
        })
        .connect(url)
        .await
}
