//! Expert-side subscriber
//!
//! Consumes requests from `models.<expert_id>` in a worker group, runs
//! the expert, and replies: always, exactly once per request. Parse
//! failures, expert failures, and panics all become ERROR replies; only
//! a failed reply publish is ever dropped, and that is logged.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::bus;
use crate::config::BusConfig;
use crate::domain_types::ExpertId;
use crate::error::{ExpertError, SubscribeError};
use crate::expert::Expert;
use crate::wire;

/// Worker that serves one expert over the bus
#[derive(Debug)]
pub struct Subscriber {
    config: BusConfig,
    expert_id: ExpertId,
    expert: Arc<Expert>,
}

impl Subscriber {
    /// Creates a worker for the expert
    #[must_use]
    pub fn new(config: BusConfig, expert_id: ExpertId, expert: Arc<Expert>) -> Self {
        Self {
            config,
            expert_id,
            expert,
        }
    }

    /// The worker group this subscriber joins
    #[must_use]
    pub fn queue_group(&self) -> String {
        self.config
            .queue_group
            .clone()
            .unwrap_or_else(|| bus::default_queue_group(&self.expert_id))
    }

    /// Connects, subscribes, and serves requests until the stream ends
    ///
    /// In-flight expert invocations are bounded by the configured
    /// semaphore; the bus delivers each request to one group member.
    pub async fn serve(&self) -> Result<(), SubscribeError> {
        self.config.validate()?;

        let client =
            bus::connect(&self.config.url)
                .await
                .map_err(|err| SubscribeError::Connect {
                    url: self.config.url.clone(),
                    source: Box::new(err),
                })?;

        let subject = bus::subject_for(&self.expert_id);
        let group = self.queue_group();
        let mut requests = client
            .queue_subscribe(subject.clone(), group.clone())
            .await
            .map_err(|err| SubscribeError::Subscribe {
                subject: subject.clone(),
                source: Box::new(err),
            })?;
        info!(subject = %subject, queue_group = %group, "subscribed");

        let slots = Arc::new(Semaphore::new(self.config.max_inflight.as_usize()));
        while let Some(message) = requests.next().await {
            let client = client.clone();
            let expert = Arc::clone(&self.expert);
            let expert_id = self.expert_id.clone();
            let slots = Arc::clone(&slots);
            tokio::spawn(async move {
                let Ok(_permit) = slots.acquire_owned().await else {
                    // Semaphore closed: shutting down.
                    return;
                };
                handle_message(&client, &expert, &expert_id, message).await;
            });
        }
        info!(subject = %subject, "subscription stream ended");
        Ok(())
    }
}

/// Parses, runs, and replies to one request
async fn handle_message(
    client: &async_nats::Client,
    expert: &Arc<Expert>,
    expert_id: &ExpertId,
    message: async_nats::Message,
) {
    let started = Instant::now();

    let response = match wire::Request::decode(&message.payload) {
        Err(err) => {
            warn!(error = %err, "unparseable request");
            wire::Response::error("", expert_id.as_str(), format!("bad request: {err}"), 0)
        }
        Ok(request) => {
            debug!(request_id = %request.request_id, "request received");
            let outcome = run_expert(Arc::clone(expert), request.payload).await;
            let latency_ms = elapsed_ms(started);
            match outcome {
                Ok(payload) => wire::Response::success(
                    request.request_id,
                    expert_id.as_str(),
                    payload,
                    latency_ms,
                ),
                Err(err) => {
                    warn!(request_id = %request.request_id, error = %err, "expert failed");
                    wire::Response::error(
                        request.request_id,
                        expert_id.as_str(),
                        err.to_string(),
                        latency_ms,
                    )
                }
            }
        }
    };

    let Some(reply) = message.reply else {
        warn!("request carried no reply subject, response dropped");
        return;
    };
    match response.encode() {
        Ok(data) => {
            if let Err(err) = client.publish(reply, data).await {
                // Best effort only: the requester's timeout covers us.
                warn!(error = %err, "reply publish failed");
            } else {
                debug!(
                    request_id = %response.request_id,
                    status = ?response.status,
                    latency_ms = response.latency_ms,
                    "replied"
                );
            }
        }
        Err(err) => error!(error = %err, "reply encode failed"),
    }
}

/// Runs the expert off the I/O loop, converting panics into failures
async fn run_expert(expert: Arc<Expert>, query: String) -> Result<String, ExpertError> {
    match tokio::task::spawn_blocking(move || expert.run(&query)).await {
        Ok(result) => result,
        Err(join_err) => Err(ExpertError::failed("Panic", join_err.to_string())),
    }
}

/// Milliseconds since `started`, saturating at `u32::MAX`
fn elapsed_ms(started: Instant) -> u32 {
    u32::try_from(started.elapsed().as_millis()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Status;

    fn id(s: &str) -> ExpertId {
        ExpertId::try_new(s.to_string()).unwrap()
    }

    #[tokio::test]
    async fn expert_failure_becomes_kind_and_message() {
        let expert = Arc::new(Expert::with_callable(id("x"), |_| {
            Err(ExpertError::failed("Boom", "detail"))
        }));
        let err = run_expert(expert, "q".to_string()).await.unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("Boom"));
        assert!(rendered.contains("detail"));
    }

    #[tokio::test]
    async fn panicking_expert_still_yields_an_error() {
        let expert = Arc::new(Expert::with_callable(id("x"), |_| panic!("kaput")));
        let err = run_expert(expert, "q".to_string()).await.unwrap_err();
        assert!(matches!(err, ExpertError::Failed { .. }));
    }

    #[tokio::test]
    async fn unloaded_expert_yields_not_ready() {
        let expert = Arc::new(Expert::new(id("x")));
        let err = run_expert(expert, "q".to_string()).await.unwrap_err();
        assert!(matches!(err, ExpertError::NotReady));
    }

    #[test]
    fn default_queue_group_is_derived_from_the_expert() {
        let subscriber = Subscriber::new(
            BusConfig::default(),
            id("flan-t5"),
            Arc::new(Expert::echo(id("flan-t5"))),
        );
        assert_eq!(subscriber.queue_group(), "ditq.flan-t5");
    }

    #[test]
    fn queue_group_override_wins() {
        let subscriber = Subscriber::new(
            BusConfig::default().with_queue_group("pool-a"),
            id("flan-t5"),
            Arc::new(Expert::echo(id("flan-t5"))),
        );
        assert_eq!(subscriber.queue_group(), "pool-a");
    }

    #[test]
    fn parse_failure_response_shape() {
        let response =
            wire::Response::error("", "flan-t5", "bad request: bad record: oops", 0);
        assert_eq!(response.status, Status::Error);
        assert!(response.request_id.is_empty());
    }
}
