//! Router-side publisher
//!
//! Owns one long-lived bus connection and exactly one scheduler thread
//! that drives all I/O. Many caller threads submit jobs over a channel
//! and block on completion handles; no caller ever touches the
//! connection directly. Sharing one loop is the load-bearing decision
//! here: with a loop per caller the connection cannot be shared and
//! every request after the first starves waiting for a driver.
//!
//! `ask` never returns an error type. Timeouts (after the retry budget),
//! no-responders, and scheduler shutdown all surface as synthetic ERROR
//! responses so callers handle exactly one shape.

use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Duration;

use async_nats::client::RequestErrorKind;
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bus;
use crate::config::BusConfig;
use crate::domain_types::ExpertId;
use crate::error::PublishError;
use crate::wire;

/// Floor of the retry backoff sleep in milliseconds
const BACKOFF_FLOOR_MS: u64 = 150;

/// Work submitted to the scheduler thread
enum Job {
    Ask {
        expert_id: ExpertId,
        payload: String,
        request_id: String,
        reply: oneshot::Sender<wire::Response>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Request-reply client with timeout, bounded retries, and jittered backoff
pub struct Publisher {
    jobs: mpsc::UnboundedSender<Job>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher").finish_non_exhaustive()
    }
}

impl Publisher {
    /// Starts the scheduler thread and connects to the bus
    ///
    /// # Errors
    /// Rejected configuration, a failed initial connection, or a failed
    /// thread/runtime startup. Once this returns `Ok`, transport
    /// failures no longer surface as errors.
    pub fn connect(config: BusConfig) -> Result<Self, PublishError> {
        config.validate()?;

        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), PublishError>>();

        let scheduler = std::thread::Builder::new()
            .name("ditq-publisher".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        let _ = ready_tx.send(Err(PublishError::Scheduler {
                            message: format!("runtime build failed: {err}"),
                        }));
                        return;
                    }
                };
                runtime.block_on(scheduler_loop(config, jobs_rx, ready_tx));
            })
            .map_err(|err| PublishError::Scheduler {
                message: format!("thread spawn failed: {err}"),
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                jobs: jobs_tx,
                scheduler: Mutex::new(Some(scheduler)),
            }),
            Ok(Err(err)) => {
                let _ = scheduler.join();
                Err(err)
            }
            Err(_) => {
                let _ = scheduler.join();
                Err(PublishError::Scheduler {
                    message: "scheduler exited before signalling readiness".to_string(),
                })
            }
        }
    }

    /// Sends a request to `models.<expert_id>` and blocks for the reply
    ///
    /// A fresh request id is generated for the invocation and reused
    /// across retries.
    #[must_use]
    pub fn ask(&self, expert_id: &ExpertId, payload: &str) -> wire::Response {
        self.ask_with_request_id(expert_id, payload, Uuid::new_v4().to_string())
    }

    /// Like [`Publisher::ask`] with a caller-supplied correlation key
    #[must_use]
    pub fn ask_with_request_id(
        &self,
        expert_id: &ExpertId,
        payload: &str,
        request_id: String,
    ) -> wire::Response {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job::Ask {
            expert_id: expert_id.clone(),
            payload: payload.to_string(),
            request_id: request_id.clone(),
            reply: reply_tx,
        };
        if self.jobs.send(job).is_err() {
            return wire::Response::error(
                request_id,
                expert_id.as_str(),
                "publisher closed",
                0,
            );
        }
        match reply_rx.blocking_recv() {
            Ok(response) => response,
            // Scheduler shut down with the job still pending.
            Err(_) => wire::Response::error(
                request_id,
                expert_id.as_str(),
                "publisher shut down before reply",
                0,
            ),
        }
    }

    /// Stops the scheduler and drains the connection
    ///
    /// Pending submissions resolve to synthetic ERROR responses.
    pub fn close(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.jobs.send(Job::Shutdown { done: done_tx }).is_ok() {
            let _ = done_rx.blocking_recv();
        }
        let handle = self
            .scheduler
            .lock()
            .expect("publisher scheduler lock poisoned")
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("publisher scheduler thread panicked");
            }
        }
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        // Dropping the sender alone would leave the scheduler parked on
        // recv forever; ask for an orderly shutdown instead.
        let handle = self
            .scheduler
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        let Some(handle) = handle else { return };
        let (done_tx, _done_rx) = oneshot::channel();
        let _ = self.jobs.send(Job::Shutdown { done: done_tx });
        // Joining would block an async runtime; only wait when dropped
        // from a plain thread.
        if tokio::runtime::Handle::try_current().is_err() {
            let _ = handle.join();
        }
    }
}

/// The cooperative I/O loop run by the scheduler thread
async fn scheduler_loop(
    config: BusConfig,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    ready: std::sync::mpsc::Sender<Result<(), PublishError>>,
) {
    let client = match bus::connect(&config.url).await {
        Ok(client) => client,
        Err(err) => {
            let _ = ready.send(Err(PublishError::Connect {
                url: config.url.clone(),
                source: Box::new(err),
            }));
            return;
        }
    };
    info!(url = %config.url, "publisher connected");
    let _ = ready.send(Ok(()));

    let timeout = config.timeout_ms.as_duration();
    let max_retries = config.max_retries.as_u32();

    let mut shutdown_done = None;
    while let Some(job) = jobs.recv().await {
        match job {
            Job::Ask {
                expert_id,
                payload,
                request_id,
                reply,
            } => {
                let client = client.clone();
                tokio::spawn(async move {
                    let response =
                        perform_ask(&client, &expert_id, &payload, request_id, timeout, max_retries)
                            .await;
                    // Caller may have given up; nothing to do then.
                    let _ = reply.send(response);
                });
            }
            Job::Shutdown { done } => {
                shutdown_done = Some(done);
                break;
            }
        }
    }

    jobs.close();
    if let Err(err) = client.drain().await {
        warn!(error = %err, "bus drain failed during shutdown");
    }
    info!("publisher scheduler stopped");
    if let Some(done) = shutdown_done {
        let _ = done.send(());
    }
    // Any tasks still awaiting replies are dropped with the runtime;
    // their callers observe a closed handle and synthesize an ERROR.
}

/// One logical ask: bounded retries around the per-attempt timeout
async fn perform_ask(
    client: &async_nats::Client,
    expert_id: &ExpertId,
    payload: &str,
    request_id: String,
    timeout: Duration,
    max_retries: u32,
) -> wire::Response {
    let request = wire::Request {
        request_id: request_id.clone(),
        expert_id: expert_id.to_string(),
        payload: payload.to_string(),
    };
    let data = match request.encode() {
        Ok(data) => data,
        Err(err) => {
            return wire::Response::error(
                request_id,
                expert_id.as_str(),
                format!("encode failed: {err}"),
                0,
            );
        }
    };
    let subject = bus::subject_for(expert_id);

    let mut attempt: u32 = 0;
    loop {
        let bus_request = async_nats::Request::new()
            .payload(data.clone())
            .timeout(Some(timeout));
        match client.send_request(subject.clone(), bus_request).await {
            Ok(message) => match wire::Response::decode(&message.payload) {
                Ok(response) => {
                    debug!(request_id = %response.request_id, status = ?response.status, "reply received");
                    return response;
                }
                Err(err) => {
                    return wire::Response::error(
                        request_id,
                        expert_id.as_str(),
                        format!("bad reply: {err}"),
                        0,
                    );
                }
            },
            Err(err) => match err.kind() {
                RequestErrorKind::NoResponders => {
                    warn!(subject = %subject, "no responders");
                    return wire::Response::error(
                        request_id,
                        expert_id.as_str(),
                        format!("no responders on {subject}"),
                        0,
                    );
                }
                RequestErrorKind::TimedOut => {
                    if attempt >= max_retries {
                        let tries = attempt + 1;
                        warn!(subject = %subject, tries, "request timed out, retry budget spent");
                        return wire::Response::error(
                            request_id,
                            expert_id.as_str(),
                            format!("timeout after {tries} tries"),
                            0,
                        );
                    }
                    attempt += 1;
                    let backoff = jittered_backoff(attempt);
                    debug!(subject = %subject, attempt, backoff_ms = backoff.as_millis() as u64, "request timed out, retrying");
                    tokio::time::sleep(backoff).await;
                }
                _ => {
                    return wire::Response::error(
                        request_id,
                        expert_id.as_str(),
                        format!("transport error: {err}"),
                        0,
                    );
                }
            },
        }
    }
}

/// Uniform sleep in `[150 ms, 150 * 2^attempt ms]`
fn jittered_backoff(attempt: u32) -> Duration {
    let ceiling = BACKOFF_FLOOR_MS.saturating_mul(1u64 << attempt.min(20));
    let millis = rand::thread_rng().gen_range(BACKOFF_FLOOR_MS..=ceiling.max(BACKOFF_FLOOR_MS));
    Duration::from_millis(millis)
}
