//! Error types for ditq
//!
//! One enum per concern, mirroring the seams of the system: experts,
//! the wire codec, the publisher, the subscriber, and the dispatcher.
//! Transport failures never cross the publisher API boundary as errors;
//! they are converted into synthetic ERROR responses there. The types in
//! this module cover everything that does surface to callers.

use thiserror::Error;

use crate::domain_types::ExpertId;

/// Errors raised by an expert invocation
#[derive(Debug, Error)]
pub enum ExpertError {
    /// The expert has no callable bound yet
    #[error("expert not ready: no model bound")]
    NotReady,

    /// The underlying model callable failed
    ///
    /// `kind` carries the failure class (an exception/type name or a
    /// synthetic marker such as `RemoteError`); the wire format for this
    /// is `"<kind>: <message>"`.
    #[error("{kind}: {message}")]
    Failed {
        /// Failure class
        kind: String,
        /// Human-readable detail
        message: String,
    },
}

impl ExpertError {
    /// Builds a [`ExpertError::Failed`] from a kind and message
    pub fn failed(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the wire codec
#[derive(Debug, Error)]
pub enum WireError {
    /// The payload could not be decoded as a request or response record
    #[error("bad record: {source}")]
    Decode {
        /// Underlying serde failure
        #[source]
        source: serde_json::Error,
    },

    /// The record could not be encoded
    #[error("encode failed: {source}")]
    Encode {
        /// Underlying serde failure
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while establishing or tearing down the publisher
///
/// Note that `ask` itself is infallible at the API boundary: timeouts,
/// no-responders, and scheduler shutdown all surface as synthetic ERROR
/// responses, not as this type.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The configuration was rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Initial connection to the bus failed
    #[error("connect to {url} failed: {source}")]
    Connect {
        /// Bus address
        url: String,
        /// Underlying client failure
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The scheduler thread could not be started
    #[error("scheduler startup failed: {message}")]
    Scheduler {
        /// Detail
        message: String,
    },
}

/// Errors raised by the subscriber loop
#[derive(Debug, Error)]
pub enum SubscribeError {
    /// The configuration was rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Initial connection to the bus failed
    #[error("connect to {url} failed: {source}")]
    Connect {
        /// Bus address
        url: String,
        /// Underlying client failure
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Subscribing to the expert subject failed
    #[error("subscribe to {subject} failed: {source}")]
    Subscribe {
        /// Subject name
        subject: String,
        /// Underlying client failure
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Errors raised by the dispatcher façade
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The router produced an id that is not in the expert table
    ///
    /// This is an invariant violation: routers must only return
    /// registered experts.
    #[error("router produced unknown expert: {expert_id}")]
    UnknownExpert {
        /// The offending id
        expert_id: ExpertId,
    },

    /// The selected expert failed to produce a response
    #[error("expert {expert_id} failed: {source}")]
    ExpertFailed {
        /// The expert that was invoked
        expert_id: ExpertId,
        /// Underlying expert failure
        #[source]
        source: ExpertError,
    },
}

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field failed validation
    #[error("invalid configuration: {field} - {reason}")]
    Validation {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },
}
