//! Wire codec for bus request/response records
//!
//! The bus carries opaque byte payloads; framing is the bus's concern.
//! Records are a fixed field set encoded as JSON. Status values travel as
//! integer codes so that peers built against a newer revision of the
//! record still decode: any unknown code reads as [`Status::Error`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::WireError;

/// Outcome of a remote expert invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Status {
    /// The expert produced a payload
    Success = 1,
    /// The expert or transport failed; see `error_message`
    Error = 2,
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        match status {
            Status::Success => 1,
            Status::Error => 2,
        }
    }
}

impl From<u8> for Status {
    fn from(code: u8) -> Self {
        match code {
            1 => Status::Success,
            _ => Status::Error,
        }
    }
}

/// Request record published on `models.<expert_id>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation key; a fresh UUID per invocation, stable across retries
    pub request_id: String,
    /// Target expert
    pub expert_id: String,
    /// The query text
    pub payload: String,
}

impl Request {
    /// Serializes the record for the bus
    pub fn encode(&self) -> Result<Bytes, WireError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|source| WireError::Encode { source })
    }

    /// Deserializes a record received from the bus
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        serde_json::from_slice(data).map_err(|source| WireError::Decode { source })
    }
}

/// Response record sent on the per-request reply inbox
///
/// `error_message` is empty iff `status == Status::Success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Echo of the request's correlation key (empty when the request
    /// itself could not be parsed)
    pub request_id: String,
    /// The expert that handled (or was meant to handle) the request
    pub expert_id: String,
    /// The expert's output, empty on error
    pub payload: String,
    /// Success or error
    pub status: Status,
    /// Milliseconds from slot-acquired to reply-serialize, as measured by
    /// the subscriber; 0 for synthetic responses
    pub latency_ms: u32,
    /// Failure detail, empty on success
    pub error_message: String,
}

impl Response {
    /// Builds a success response
    #[must_use]
    pub fn success(
        request_id: impl Into<String>,
        expert_id: impl Into<String>,
        payload: impl Into<String>,
        latency_ms: u32,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            expert_id: expert_id.into(),
            payload: payload.into(),
            status: Status::Success,
            latency_ms,
            error_message: String::new(),
        }
    }

    /// Builds an error response
    #[must_use]
    pub fn error(
        request_id: impl Into<String>,
        expert_id: impl Into<String>,
        error_message: impl Into<String>,
        latency_ms: u32,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            expert_id: expert_id.into(),
            payload: String::new(),
            status: Status::Error,
            latency_ms,
            error_message: error_message.into(),
        }
    }

    /// True iff the invocation succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Serializes the record for the bus
    pub fn encode(&self) -> Result<Bytes, WireError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|source| WireError::Encode { source })
    }

    /// Deserializes a record received from the bus
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        serde_json::from_slice(data).map_err(|source| WireError::Decode { source })
    }
}
