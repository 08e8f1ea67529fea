//! Error types for callouts.
//!
//! # Design
//! `TransportError` covers failures to communicate at all. A 404 or 500 is a
//! perfectly good `HttpResponse` and never lands here. `CalloutError` adds the
//! two failures that happen before or around the transport: an invalid
//! descriptor and an illegal job state transition.

use std::fmt;

use thiserror::Error;

/// Why the mock transport had nothing to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMiss {
    /// No responses were ever registered for the endpoint key.
    Unregistered,
    /// A response sequence was registered and every entry has been consumed.
    Exhausted,
}

impl fmt::Display for MockMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockMiss::Unregistered => write!(f, "nothing registered"),
            MockMiss::Exhausted => write!(f, "sequence exhausted"),
        }
    }
}

/// Failure to complete a round-trip with the target endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The call did not finish within its `timeout_ms`.
    #[error("call to `{endpoint_key}` timed out after {timeout_ms} ms")]
    Timeout { endpoint_key: String, timeout_ms: u64 },

    /// The endpoint could not be reached (DNS, connect, broken stream).
    #[error("could not reach `{endpoint_key}`: {message}")]
    Connection { endpoint_key: String, message: String },

    /// Raised only by `MockTransport`.
    #[error("no mock response for `{endpoint_key}`: {reason}")]
    NoMockConfigured { endpoint_key: String, reason: MockMiss },
}

impl TransportError {
    pub fn endpoint_key(&self) -> &str {
        match self {
            TransportError::Timeout { endpoint_key, .. }
            | TransportError::Connection { endpoint_key, .. }
            | TransportError::NoMockConfigured { endpoint_key, .. } => endpoint_key,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }

    pub fn is_no_mock(&self) -> bool {
        matches!(self, TransportError::NoMockConfigured { .. })
    }
}

/// Errors surfaced by descriptor validation, executors and the job queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalloutError {
    /// The descriptor is incomplete or a submission was refused up front.
    #[error("invalid call: {0}")]
    Validation(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A job was asked to make a transition its state machine forbids.
    #[error("invalid state: {0}")]
    State(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_mock_error_carries_key() {
        let err = TransportError::NoMockConfigured {
            endpoint_key: "Acme".to_string(),
            reason: MockMiss::Exhausted,
        };
        assert!(err.is_no_mock());
        assert!(!err.is_timeout());
        assert_eq!(err.endpoint_key(), "Acme");
        assert_eq!(err.to_string(), "no mock response for `Acme`: sequence exhausted");
    }

    #[test]
    fn transport_error_converts_transparently() {
        let inner = TransportError::Timeout {
            endpoint_key: "Acme".to_string(),
            timeout_ms: 10,
        };
        let err: CalloutError = inner.clone().into();
        assert_eq!(err.to_string(), inner.to_string());
        assert_eq!(err, CalloutError::Transport(inner));
    }
}
