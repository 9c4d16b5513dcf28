use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::fmt;
use thiserror::Error;

use crate::response::TransportFailure;

/// Message returned to callers when a call fails for reasons they cannot fix.
pub const RETRY_LATER: &str = "Internal error processing. Retry later";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Contract,
    Remote,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Contract => "contract",
            ErrorKind::Remote => "remote",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything a contract call can fail with.
#[derive(Debug, Error)]
pub enum CallError {
    /// The declaration or the live arguments cannot be turned into a request.
    #[error("contract error: {0}")]
    Contract(String),

    /// The remote service answered with a non-success status.
    #[error("remote service answered {status}")]
    Remote {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },

    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl CallError {
    pub fn contract(message: impl Into<String>) -> Self {
        CallError::Contract(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CallError::Internal {
            message: message.into(),
            source: None,
        }
    }

    pub fn internal_with(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        CallError::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::Contract(_) => ErrorKind::Contract,
            CallError::Remote { .. } => ErrorKind::Remote,
            CallError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Only connection-level failures are worth another attempt by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            CallError::Internal {
                source: Some(source),
                ..
            } => matches!(
                source.downcast_ref::<TransportFailure>(),
                Some(TransportFailure::Connection { .. })
            ),
            _ => false,
        }
    }

    /// Status of a remote failure, if there was one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CallError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<TransportFailure> for CallError {
    fn from(failure: TransportFailure) -> Self {
        match failure {
            TransportFailure::Response {
                status,
                headers,
                body,
            } => CallError::Remote {
                status,
                headers,
                body,
            },
            connection @ TransportFailure::Connection { .. } => {
                CallError::internal_with(RETRY_LATER, connection)
            }
        }
    }
}
