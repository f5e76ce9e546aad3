//! Tunnel error types.

use std::time::Duration;

use hyper::StatusCode;
use thiserror::Error;

pub type TunnelResult<T> = Result<T, TunnelError>;

/// Errors that end a CONNECT request before the connection is upgraded.
///
/// Each maps to the HTTP status sent back to the client. Failures after
/// the upgrade never surface here; they only end the relay.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("Expect CONNECT method")]
    MethodNotAllowed,

    #[error("Service {0} not found")]
    ServiceNotFound(String),

    #[error("Server does not support hijack")]
    UpgradeUnsupported,

    #[error("dial {target}: {source}")]
    Dial {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dial {target}: timed out after {limit:?}")]
    DialTimeout { target: String, limit: Duration },
}

impl TunnelError {
    /// HTTP status reported to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            TunnelError::MethodNotAllowed => StatusCode::BAD_REQUEST,
            TunnelError::ServiceNotFound(_) => StatusCode::NOT_FOUND,
            TunnelError::UpgradeUnsupported => StatusCode::INTERNAL_SERVER_ERROR,
            TunnelError::Dial { .. } | TunnelError::DialTimeout { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}
