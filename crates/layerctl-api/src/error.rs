//! Listener failures for the layer control API. Both variants name the address involved so
//! a failed start or a dropped listener can be traced to its configured bind point.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Result alias for API server operations.
pub type ApiServerResult<T> = std::result::Result<T, ApiServerError>;

/// The control API could not start or stopped serving.
#[derive(Debug, Error)]
pub enum ApiServerError {
    /// The configured address was unavailable.
    #[error("could not bind the layer control API to {addr}")]
    Bind {
        /// Address from `LAYERCTL_BIND_ADDR` and `LAYERCTL_HTTP_PORT`.
        addr: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The accept loop failed after the listener was up.
    #[error("layer control API on {addr} stopped serving")]
    Serve {
        /// Address the listener was bound to.
        addr: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl ApiServerError {
    /// Address the failing listener was configured for.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        match self {
            Self::Bind { addr, .. } | Self::Serve { addr, .. } => *addr,
        }
    }
}
