//! Error types for jooki-discovery.

/// Convenience type alias for Results using DiscoveryError.
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors that can occur during device discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// An HTTP request failed outright
    #[error("discovery request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The registry or a device answered with a non-success status
    #[error("HTTP {status} from {context}")]
    BadStatus {
        /// Numeric HTTP status code
        status: u16,
        /// Which request failed
        context: &'static str,
    },

    /// The registry reported no devices on this network
    #[error("no Jooki devices found")]
    NoDevices,

    /// Devices were registered but none answered the liveness probe
    #[error("no Jooki devices online")]
    NoneOnline,
}
