//! Jooki device discovery.
//!
//! Jooki speakers don't answer multicast discovery; instead each device
//! registers with the vendor's cloud registry, which lists the devices seen
//! behind the caller's public IP. This crate queries that registry and then
//! probes each candidate on the local network to confirm it is actually
//! reachable.
//!
//! # Quick Start
//!
//! ```no_run
//! use jooki_discovery::discover;
//!
//! let devices = discover().unwrap();
//! for device in devices {
//!     println!(
//!         "found {} at {} (firmware {})",
//!         device.descriptor.hostname, device.descriptor.address, device.ping.version
//!     );
//! }
//! ```

mod discovery;
mod error;

pub use discovery::REGISTRY_URL;
pub use error::{DiscoveryError, Result};

use std::time::Duration;

use serde::Deserialize;

/// Identity and address of a Jooki device, as handed to session construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// mDNS hostname, e.g. "jooki-1a2b"
    pub hostname: String,
    /// Stable device id assigned by the vendor
    pub id: String,
    /// IP address (or host:port) on the local network
    pub address: String,
}

/// Answer from a device's local liveness probe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PingInfo {
    /// Firmware version string
    pub version: String,
}

/// A registry entry confirmed reachable on the local network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub descriptor: DeviceDescriptor,
    pub ping: PingInfo,
}

/// Discover reachable Jooki devices with a default 5-second timeout.
pub fn discover() -> Result<Vec<DiscoveredDevice>> {
    discover_with_timeout(Duration::from_secs(5))
}

/// Discover reachable Jooki devices with a custom per-request timeout.
pub fn discover_with_timeout(timeout: Duration) -> Result<Vec<DiscoveredDevice>> {
    discovery::discover_at(REGISTRY_URL, timeout)
}

/// Discover against a non-default registry endpoint (primarily for tests).
pub fn discover_at(registry_url: &str, timeout: Duration) -> Result<Vec<DiscoveredDevice>> {
    discovery::discover_at(registry_url, timeout)
}

/// Probe a single device's liveness endpoint directly.
pub fn ping(address: &str, timeout: Duration) -> Result<PingInfo> {
    discovery::ping_address(address, timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_filters_unreachable_devices() {
        let mut server = mockito::Server::new();
        let host = server.host_with_port();

        let registry_body = format!(
            r#"[{{"Hostname": "jooki-1a2b", "Id": "dev-1", "Ip": "{host}", "State": "up"}}]"#
        );
        let registry = server
            .mock("GET", "/api/discover/v2/local_jooki")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(registry_body)
            .create();
        let ping = server
            .mock("GET", "/ping")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"version": "2.5.1"}"#)
            .create();

        let url = format!("{}/api/discover/v2/local_jooki", server.url());
        let devices = discover_at(&url, Duration::from_secs(2)).unwrap();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].descriptor.hostname, "jooki-1a2b");
        assert_eq!(devices[0].descriptor.id, "dev-1");
        assert_eq!(devices[0].ping.version, "2.5.1");

        registry.assert();
        ping.assert();
    }

    #[test]
    fn test_discover_empty_registry_is_an_error() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/api/discover/v2/local_jooki")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create();

        let url = format!("{}/api/discover/v2/local_jooki", server.url());
        let result = discover_at(&url, Duration::from_secs(2));
        assert!(matches!(result, Err(DiscoveryError::NoDevices)));
    }

    #[test]
    fn test_discover_offline_devices_is_an_error() {
        let mut server = mockito::Server::new();
        // Registry lists a device at an address that will refuse the probe.
        server
            .mock("GET", "/api/discover/v2/local_jooki")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[{"Hostname": "jooki-dead", "Id": "dev-9", "Ip": "127.0.0.1:1", "State": "up"}]"#,
            )
            .create();

        let url = format!("{}/api/discover/v2/local_jooki", server.url());
        let result = discover_at(&url, Duration::from_secs(2));
        assert!(matches!(result, Err(DiscoveryError::NoneOnline)));
    }

    #[test]
    fn test_ping_parses_version() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/ping")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"version": "2.6.0"}"#)
            .create();

        let info = ping(&server.host_with_port(), Duration::from_secs(2)).unwrap();
        assert_eq!(info.version, "2.6.0");
    }
}
