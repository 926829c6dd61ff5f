//! Registry lookup and liveness probing.
//!
//! Jooki devices register themselves with the vendor's cloud registry, which
//! answers with the devices it has seen on the caller's network. A registry
//! entry can be stale, so each candidate is probed over local HTTP before it
//! is reported as discovered.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{DiscoveryError, Result};
use crate::{DeviceDescriptor, DiscoveredDevice, PingInfo};

/// Vendor registry endpoint that lists devices on the caller's network.
pub const REGISTRY_URL: &str = "https://my.jooki.rocks/api/discover/v2/local_jooki";

/// Registry entry wire format.
#[derive(Debug, Deserialize)]
struct RegistryEntry {
    #[serde(rename = "Hostname")]
    hostname: String,
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Ip")]
    ip: String,
}

pub(crate) fn discover_at(registry_url: &str, timeout: Duration) -> Result<Vec<DiscoveredDevice>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()?;

    let response = client
        .get(registry_url)
        .query(&[("", cache_buster())])
        .send()?;
    if !response.status().is_success() {
        return Err(DiscoveryError::BadStatus {
            status: response.status().as_u16(),
            context: "device registry",
        });
    }

    let entries: Vec<RegistryEntry> = response.json()?;
    if entries.is_empty() {
        return Err(DiscoveryError::NoDevices);
    }
    tracing::debug!(candidates = entries.len(), "registry answered");

    let mut online = Vec::new();
    for entry in entries {
        let descriptor = DeviceDescriptor {
            hostname: entry.hostname,
            id: entry.id,
            address: entry.ip,
        };
        match ping_at(&client, &descriptor.address) {
            Ok(ping) => online.push(DiscoveredDevice { descriptor, ping }),
            Err(err) => {
                tracing::debug!(address = %descriptor.address, %err, "device did not answer ping");
            }
        }
    }

    if online.is_empty() {
        return Err(DiscoveryError::NoneOnline);
    }
    Ok(online)
}

pub(crate) fn ping_address(address: &str, timeout: Duration) -> Result<PingInfo> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()?;
    ping_at(&client, address)
}

fn ping_at(client: &reqwest::blocking::Client, address: &str) -> Result<PingInfo> {
    let url = format!("http://{address}/ping");
    let response = client.get(&url).query(&[("", cache_buster())]).send()?;
    if !response.status().is_success() {
        return Err(DiscoveryError::BadStatus {
            status: response.status().as_u16(),
            context: "liveness probe",
        });
    }
    Ok(response.json()?)
}

/// The device's embedded server caches aggressively; a random query string
/// defeats that, matching what the vendor's web app sends.
fn cache_buster() -> String {
    format!("{}", rand::random::<f64>())
}
