//! Device, power, network, and account subtrees.

use serde::{Deserialize, Serialize};

use crate::merge::{overwrite, recurse, SparseMerge};

/// Hardware and firmware identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "diskUsage", default, skip_serializing_if = "Option::is_none")]
    pub disk_usage: Option<DiskUsage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,

    #[serde(rename = "toy_safe", default, skip_serializing_if = "Option::is_none")]
    pub toy_safe: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webapp: Option<String>,

    #[serde(rename = "wifi_mac", default, skip_serializing_if = "Option::is_none")]
    pub wifi_mac: Option<String>,
}

impl SparseMerge for Device {
    fn merge_from(&mut self, delta: Self) {
        recurse(&mut self.disk_usage, delta.disk_usage);
        overwrite(&mut self.firmware, delta.firmware);
        overwrite(&mut self.hostname, delta.hostname);
        overwrite(&mut self.id, delta.id);
        overwrite(&mut self.ip, delta.ip);
        overwrite(&mut self.machine, delta.machine);
        overwrite(&mut self.toy_safe, delta.toy_safe);
        overwrite(&mut self.usage, delta.usage);
        overwrite(&mut self.webapp, delta.webapp);
        overwrite(&mut self.wifi_mac, delta.wifi_mac);
    }
}

/// On-device storage usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used: Option<i64>,

    #[serde(rename = "usedPercent", default, skip_serializing_if = "Option::is_none")]
    pub used_percent: Option<i8>,
}

impl SparseMerge for DiskUsage {
    fn merge_from(&mut self, delta: Self) {
        overwrite(&mut self.available, delta.available);
        overwrite(&mut self.total, delta.total);
        overwrite(&mut self.used, delta.used);
        overwrite(&mut self.used_percent, delta.used_percent);
    }
}

/// Battery and charger state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Power {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charging: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<PowerLevel>,
}

impl SparseMerge for Power {
    fn merge_from(&mut self, delta: Self) {
        overwrite(&mut self.charging, delta.charging);
        overwrite(&mut self.connected, delta.connected);
        recurse(&mut self.level, delta.level);
    }
}

/// Raw battery telemetry (millivolts, percent, temperature).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerLevel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mv: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<i64>,
}

impl SparseMerge for PowerLevel {
    fn merge_from(&mut self, delta: Self) {
        overwrite(&mut self.mv, delta.mv);
        overwrite(&mut self.p, delta.p);
        overwrite(&mut self.t, delta.t);
    }
}

/// Wireless link state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wifi {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
}

impl SparseMerge for Wifi {
    fn merge_from(&mut self, delta: Self) {
        overwrite(&mut self.signal, delta.signal);
        overwrite(&mut self.ssid, delta.ssid);
    }
}

/// Firmware updater state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mender {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl SparseMerge for Mender {
    fn merge_from(&mut self, delta: Self) {
        overwrite(&mut self.event, delta.event);
        overwrite(&mut self.state, delta.state);
    }
}

/// Registered owner account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(rename = "firstName", default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(rename = "lastName", default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing: Option<bool>,
}

impl SparseMerge for Owner {
    fn merge_from(&mut self, delta: Self) {
        overwrite(&mut self.email, delta.email);
        overwrite(&mut self.first_name, delta.first_name);
        overwrite(&mut self.last_name, delta.last_name);
        overwrite(&mut self.marketing, delta.marketing);
    }
}

/// Spotify integration state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spotify {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl SparseMerge for Spotify {
    fn merge_from(&mut self, delta: Self) {
        overwrite(&mut self.active, delta.active);
    }
}

/// Device settings. The firmware currently publishes these under a disabled key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "quietTime", default, skip_serializing_if = "Option::is_none")]
    pub quiet_time: Option<QuietTime>,
}

impl SparseMerge for Settings {
    fn merge_from(&mut self, delta: Self) {
        recurse(&mut self.quiet_time, delta.quiet_time);
    }
}

/// Scheduled nightly shutdown window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuietTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown: Option<TimeOfDay>,
}

impl SparseMerge for QuietTime {
    fn merge_from(&mut self, delta: Self) {
        overwrite(&mut self.active, delta.active);
        recurse(&mut self.shutdown, delta.shutdown);
    }
}

/// Wall-clock time of day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeOfDay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minute: Option<u8>,
}

impl SparseMerge for TimeOfDay {
    fn merge_from(&mut self, delta: Self) {
        overwrite(&mut self.hour, delta.hour);
        overwrite(&mut self.minute, delta.minute);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_merge_recurses_into_disk_usage() {
        let mut device: Device = serde_json::from_str(
            r#"{"hostname": "living-room", "diskUsage": {"available": 100, "total": 200}}"#,
        )
        .unwrap();
        let delta: Device =
            serde_json::from_str(r#"{"diskUsage": {"available": 50}}"#).unwrap();
        device.merge_from(delta);

        let usage = device.disk_usage.unwrap();
        assert_eq!(usage.available, Some(50));
        assert_eq!(usage.total, Some(200));
        assert_eq!(device.hostname.as_deref(), Some("living-room"));
    }

    #[test]
    fn test_power_decodes_wire_shape() {
        let power: Power = serde_json::from_str(
            r#"{"charging": true, "connected": true, "level": {"mv": 4100, "p": 87, "t": 31}}"#,
        )
        .unwrap();
        assert_eq!(power.charging, Some(true));
        assert_eq!(power.level.unwrap().p, Some(87));
    }
}
