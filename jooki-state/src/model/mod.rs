//! The device state tree.
//!
//! Every subtree and every field is independently optional: presence means
//! "the device has told us this at some point", never a default. The tree is
//! used both for the persistent snapshot and for per-notification deltas,
//! which are the same shape with most fields absent.

mod audio;
mod library;
mod system;

pub use audio::{Audio, AudioConfig, NowPlaying, Playback, PlaybackState};
pub use library::{Library, Playlist, Token, Track, TrackQuery};
pub use system::{
    Device, DiskUsage, Mender, Owner, Power, PowerLevel, QuietTime, Settings, Spotify, TimeOfDay,
    Wifi,
};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::merge::{overwrite, recurse, SparseMerge};

/// Everything known about the device, or a partial delta of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    /// The firmware publishes settings under a deliberately disabled key.
    #[serde(
        rename = "DISABLEDsettings",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub settings: Option<Settings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<Audio>,

    #[serde(rename = "bt", default, skip_serializing_if = "Option::is_none")]
    pub bluetooth: Option<String>,

    #[serde(rename = "db", default, skip_serializing_if = "Option::is_none")]
    pub library: Option<Library>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mender: Option<Mender>,

    /// Shape varies across firmware versions; kept as raw JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfc: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<Power>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spotify: Option<Spotify>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi: Option<Wifi>,
}

impl SparseMerge for DeviceState {
    fn merge_from(&mut self, delta: Self) {
        recurse(&mut self.settings, delta.settings);
        recurse(&mut self.audio, delta.audio);
        overwrite(&mut self.bluetooth, delta.bluetooth);
        recurse(&mut self.library, delta.library);
        recurse(&mut self.device, delta.device);
        recurse(&mut self.mender, delta.mender);
        overwrite(&mut self.nfc, delta.nfc);
        recurse(&mut self.owner, delta.owner);
        recurse(&mut self.power, delta.power);
        recurse(&mut self.spotify, delta.spotify);
        recurse(&mut self.wifi, delta.wifi);
    }
}

impl DeviceState {
    /// Current playback transport state, if known.
    pub fn playback_state(&self) -> Option<&PlaybackState> {
        self.audio.as_ref()?.playback.as_ref()?.state.as_ref()
    }

    /// Current playback position in milliseconds, if known.
    pub fn position_ms(&self) -> Option<u64> {
        self.audio.as_ref()?.playback.as_ref()?.position_ms
    }

    /// Current volume, if known.
    pub fn volume(&self) -> Option<u8> {
        self.audio.as_ref()?.config.as_ref()?.volume
    }

    /// Id of the track currently loaded in the player, if any.
    pub fn now_playing_track_id(&self) -> Option<&str> {
        self.audio
            .as_ref()?
            .now_playing
            .as_ref()?
            .track_id
            .as_deref()
    }

    /// Id of the playlist currently loaded in the player, if any.
    pub fn now_playing_playlist_id(&self) -> Option<&str> {
        self.audio
            .as_ref()?
            .now_playing
            .as_ref()?
            .playlist_id
            .as_deref()
    }

    /// The library's playlist map, if the device has reported it.
    pub fn playlists(&self) -> Option<&HashMap<String, Playlist>> {
        self.library.as_ref()?.playlists.as_ref()
    }

    /// The library's track map, if the device has reported it.
    pub fn tracks(&self) -> Option<&HashMap<String, Track>> {
        self.library.as_ref()?.tracks.as_ref()
    }
}
