//! Audio subtree: player configuration, the current track, and transport state.

use serde::{Deserialize, Serialize};

use crate::codec::{lenient_record, ImageRef, RepeatMode};
use crate::merge::{overwrite, recurse, SparseMerge};

/// Audio state root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Audio {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<AudioConfig>,

    /// Sent as `[]` by the device when nothing is queued; that decodes as absent.
    #[serde(
        rename = "nowPlaying",
        default,
        deserialize_with = "lenient_record",
        skip_serializing_if = "Option::is_none"
    )]
    pub now_playing: Option<NowPlaying>,

    #[serde(
        default,
        deserialize_with = "lenient_record",
        skip_serializing_if = "Option::is_none"
    )]
    pub playback: Option<Playback>,
}

impl SparseMerge for Audio {
    fn merge_from(&mut self, delta: Self) {
        recurse(&mut self.config, delta.config);
        recurse(&mut self.now_playing, delta.now_playing);
        recurse(&mut self.playback, delta.playback);
    }
}

/// Player configuration (volume, shuffle, repeat).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(rename = "repeat_mode", default, skip_serializing_if = "Option::is_none")]
    pub repeat_mode: Option<RepeatMode>,

    #[serde(rename = "shuffle_mode", default, skip_serializing_if = "Option::is_none")]
    pub shuffle_mode: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
}

impl SparseMerge for AudioConfig {
    fn merge_from(&mut self, delta: Self) {
        overwrite(&mut self.repeat_mode, delta.repeat_mode);
        overwrite(&mut self.shuffle_mode, delta.shuffle_mode);
        overwrite(&mut self.volume, delta.volume);
    }
}

/// The track currently loaded in the player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NowPlaying {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audiobook: Option<bool>,

    #[serde(rename = "duration_ms", default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,

    #[serde(rename = "hasNext", default, skip_serializing_if = "Option::is_none")]
    pub has_next: Option<bool>,

    #[serde(rename = "hasPrev", default, skip_serializing_if = "Option::is_none")]
    pub has_prev: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,

    #[serde(rename = "playlistId", default, skip_serializing_if = "Option::is_none")]
    pub playlist_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Track title; the wire key is `track`.
    #[serde(rename = "track", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(rename = "trackId", default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,

    #[serde(rename = "trackIndex", default, skip_serializing_if = "Option::is_none")]
    pub track_index: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl SparseMerge for NowPlaying {
    fn merge_from(&mut self, delta: Self) {
        overwrite(&mut self.album, delta.album);
        overwrite(&mut self.artist, delta.artist);
        overwrite(&mut self.audiobook, delta.audiobook);
        overwrite(&mut self.duration_ms, delta.duration_ms);
        overwrite(&mut self.has_next, delta.has_next);
        overwrite(&mut self.has_prev, delta.has_prev);
        overwrite(&mut self.image, delta.image);
        overwrite(&mut self.playlist_id, delta.playlist_id);
        overwrite(&mut self.service, delta.service);
        overwrite(&mut self.source, delta.source);
        overwrite(&mut self.title, delta.title);
        overwrite(&mut self.track_id, delta.track_id);
        overwrite(&mut self.track_index, delta.track_index);
        overwrite(&mut self.uri, delta.uri);
    }
}

/// Transport state and position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Playback {
    #[serde(rename = "position_ms", default, skip_serializing_if = "Option::is_none")]
    pub position_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PlaybackState>,
}

impl SparseMerge for Playback {
    fn merge_from(&mut self, delta: Self) {
        overwrite(&mut self.position_ms, delta.position_ms);
        overwrite(&mut self.state, delta.state);
    }
}

/// Playback transport states reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlaybackState {
    Starting,
    Playing,
    Paused,
    Ended,
    /// A state this library does not know about, preserved as received.
    Other(String),
}

impl From<String> for PlaybackState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "STARTING" => PlaybackState::Starting,
            "PLAYING" => PlaybackState::Playing,
            "PAUSED" => PlaybackState::Paused,
            "ENDED" => PlaybackState::Ended,
            _ => PlaybackState::Other(value),
        }
    }
}

impl From<PlaybackState> for String {
    fn from(state: PlaybackState) -> String {
        match state {
            PlaybackState::Starting => "STARTING".to_string(),
            PlaybackState::Playing => "PLAYING".to_string(),
            PlaybackState::Paused => "PAUSED".to_string(),
            PlaybackState::Ended => "ENDED".to_string(),
            PlaybackState::Other(raw) => raw,
        }
    }
}
