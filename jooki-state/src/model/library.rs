//! Library subtree: playlists, tracks, and NFC tokens.
//!
//! Library entries are keyed by opaque ids that are *not* part of the entry
//! payload on the wire. Lookup helpers inject the map key into the returned
//! record's `id` field so callers always see a self-identifying value.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::codec::{FloatString, IntString};
use crate::merge::{union, SparseMerge};

/// The device's content library. Wire key is `db`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Library {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlists: Option<HashMap<String, Playlist>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<HashMap<String, Token>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracks: Option<HashMap<String, Track>>,
}

impl SparseMerge for Library {
    fn merge_from(&mut self, delta: Self) {
        union(&mut self.playlists, delta.playlists);
        union(&mut self.tokens, delta.tokens);
        union(&mut self.tracks, delta.tracks);
    }
}

impl Library {
    /// Look up a playlist, injecting the map key as its id.
    pub fn playlist(&self, id: &str) -> Option<Playlist> {
        let mut playlist = self.playlists.as_ref()?.get(id)?.clone();
        playlist.id = Some(id.to_string());
        Some(playlist)
    }

    /// Look up a track, injecting the map key as its id.
    pub fn track(&self, id: &str) -> Option<Track> {
        let mut track = self.tracks.as_ref()?.get(id)?.clone();
        track.id = Some(id.to_string());
        Some(track)
    }

    /// Look up a token, injecting the map key as its id.
    pub fn token(&self, id: &str) -> Option<Token> {
        let mut token = self.tokens.as_ref()?.get(id)?.clone();
        token.id = Some(id.to_string());
        Some(token)
    }

    /// Find a track matching a metadata query.
    ///
    /// A direct device-id match wins. Otherwise candidates are compared on
    /// title/album/artist (empty and absent are treated alike), exact byte
    /// size, and duration within one second. Iteration order over the library
    /// map is arbitrary, so ambiguous queries return an arbitrary match.
    pub fn find_track(&self, query: &TrackQuery) -> Option<Track> {
        if let Some(id) = &query.device_id {
            if let Some(track) = self.track(id) {
                return Some(track);
            }
        }
        let tracks = self.tracks.as_ref()?;
        for (id, track) in tracks {
            if !text_matches(query.title.as_deref(), track.title.as_deref()) {
                continue;
            }
            if !text_matches(query.album.as_deref(), track.album.as_deref()) {
                continue;
            }
            if !text_matches(query.artist.as_deref(), track.artist.as_deref()) {
                continue;
            }
            if let (Some(want), Some(have)) = (query.size, track.size) {
                if want as i64 != have.0 {
                    continue;
                }
            }
            if let (Some(want_ms), Some(have_s)) = (query.total_time_ms, track.duration) {
                if ((want_ms as f64) - have_s.0 * 1000.0).abs() > 1000.0 {
                    continue;
                }
            }
            let mut found = track.clone();
            found.id = Some(id.clone());
            return Some(found);
        }
        None
    }
}

/// Empty and absent text metadata are interchangeable on the device.
fn text_matches(want: Option<&str>, have: Option<&str>) -> bool {
    match want {
        None | Some("") => matches!(have, None | Some("")),
        Some(want) => have == Some(want),
    }
}

/// Metadata query for [`Library::find_track`].
#[derive(Debug, Clone, Default)]
pub struct TrackQuery {
    pub device_id: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub artist: Option<String>,
    pub size: Option<u64>,
    pub total_time_ms: Option<u64>,
}

/// A playlist entry. The id is the library map key, never on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    #[serde(skip)]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audiobook: Option<bool>,

    /// The NFC token bound to this playlist; wire key is `star`.
    #[serde(rename = "star", default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A track entry. The id is the library map key, never on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(skip)]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,

    /// Duration in seconds, carried as text on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<FloatString>,

    /// On-device file path; wire key is `filename`.
    #[serde(rename = "filename", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(rename = "hasImage", default, skip_serializing_if = "Option::is_none")]
    pub has_image: Option<bool>,

    /// Byte size, carried as text on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<IntString>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// An NFC token entry. The id is the library map key, never on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Token {
    #[serde(skip)]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seen: Option<i64>,

    #[serde(rename = "starId", default, skip_serializing_if = "Option::is_none")]
    pub star_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library_with_tracks() -> Library {
        serde_json::from_str(
            r#"{
                "playlists": {
                    "p1": {"title": "Road Trip", "tracks": ["t1", "t2"]}
                },
                "tracks": {
                    "t1": {"title": "One", "artist": "A", "size": "1000", "duration": "60.0"},
                    "t2": {"title": "Two", "artist": "B", "size": "2000", "duration": "120.0"}
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_injects_id() {
        let library = library_with_tracks();

        let playlist = library.playlist("p1").unwrap();
        assert_eq!(playlist.id.as_deref(), Some("p1"));
        assert_eq!(playlist.title.as_deref(), Some("Road Trip"));

        let track = library.track("t2").unwrap();
        assert_eq!(track.id.as_deref(), Some("t2"));
        assert_eq!(track.size, Some(IntString(2000)));

        assert!(library.playlist("nope").is_none());
    }

    #[test]
    fn test_id_never_serialized() {
        let mut playlist = Playlist::default();
        playlist.id = Some("p1".to_string());
        playlist.title = Some("T".to_string());

        let json = serde_json::to_string(&playlist).unwrap();
        assert!(!json.contains("p1"));
        assert!(json.contains("title"));
    }

    #[test]
    fn test_find_track_by_device_id() {
        let library = library_with_tracks();
        let query = TrackQuery {
            device_id: Some("t1".to_string()),
            ..Default::default()
        };
        let track = library.find_track(&query).unwrap();
        assert_eq!(track.id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_find_track_by_metadata() {
        let library = library_with_tracks();
        let query = TrackQuery {
            title: Some("Two".to_string()),
            artist: Some("B".to_string()),
            size: Some(2000),
            total_time_ms: Some(120_500),
            ..Default::default()
        };
        let track = library.find_track(&query).unwrap();
        assert_eq!(track.id.as_deref(), Some("t2"));

        let miss = TrackQuery {
            title: Some("Two".to_string()),
            size: Some(9999),
            ..Default::default()
        };
        assert!(library.find_track(&miss).is_none());
    }

    #[test]
    fn test_library_merge_keeps_unmentioned_entries() {
        let mut library = library_with_tracks();
        let delta: Library = serde_json::from_str(
            r#"{"playlists": {"p2": {"title": "New"}}}"#,
        )
        .unwrap();
        library.merge_from(delta);

        assert!(library.playlist("p1").is_some());
        assert!(library.playlist("p2").is_some());
        assert_eq!(library.tracks.as_ref().unwrap().len(), 2);
    }
}
