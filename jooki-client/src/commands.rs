//! Device commands and their completion predicates.
//!
//! Every command here is fire-and-forget on the wire; completion is observed
//! through state notifications. Each operation pairs its payload with the
//! predicate that recognizes the command's effect and the deadline the device
//! is given to show it.

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use jooki_state::{Audio, DeviceState, Playlist, PlaybackState, RepeatMode};

use crate::awaiter::ReadOutcome;
use crate::error::{ClientError, Result};
use crate::session::{Empty, Session};

/// Deadline for commands whose effect shows up in the next state broadcast.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
/// Seeks settle fast; a stale position report should fail quickly.
const SEEK_TIMEOUT: Duration = Duration::from_secs(2);
/// Playlist creation triggers a database rewrite on the device.
const CREATE_PLAYLIST_TIMEOUT: Duration = Duration::from_secs(10);
/// After an upload the device transcodes before the track appears.
pub(crate) const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Partial update for an existing playlist. Absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlaylistUpdate {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// NFC token binding; wire key is `star`.
    #[serde(rename = "star", skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Serialize)]
struct PlaylistUpdateEnvelope<'a> {
    playlist: &'a PlaylistUpdate,
}

#[derive(Serialize)]
struct PlaylistCreate<'a> {
    title: &'a str,
    audiobook: bool,
}

#[derive(Serialize)]
struct PlaylistAddTrack<'a> {
    #[serde(rename = "playlistId")]
    playlist_id: &'a str,
    #[serde(rename = "trackId")]
    track_id: &'a str,
}

#[derive(Serialize)]
struct PlaylistPlay<'a> {
    #[serde(rename = "playlistId")]
    playlist_id: &'a str,
    /// 1-based on the wire.
    #[serde(rename = "trackIndex")]
    track_index: usize,
}

#[derive(Serialize)]
pub(crate) struct PlaylistAddUpload<'a> {
    #[serde(rename = "playlistId")]
    pub(crate) playlist_id: &'a str,
    #[serde(rename = "uploadId")]
    pub(crate) upload_id: u32,
    pub(crate) filename: &'a str,
}

#[derive(Serialize)]
struct PlaylistDelete<'a> {
    #[serde(rename = "playlistId")]
    playlist_id: &'a str,
}

#[derive(Serialize)]
struct SetVol {
    vol: u8,
}

#[derive(Serialize)]
struct SetShuffle {
    shuffle_mode: bool,
}

#[derive(Serialize)]
struct SetRepeat {
    repeat_mode: u8,
}

#[derive(Serialize)]
struct SetSeek {
    position_ms: u64,
}

fn audio_of(state: DeviceState) -> Audio {
    state.audio.unwrap_or_default()
}

/// Recognizes a track change relative to the snapshot taken before a skip.
/// The device reports no explicit "skipped" event; any different (or newly
/// appeared) track counts.
fn track_changed_since(before: &DeviceState) -> impl Fn(&DeviceState) -> bool {
    let before_had_now_playing = before
        .audio
        .as_ref()
        .map_or(false, |audio| audio.now_playing.is_some());
    let before_track = before.now_playing_track_id().map(String::from);
    move |state: &DeviceState| {
        let Some(now_playing) = state.audio.as_ref().and_then(|audio| audio.now_playing.as_ref())
        else {
            return false;
        };
        if !before_had_now_playing {
            return true;
        }
        match (&before_track, &now_playing.track_id) {
            (None, current) => current.is_some(),
            (Some(_), None) => true,
            (Some(previous), Some(current)) => previous != current,
        }
    }
}

impl Session {
    /// Resume playback of whatever is loaded.
    pub async fn play(&self) -> Result<Audio> {
        let state = self
            .publish_and_wait_for(
                "DO_PLAY",
                &Empty {},
                |state| {
                    state
                        .audio
                        .as_ref()
                        .map_or(false, |audio| audio.now_playing.is_some())
                        && state.playback_state() == Some(&PlaybackState::Playing)
                },
                COMMAND_TIMEOUT,
            )
            .await?;
        Ok(audio_of(state))
    }

    /// Pause playback. Also satisfied by the track ending on its own.
    pub async fn pause(&self) -> Result<Audio> {
        let state = self
            .publish_and_wait_for(
                "DO_PAUSE",
                &Empty {},
                |state| {
                    matches!(
                        state.playback_state(),
                        Some(PlaybackState::Paused | PlaybackState::Ended)
                    )
                },
                COMMAND_TIMEOUT,
            )
            .await?;
        Ok(audio_of(state))
    }

    /// Set the output volume (0-100 on the device).
    pub async fn set_volume(&self, volume: u8) -> Result<Audio> {
        let state = self
            .publish_and_wait_for(
                "SET_VOL",
                &SetVol { vol: volume },
                |state| state.volume() == Some(volume),
                COMMAND_TIMEOUT,
            )
            .await?;
        Ok(audio_of(state))
    }

    /// Turn shuffle on or off.
    pub async fn set_shuffle_mode(&self, on: bool) -> Result<Audio> {
        let state = self
            .publish_and_wait_for(
                "SET_CFG",
                &SetShuffle { shuffle_mode: on },
                |state| {
                    state
                        .audio
                        .as_ref()
                        .and_then(|audio| audio.config.as_ref())
                        .and_then(|config| config.shuffle_mode)
                        == Some(on)
                },
                COMMAND_TIMEOUT,
            )
            .await?;
        Ok(audio_of(state))
    }

    /// Set the repeat mode.
    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<Audio> {
        let state = self
            .publish_and_wait_for(
                "SET_CFG",
                &SetRepeat {
                    repeat_mode: mode.into(),
                },
                |state| {
                    state
                        .audio
                        .as_ref()
                        .and_then(|audio| audio.config.as_ref())
                        .and_then(|config| config.repeat_mode)
                        == Some(mode)
                },
                COMMAND_TIMEOUT,
            )
            .await?;
        Ok(audio_of(state))
    }

    /// Set shuffle and repeat together. The device takes them as separate
    /// config writes, so this issues two commands back to back.
    pub async fn set_play_mode(&self, shuffle: bool, repeat: bool) -> Result<Audio> {
        self.set_shuffle_mode(shuffle).await?;
        let mode = if repeat { RepeatMode::Once } else { RepeatMode::Off };
        self.set_repeat_mode(mode).await
    }

    /// Seek within the current track. The device reports positions on its
    /// own cadence, so anything within a second of the target counts.
    pub async fn seek(&self, position_ms: u64) -> Result<Audio> {
        let state = self
            .publish_and_wait_for(
                "SEEK",
                &SetSeek { position_ms },
                |state| {
                    state
                        .position_ms()
                        .map_or(false, |position| position.abs_diff(position_ms) <= 1000)
                },
                SEEK_TIMEOUT,
            )
            .await?;
        Ok(audio_of(state))
    }

    /// Skip to the next track in the loaded playlist.
    pub async fn skip_next(&self) -> Result<Audio> {
        let before = self.state();
        let state = self
            .publish_and_wait_for(
                "DO_NEXT",
                &Empty {},
                track_changed_since(&before),
                COMMAND_TIMEOUT,
            )
            .await?;
        Ok(audio_of(state))
    }

    /// Skip to the previous track in the loaded playlist.
    pub async fn skip_prev(&self) -> Result<Audio> {
        let before = self.state();
        let state = self
            .publish_and_wait_for(
                "DO_PREV",
                &Empty {},
                track_changed_since(&before),
                COMMAND_TIMEOUT,
            )
            .await?;
        Ok(audio_of(state))
    }

    /// Start playing a playlist at a 0-based track index.
    pub async fn play_playlist(&self, playlist_id: &str, track_index: usize) -> Result<Audio> {
        let msg = PlaylistPlay {
            playlist_id,
            track_index: track_index + 1,
        };
        let state = self
            .publish_and_wait_for(
                "PLAYLIST_PLAY",
                &msg,
                |state| {
                    state.playback_state() == Some(&PlaybackState::Playing)
                        && state.now_playing_playlist_id() == Some(playlist_id)
                },
                COMMAND_TIMEOUT,
            )
            .await?;
        Ok(audio_of(state))
    }

    /// Create an empty playlist and return it once it appears in the library.
    ///
    /// The device assigns the id, so the new playlist is recognized as a key
    /// that was not in the library before the command and carries the
    /// requested title.
    pub async fn create_playlist(&self, title: &str) -> Result<Playlist> {
        let previous: HashSet<String> = self
            .state()
            .playlists()
            .map(|playlists| playlists.keys().cloned().collect())
            .unwrap_or_default();

        let msg = PlaylistCreate {
            title,
            audiobook: false,
        };
        let mut awaiter = self.publish_with_awaiter("PLAYLIST_NEW", &msg).await?;
        let deadline = Instant::now() + CREATE_PLAYLIST_TIMEOUT;
        let result = loop {
            match awaiter.read_until(deadline).await {
                ReadOutcome::Received => {}
                ReadOutcome::TimedOut => {
                    break Err(ClientError::NotFound {
                        what: "newly created playlist",
                    });
                }
                ReadOutcome::Closed => {
                    break Err(ClientError::SessionClosed {
                        last: Box::new(awaiter.state().clone()),
                    });
                }
            }
            let Some(playlists) = awaiter.state().playlists() else {
                continue;
            };
            let created = playlists.iter().find(|(id, playlist)| {
                !previous.contains(id.as_str()) && playlist.title.as_deref() == Some(title)
            });
            if let Some((id, playlist)) = created {
                let mut playlist = playlist.clone();
                playlist.id = Some(id.clone());
                break Ok(playlist);
            }
        };
        awaiter.close();
        result
    }

    /// Apply a partial update to a playlist and return the updated entry.
    pub async fn update_playlist(&self, update: &PlaylistUpdate) -> Result<Playlist> {
        let predicate = |state: &DeviceState| {
            let Some(playlist) = state
                .playlists()
                .and_then(|playlists| playlists.get(&update.id))
            else {
                return false;
            };
            if let Some(title) = &update.title {
                if playlist.title.as_ref() != Some(title) {
                    return false;
                }
            }
            if let Some(token) = &update.token {
                if playlist.token.as_ref() != Some(token) {
                    return false;
                }
            }
            if let Some(tracks) = &update.tracks {
                if playlist.tracks.as_deref() != Some(tracks.as_slice()) {
                    return false;
                }
            }
            true
        };
        let state = self
            .publish_and_wait_for(
                "PLAYLIST_UPDATE",
                &PlaylistUpdateEnvelope { playlist: update },
                predicate,
                COMMAND_TIMEOUT,
            )
            .await?;
        state
            .library
            .as_ref()
            .and_then(|library| library.playlist(&update.id))
            .ok_or(ClientError::NotFound {
                what: "updated playlist",
            })
    }

    /// Rename a playlist.
    pub async fn rename_playlist(&self, playlist_id: &str, title: &str) -> Result<Playlist> {
        self.update_playlist(&PlaylistUpdate {
            id: playlist_id.to_string(),
            title: Some(title.to_string()),
            ..Default::default()
        })
        .await
    }

    /// Replace a playlist's track list.
    pub async fn update_playlist_tracks(
        &self,
        playlist_id: &str,
        track_ids: Vec<String>,
    ) -> Result<Playlist> {
        self.update_playlist(&PlaylistUpdate {
            id: playlist_id.to_string(),
            tracks: Some(track_ids),
            ..Default::default()
        })
        .await
    }

    /// Bind an NFC token to a playlist.
    pub async fn update_playlist_token(&self, playlist_id: &str, token: &str) -> Result<Playlist> {
        self.update_playlist(&PlaylistUpdate {
            id: playlist_id.to_string(),
            token: Some(token.to_string()),
            ..Default::default()
        })
        .await
    }

    /// Append an already-uploaded track to a playlist.
    pub async fn add_track_to_playlist(
        &self,
        playlist_id: &str,
        track_id: &str,
    ) -> Result<Playlist> {
        let msg = PlaylistAddTrack {
            playlist_id,
            track_id,
        };
        let state = self
            .publish_and_wait_for(
                "PLAYLIST_ADD_TRACK",
                &msg,
                |state| {
                    state
                        .playlists()
                        .and_then(|playlists| playlists.get(playlist_id))
                        .and_then(|playlist| playlist.tracks.as_ref())
                        .and_then(|tracks| tracks.last())
                        .map_or(false, |last| last == track_id)
                },
                COMMAND_TIMEOUT,
            )
            .await?;
        state
            .library
            .as_ref()
            .and_then(|library| library.playlist(playlist_id))
            .ok_or(ClientError::NotFound {
                what: "updated playlist",
            })
    }

    /// Delete a playlist.
    ///
    /// The firmware acknowledges deletion by re-broadcasting the library
    /// while the entry is still present, then drops it from the next full
    /// snapshot; the re-broadcast is what this waits for.
    pub async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        let msg = PlaylistDelete { playlist_id };
        self.publish_and_wait_for(
            "PLAYLIST_DELETE",
            &msg,
            |state| {
                state
                    .playlists()
                    .map_or(false, |playlists| playlists.contains_key(playlist_id))
            },
            COMMAND_TIMEOUT,
        )
        .await?;
        Ok(())
    }
}
