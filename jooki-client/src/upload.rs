//! Track upload over HTTP, correlated back through the library.
//!
//! The upload itself is a plain multipart POST to the device's embedded web
//! server; the pub/sub side only learns about it afterwards, when a
//! `PLAYLIST_ADD_UPLOAD` command makes the device ingest the file and
//! broadcast the grown library. The new track is keyed by the first half of
//! the file's md5 when the device kept the original bytes, or by a fresh key
//! with a matching byte size when it transcoded.

use std::collections::HashSet;
use std::path::Path;

use bytes::Bytes;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::Instant;

use jooki_state::Track;

use crate::awaiter::ReadOutcome;
use crate::commands::{PlaylistAddUpload, UPLOAD_TIMEOUT};
use crate::error::{ClientError, Result};
use crate::session::Session;

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// A track source to upload. The caller supplies the md5 because it is the
/// correlation key on the device, and only the caller knows whether it has
/// the bytes on disk or is producing them on the fly.
pub trait TrackUpload: Send + Sync {
    /// MIME type of the audio data.
    fn content_type(&self) -> String;
    /// Source file name; only the base name is sent to the device.
    fn file_name(&self) -> String;
    /// Lowercase hex md5 of the full content.
    fn md5(&self) -> String;
    /// The full content.
    fn bytes(&self) -> std::io::Result<Vec<u8>>;
}

/// Progress report for an in-flight upload.
#[derive(Debug, Clone)]
pub struct UploadProgress {
    pub file_name: String,
    pub upload_id: u32,
    /// Fraction of bytes handed to the HTTP request, 0.0 to 1.0.
    pub fraction: f64,
    /// Set on the final report, once the device has ingested the track.
    pub track: Option<Track>,
}

#[derive(Clone)]
struct ProgressReporter {
    tx: mpsc::Sender<UploadProgress>,
    file_name: String,
    upload_id: u32,
}

impl ProgressReporter {
    /// Best-effort: a slow listener loses intermediate reports, never blocks
    /// the upload.
    fn report(&self, fraction: f64, track: Option<Track>) {
        let _ = self.tx.try_send(UploadProgress {
            file_name: self.file_name.clone(),
            upload_id: self.upload_id,
            fraction,
            track,
        });
    }
}

fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Chunk the content into a body stream that reports progress as the HTTP
/// client consumes it.
fn progress_stream(
    data: Vec<u8>,
    reporter: ProgressReporter,
) -> impl futures::Stream<Item = std::io::Result<Bytes>> {
    let total = data.len().max(1) as f64;
    let chunks: Vec<Bytes> = data
        .chunks(UPLOAD_CHUNK_SIZE)
        .map(Bytes::copy_from_slice)
        .collect();
    let mut consumed = 0usize;
    futures::stream::iter(chunks.into_iter().map(move |chunk| {
        consumed += chunk.len();
        reporter.report(consumed as f64 / total, None);
        Ok(chunk)
    }))
}

impl Session {
    /// Upload a track and append it to a playlist.
    ///
    /// Progress lands on `progress` as the bytes go out; the final report
    /// carries the ingested [`Track`]. Returns once the track appears in the
    /// device library, which includes transcoding time.
    pub async fn upload_to_playlist(
        &self,
        playlist_id: &str,
        upload: &dyn TrackUpload,
        progress: mpsc::Sender<UploadProgress>,
    ) -> Result<Track> {
        let upload_id: u32 = rand::thread_rng().gen_range(0..10_000_000);
        let file_name = base_name(&upload.file_name());
        let reporter = ProgressReporter {
            tx: progress,
            file_name: file_name.clone(),
            upload_id,
        };
        reporter.report(0.0, None);

        let md5_key: String = upload.md5().chars().take(16).collect();
        let data = upload.bytes()?;
        let size = data.len() as u64;

        // Snapshot the known track keys before the device can ingest, so a
        // transcoded track is recognizable as a new key.
        let previous: HashSet<String> = self
            .state()
            .tracks()
            .map(|tracks| tracks.keys().cloned().collect())
            .unwrap_or_default();

        let body = reqwest::Body::wrap_stream(progress_stream(data, reporter.clone()));
        let part = reqwest::multipart::Part::stream_with_length(body, size)
            .file_name(file_name.clone())
            .mime_str(&upload.content_type())?;
        // The device identifies the upload by the form field name.
        let form = reqwest::multipart::Form::new().part(upload_id.to_string(), part);

        let url = format!("http://{}/upload", self.descriptor().hostname);
        tracing::debug!(%url, upload_id, size, "uploading track");
        let response = self.http().post(&url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Upload(format!(
                "HTTP {}",
                response.status().as_u16()
            )));
        }
        tracing::debug!(upload_id, "upload accepted, waiting for ingest");

        let msg = PlaylistAddUpload {
            playlist_id,
            upload_id,
            filename: &file_name,
        };
        let mut awaiter = self.publish_with_awaiter("PLAYLIST_ADD_UPLOAD", &msg).await?;
        let deadline = Instant::now() + UPLOAD_TIMEOUT;
        let result = loop {
            match awaiter.read_until(deadline).await {
                ReadOutcome::Received => {}
                ReadOutcome::TimedOut => {
                    break Err(ClientError::NotFound {
                        what: "newly uploaded track",
                    });
                }
                ReadOutcome::Closed => {
                    break Err(ClientError::SessionClosed {
                        last: Box::new(awaiter.state().clone()),
                    });
                }
            }
            let Some(tracks) = awaiter.state().tracks() else {
                continue;
            };
            // Untranscoded uploads keep the original bytes and are keyed by
            // the md5 prefix.
            if let Some(track) = tracks.get(&md5_key) {
                let mut track = track.clone();
                track.id = Some(md5_key.clone());
                break Ok(track);
            }
            // Otherwise the key is fresh; match a new entry by byte size.
            let ingested = tracks.iter().find(|(id, track)| {
                !previous.contains(id.as_str())
                    && track.size.map_or(false, |reported| reported.0 == size as i64)
            });
            if let Some((id, track)) = ingested {
                let mut track = track.clone();
                track.id = Some(id.clone());
                break Ok(track);
            }
        };
        awaiter.close();

        match result {
            Ok(track) => {
                tracing::info!(upload_id, track = ?track.id, "track ingested");
                reporter.report(1.0, Some(track.clone()));
                Ok(track)
            }
            Err(err) => {
                tracing::warn!(upload_id, %err, "upload never surfaced in the library");
                Err(err)
            }
        }
    }
}
