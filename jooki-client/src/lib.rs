//! Client engine for commanding Jooki audio devices.
//!
//! The device offers no request/response channel. Commands go out as
//! fire-and-forget publishes, and the only feedback is the stream of sparse
//! state notifications every connected client receives. This crate closes
//! that loop: each command registers an [`Awaiter`] before publishing, then
//! blocks until the state shows the command's effect or a deadline passes.
//!
//! # Architecture
//!
//! ```text
//! transport mailbox → dispatch task → StateCache merge
//!                                   → AwaiterRegistry broadcast → Awaiters
//! commands: register awaiter → publish → wait_for(predicate, timeout)
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use jooki_client::{ChannelTransport, Session};
//! use jooki_discovery::DeviceDescriptor;
//!
//! # async fn run() -> jooki_client::Result<()> {
//! let descriptor = DeviceDescriptor {
//!     hostname: "jooki-1a2b".to_string(),
//!     id: "dev-1".to_string(),
//!     address: "192.168.1.50".to_string(),
//! };
//! let (transport, _handle) = ChannelTransport::new();
//! let session = Session::connect(Arc::new(transport), descriptor, "2.5.1").await?;
//!
//! session.set_volume(30).await?;
//! let audio = session.play().await?;
//! println!("playing: {:?}", audio.now_playing);
//! # Ok(())
//! # }
//! ```

pub mod awaiter;
pub mod commands;
pub mod registry;
pub mod transport;
pub mod upload;

mod dispatcher;
mod error;
mod session;

pub use awaiter::{Awaiter, ReadOutcome};
pub use commands::PlaylistUpdate;
pub use error::{ClientError, Result};
pub use registry::{AwaiterRegistry, AWAITER_QUEUE_CAPACITY};
pub use session::Session;
pub use transport::{
    topics, ChannelTransport, PublishedMessage, Transport, TransportEvent, TransportHandle,
};
pub use upload::{TrackUpload, UploadProgress};

// Re-exported so callers don't need a direct jooki-state dependency for the
// common types.
pub use jooki_state::{Audio, DeviceState, PlaybackState, Playlist, RepeatMode, StateUpdate, Track};
