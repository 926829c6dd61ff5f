//! Jooki device state: model, tolerant codecs, sparse merge, and cache.
//!
//! The device communicates state exclusively through sparse notifications:
//! each message carries only the fields that changed, and the client folds
//! them into a persistent snapshot. This crate owns that fold.
//!
//! # Architecture
//!
//! ```text
//! notification payload → decode (tolerant codecs) → SparseMerge → StateCache
//!                                                  ↘ delta (this message only)
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use jooki_state::StateCache;
//!
//! let cache = StateCache::new();
//! let (before, after, delta) =
//!     cache.merge(br#"{"audio": {"config": {"volume": 42}}}"#).unwrap();
//!
//! assert_eq!(before.volume(), None);
//! assert_eq!(after.volume(), Some(42));
//! assert_eq!(delta.volume(), Some(42));
//! ```

pub mod cache;
pub mod codec;
pub mod merge;
pub mod model;

mod error;

pub use cache::{StateCache, StateUpdate};
pub use codec::{FloatString, ImageRef, IntString, RepeatMode};
pub use error::{Result, StateError};
pub use merge::SparseMerge;
pub use model::{
    Audio, AudioConfig, Device, DeviceState, DiskUsage, Library, Mender, NowPlaying, Owner,
    Playback, PlaybackState, Playlist, Power, PowerLevel, QuietTime, Settings, Spotify, TimeOfDay,
    Token, Track, TrackQuery, Wifi,
};
