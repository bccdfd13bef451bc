//! Channel selection and playback session control for DI.fm radio streams.
//!
//! [`Player`] binds the selected [`Channel`] to a [`PlaybackSession`]:
//! it resolves the channel's stream, rebuilds the session on every
//! selection, keeps the now-playing [`Track`] and notifies a
//! [`PlayerDelegate`] of transitions.

pub mod api;
pub mod audio;
pub mod backend;
pub mod error;
pub mod icy;
pub mod observer;
pub mod player;
pub mod session;
pub mod utils;

#[cfg(test)]
mod testing;

pub use api::{Channel, Stream, StreamCatalog, StreamSet, Track};
pub use backend::DefaultBackend;
pub use error::{ErrorReporter, LogReporter, PlayerError};
pub use player::{AudioSession, Player, PlayerDelegate, PlayerState};
pub use session::PlaybackSession;
