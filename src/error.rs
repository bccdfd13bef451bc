//! Failures the player degrades on instead of returning to the caller.
use log::error;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AudioSessionError {
    #[error("audio output unavailable: {0}")]
    OutputUnavailable(String),
}

#[derive(Debug, Clone, Error)]
pub enum PlayerError {
    #[error("no stream set initialized on player")]
    NoStreamSet,
    #[error("no stream found for channel {channel}")]
    NoStream { channel: String },
    #[error("could not parse stream URL {url}: {source}")]
    InvalidStreamUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("error setting audio category: {0}")]
    AudioSession(#[from] AudioSessionError),
}

impl PlayerError {
    /// Lookup failures that leave the session without a stream.
    pub fn is_catalog_miss(&self) -> bool {
        matches!(self, PlayerError::NoStreamSet | PlayerError::NoStream { .. })
    }
}

/// Sink for errors the player swallows.
pub trait ErrorReporter {
    fn report(&self, error: &PlayerError);
}

/// Writes reported errors to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, err: &PlayerError) {
        error!("{}", err);
    }
}
