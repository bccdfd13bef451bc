use log::{debug, info};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use url::Url;

use crate::api::{Channel, StreamCatalog, Track};
use crate::error::{AudioSessionError, ErrorReporter, PlayerError};
use crate::observer::{ItemEvent, MetadataObserver, Outcome};
use crate::session::{PlaybackSession, SessionBackend, SessionTriple};

/// Observer of playback transitions. The player keeps only a weak handle
/// and never extends the delegate's lifetime.
pub trait PlayerDelegate {
    fn playback_started(&self, channel: &Channel);
    fn playback_paused(&self);
    fn playback_stopped(&self);
    /// Receives `None` for every change; read `Player::current_track` for the value.
    fn track_changed(&self, new_track: Option<&Track>);
}

/// Prepares the platform audio output before playback starts.
pub trait AudioSession {
    fn set_playback_category(&self) -> Result<(), AudioSessionError>;
}

impl<T: AudioSession + ?Sized> AudioSession for Rc<T> {
    fn set_playback_category(&self) -> Result<(), AudioSessionError> {
        (**self).set_playback_category()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Stopped,
    Playing,
}

/// Binds the selected channel to a playback session.
///
/// All methods must be called from one thread. Item events produced in the
/// background are queued and applied by [`Player::pump_events`].
pub struct Player {
    listen_key: Option<String>,
    stream_set: Option<Arc<dyn StreamCatalog>>,
    current_channel: Option<Channel>,
    current_track: Option<Track>,
    delegate: Option<Weak<dyn PlayerDelegate>>,
    session: PlaybackSession,
    observer: MetadataObserver,
    events: UnboundedReceiver<ItemEvent>,
    backend: Box<dyn SessionBackend>,
    audio_session: Box<dyn AudioSession>,
    reporter: Box<dyn ErrorReporter>,
}

impl Player {
    pub fn new(
        backend: Box<dyn SessionBackend>,
        audio_session: Box<dyn AudioSession>,
        reporter: Box<dyn ErrorReporter>,
    ) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        Self {
            listen_key: None,
            stream_set: None,
            current_channel: None,
            current_track: None,
            delegate: None,
            session: PlaybackSession::new(),
            observer: MetadataObserver::new(tx),
            events,
            backend,
            audio_session,
            reporter,
        }
    }

    pub fn set_delegate(&mut self, delegate: &Rc<dyn PlayerDelegate>) {
        self.delegate = Some(Rc::downgrade(delegate));
    }

    pub fn listen_key(&self) -> Option<&str> {
        self.listen_key.as_deref()
    }

    pub fn set_listen_key(&mut self, listen_key: Option<String>) {
        self.listen_key = listen_key;
        self.reload_if_stale();
    }

    pub fn set_stream_set(&mut self, stream_set: Option<Arc<dyn StreamCatalog>>) {
        self.stream_set = stream_set;
        self.reload_if_stale();
    }

    pub fn current_channel(&self) -> Option<&Channel> {
        self.current_channel.as_ref()
    }

    /// Select a channel (or none) and rebuild the session. Re-selecting the
    /// current channel rebuilds as well.
    pub fn set_current_channel(&mut self, channel: Option<Channel>) {
        self.current_channel = channel;
        self.set_current_track(None);
        self.reload_stream();
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    pub fn current_url(&self) -> Option<&Url> {
        self.session.url()
    }

    pub fn state(&self) -> PlayerState {
        if self.is_playing() {
            PlayerState::Playing
        } else if self.session.is_active() {
            PlayerState::Stopped
        } else {
            PlayerState::Idle
        }
    }

    /// Number of session rebuilds performed so far.
    pub fn rebuild_count(&self) -> u64 {
        self.session.rebuilds()
    }

    /// Number of observer registrations made on playback items.
    pub fn subscription_count(&self) -> u64 {
        self.observer.subscriptions()
    }

    /// Start the streamer. Announces the channel whenever one is selected,
    /// whether or not a stream actually started.
    pub fn play(&mut self) {
        if let Err(e) = self.audio_session.set_playback_category() {
            self.reporter.report(&PlayerError::from(e));
        }

        if let Some(streamer) = self.session.streamer_mut() {
            streamer.start();
        }

        if let Some(channel) = self.current_channel.clone() {
            info!("Playing channel {}", channel.name);
            self.notify(|d| d.playback_started(&channel));
        }
    }

    pub fn pause(&mut self) {
        if let Some(streamer) = self.session.streamer_mut() {
            if streamer.is_playing() {
                streamer.stop();
                debug!("Playback paused");
                self.notify(|d| d.playback_paused());
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_playing()
    }

    /// Apply one item event on the owner thread.
    pub fn handle_item_event(&mut self, event: ItemEvent) {
        match self.observer.interpret(event, self.session.item_mut()) {
            Outcome::Stale | Outcome::TracksSilenced(_) => {}
            Outcome::Track(track) => self.set_current_track(track),
        }
    }

    /// Apply every queued item event. Returns how many were drained.
    pub fn pump_events(&mut self) -> usize {
        let mut drained = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_item_event(event);
            drained += 1;
        }
        drained
    }

    fn set_current_track(&mut self, track: Option<Track>) {
        if let Some(track) = &track {
            info!("Now playing: {}", track);
        }
        self.current_track = track;
        // Listeners have always been handed `None` here
        self.notify(|d| d.track_changed(None));
    }

    fn notify(&self, f: impl FnOnce(&dyn PlayerDelegate)) {
        if let Some(delegate) = self.delegate.as_ref().and_then(Weak::upgrade) {
            f(delegate.as_ref());
        }
    }

    fn resolve_stream_url(&self, channel: &Channel) -> Result<Url, PlayerError> {
        let catalog = self.stream_set.as_ref().ok_or(PlayerError::NoStreamSet)?;
        let stream = catalog
            .lookup(&channel.id)
            .first()
            .ok_or_else(|| PlayerError::NoStream {
                channel: channel.name.clone(),
            })?;

        let mut url = Url::parse(&stream.url).map_err(|source| PlayerError::InvalidStreamUrl {
            url: stream.url.clone(),
            source,
        })?;
        if let Some(listen_key) = &self.listen_key {
            // Replaces any query the catalog published
            url.set_query(Some(listen_key));
        }
        Ok(url)
    }

    fn reload_stream(&mut self) {
        let next = match self.current_channel.clone() {
            Some(channel) => match self.resolve_stream_url(&channel) {
                Ok(url) => Some(SessionTriple::open(self.backend.as_ref(), url)),
                Err(e) => {
                    self.reporter.report(&e);
                    None
                }
            },
            None => {
                debug!("No channel selected");
                self.notify(|d| d.playback_stopped());
                None
            }
        };
        let resume = next.is_some();

        let was_playing = self.is_playing();
        self.pause();

        self.session.rebuild(next, &mut self.observer);

        if was_playing && resume {
            self.play();
        }
    }

    fn reload_if_stale(&mut self) {
        let Some(channel) = self.current_channel.clone() else {
            return;
        };
        let resolved = self.resolve_stream_url(&channel).ok();
        if resolved.as_ref() != self.session.url() {
            debug!("Stream for {} changed, rebuilding session", channel.name);
            self.reload_stream();
        }
    }
}
