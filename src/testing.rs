//! In-memory collaborators for exercising the player without audio or network.
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use url::Url;

use crate::api::{Channel, MetadataItem, Track};
use crate::error::{AudioSessionError, ErrorReporter, PlayerError};
use crate::observer::{EventSender, ItemChange, ItemEvent, ItemKey};
use crate::player::{AudioSession, PlayerDelegate};
use crate::session::{
    Engine, ItemId, MediaTrack, MediaType, PlaybackItem, SessionBackend, Streamer,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Started(String),
    Paused,
    Stopped,
    TrackChanged(Option<Track>),
}

#[derive(Default)]
pub struct Recorder {
    calls: RefCell<Vec<Call>>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl PlayerDelegate for Recorder {
    fn playback_started(&self, channel: &Channel) {
        self.calls.borrow_mut().push(Call::Started(channel.id.clone()));
    }

    fn playback_paused(&self) {
        self.calls.borrow_mut().push(Call::Paused);
    }

    fn playback_stopped(&self) {
        self.calls.borrow_mut().push(Call::Stopped);
    }

    fn track_changed(&self, new_track: Option<&Track>) {
        self.calls.borrow_mut().push(Call::TrackChanged(new_track.cloned()));
    }
}

#[derive(Default, Clone)]
pub struct RecordingReporter {
    errors: Rc<RefCell<Vec<PlayerError>>>,
}

impl RecordingReporter {
    pub fn take(&self) -> Vec<PlayerError> {
        self.errors.borrow_mut().drain(..).collect()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, error: &PlayerError) {
        self.errors.borrow_mut().push(error.clone());
    }
}

#[derive(Default, Clone)]
pub struct FakeAudioSession {
    calls: Rc<Cell<usize>>,
    failing: Rc<Cell<bool>>,
}

impl FakeAudioSession {
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.set(failing);
    }
}

impl AudioSession for FakeAudioSession {
    fn set_playback_category(&self) -> Result<(), AudioSessionError> {
        self.calls.set(self.calls.get() + 1);
        if self.failing.get() {
            return Err(AudioSessionError::OutputUnavailable("no device".to_string()));
        }
        Ok(())
    }
}

struct ItemState {
    observers: HashMap<ItemKey, EventSender>,
    tracks: Vec<MediaTrack>,
}

/// Playback item whose state stays inspectable after the player drops it.
#[derive(Clone)]
pub struct FakeItem {
    id: ItemId,
    state: Rc<RefCell<ItemState>>,
}

impl FakeItem {
    fn new() -> Self {
        let tracks = vec![
            MediaTrack {
                id: 1,
                media_type: MediaType::Audio,
                enabled: true,
            },
            MediaTrack {
                id: 2,
                media_type: MediaType::Text,
                enabled: true,
            },
        ];
        Self {
            id: ItemId::next(),
            state: Rc::new(RefCell::new(ItemState {
                observers: HashMap::new(),
                tracks,
            })),
        }
    }

    pub fn observed(&self) -> Vec<ItemKey> {
        self.state.borrow().observers.keys().copied().collect()
    }

    pub fn tracks_snapshot(&self) -> Vec<MediaTrack> {
        self.state.borrow().tracks.clone()
    }

    /// Deliver a title the way a background engine would. False when unobserved.
    pub fn emit_metadata(&self, stream_title: &str) -> bool {
        let state = self.state.borrow();
        match state.observers.get(&ItemKey::TimedMetadata) {
            Some(tx) => tx
                .send(ItemEvent {
                    item: self.id,
                    change: ItemChange::TimedMetadata(vec![MetadataItem::new(
                        "StreamTitle",
                        stream_title,
                    )]),
                })
                .is_ok(),
            None => false,
        }
    }
}

impl PlaybackItem for FakeItem {
    fn id(&self) -> ItemId {
        self.id
    }

    fn add_observer(&mut self, key: ItemKey, events: EventSender) {
        self.state.borrow_mut().observers.insert(key, events);
    }

    fn remove_observer(&mut self, key: ItemKey) {
        self.state.borrow_mut().observers.remove(&key);
    }

    fn tracks(&self) -> Vec<MediaTrack> {
        self.state.borrow().tracks.clone()
    }

    fn set_track_enabled(&mut self, track_id: u32, enabled: bool) {
        if let Some(track) = self.state.borrow_mut().tracks.iter_mut().find(|t| t.id == track_id) {
            track.enabled = enabled;
        }
    }
}

struct FakeEngine {
    plays: Rc<Cell<usize>>,
}

impl Engine for FakeEngine {
    fn play(&mut self) {
        self.plays.set(self.plays.get() + 1);
    }
}

#[derive(Default)]
struct FakeStreamer {
    playing: bool,
}

impl Streamer for FakeStreamer {
    fn start(&mut self) {
        self.playing = true;
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

#[derive(Default, Clone)]
pub struct FakeBackend {
    items: Rc<RefCell<Vec<FakeItem>>>,
    engine_plays: Rc<Cell<usize>>,
}

impl FakeBackend {
    pub fn items(&self) -> Vec<FakeItem> {
        self.items.borrow().clone()
    }

    pub fn engine_plays(&self) -> usize {
        self.engine_plays.get()
    }
}

impl SessionBackend for FakeBackend {
    fn open_player(&self, _url: &Url) -> (Box<dyn Engine>, Box<dyn PlaybackItem>) {
        let item = FakeItem::new();
        self.items.borrow_mut().push(item.clone());
        let engine = FakeEngine {
            plays: self.engine_plays.clone(),
        };
        (Box::new(engine), Box::new(item))
    }

    fn open_streamer(&self, _url: &Url) -> Box<dyn Streamer> {
        Box::new(FakeStreamer::default())
    }
}
