use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

use crate::observer::{EventSender, ItemKey, MetadataObserver, OBSERVED_KEYS};

/// Identifies one playback item for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(u64);

impl ItemId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ItemId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Audio,
    Video,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub id: u32,
    pub media_type: MediaType,
    pub enabled: bool,
}

/// Engine-level player. Started once when its session is installed.
pub trait Engine {
    fn play(&mut self);
}

/// The media item an engine plays; source of metadata and track-list events.
pub trait PlaybackItem {
    fn id(&self) -> ItemId;
    fn add_observer(&mut self, key: ItemKey, events: EventSender);
    /// Must tolerate keys that were never observed.
    fn remove_observer(&mut self, key: ItemKey);
    fn tracks(&self) -> Vec<MediaTrack>;
    fn set_track_enabled(&mut self, track_id: u32, enabled: bool);
}

/// Application-level audio streamer driven by `Player::play`/`Player::pause`.
pub trait Streamer {
    fn start(&mut self);
    fn stop(&mut self);
    fn is_playing(&self) -> bool;
}

/// Builds the resources of a session for a resolved stream URL.
pub trait SessionBackend {
    fn open_player(&self, url: &Url) -> (Box<dyn Engine>, Box<dyn PlaybackItem>);
    fn open_streamer(&self, url: &Url) -> Box<dyn Streamer>;
}

pub struct SessionTriple {
    pub url: Url,
    pub engine: Box<dyn Engine>,
    pub item: Box<dyn PlaybackItem>,
    pub streamer: Box<dyn Streamer>,
}

impl SessionTriple {
    pub fn open(backend: &dyn SessionBackend, url: Url) -> Self {
        let (engine, item) = backend.open_player(&url);
        let streamer = backend.open_streamer(&url);
        Self {
            url,
            engine,
            item,
            streamer,
        }
    }
}

/// Holds at most one engine/item/streamer triple.
#[derive(Default)]
pub struct PlaybackSession {
    active: Option<SessionTriple>,
    rebuilds: u64,
}

impl PlaybackSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn url(&self) -> Option<&Url> {
        self.active.as_ref().map(|t| &t.url)
    }

    pub fn item_id(&self) -> Option<ItemId> {
        self.active.as_ref().map(|t| t.item.id())
    }

    pub fn item_mut(&mut self) -> Option<&mut (dyn PlaybackItem + 'static)> {
        self.active.as_mut().map(|t| t.item.as_mut())
    }

    pub fn streamer_mut(&mut self) -> Option<&mut (dyn Streamer + 'static)> {
        self.active.as_mut().map(|t| t.streamer.as_mut())
    }

    pub fn is_playing(&self) -> bool {
        self.active
            .as_ref()
            .map(|t| t.streamer.is_playing())
            .unwrap_or(false)
    }

    /// Number of times the triple has been replaced.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Move observers onto `next`, install it in place of the current
    /// triple and start its engine. The caller pauses the old streamer first.
    pub fn rebuild(&mut self, next: Option<SessionTriple>, observer: &mut MetadataObserver) {
        let mut next = next;
        observer.rebind(
            self.active.as_mut().map(|t| t.item.as_mut()),
            next.as_mut().map(|t| t.item.as_mut()),
        );

        let previous = std::mem::replace(&mut self.active, next);
        self.rebuilds += 1;
        if let Some(old) = previous {
            debug!("Released session for {}", old.url);
        }

        if let Some(active) = self.active.as_mut() {
            debug!("Installed session for {}", active.url);
            active.engine.play();
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.as_mut() {
            for key in OBSERVED_KEYS {
                active.item.remove_observer(key);
            }
            active.streamer.stop();
        }
    }
}
