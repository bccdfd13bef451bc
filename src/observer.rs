//! Translates playback item events into now-playing state.
use log::{debug, warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::api::{MetadataItem, Track};
use crate::session::{ItemId, MediaType, PlaybackItem};

/// Properties of a playback item that can be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKey {
    TimedMetadata,
    Tracks,
}

pub const OBSERVED_KEYS: [ItemKey; 2] = [ItemKey::TimedMetadata, ItemKey::Tracks];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemChange {
    TimedMetadata(Vec<MetadataItem>),
    TrackList,
    Other(String),
}

/// A change reported by a playback item, tagged with the item that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemEvent {
    pub item: ItemId,
    pub change: ItemChange,
}

pub type EventSender = UnboundedSender<ItemEvent>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Event came from an item that is no longer installed.
    Stale,
    /// Replacement value for the current track.
    Track(Option<Track>),
    /// Audio tracks of the item were disabled; the current track is untouched.
    TracksSilenced(usize),
}

pub struct MetadataObserver {
    events: EventSender,
    subscriptions: u64,
}

impl MetadataObserver {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            subscriptions: 0,
        }
    }

    /// Move both observed keys from `old` to `new`. Each key is removed
    /// before it is added so the two items never share a key.
    pub fn rebind(
        &mut self,
        mut old: Option<&mut (dyn PlaybackItem + 'static)>,
        mut new: Option<&mut (dyn PlaybackItem + 'static)>,
    ) {
        for key in OBSERVED_KEYS {
            if let Some(item) = old.as_deref_mut() {
                item.remove_observer(key);
            }
            if let Some(item) = new.as_deref_mut() {
                item.add_observer(key, self.events.clone());
                self.subscriptions += 1;
            }
        }
    }

    /// Number of key registrations made over the observer's lifetime.
    pub fn subscriptions(&self) -> u64 {
        self.subscriptions
    }

    pub fn interpret(
        &self,
        event: ItemEvent,
        current: Option<&mut (dyn PlaybackItem + 'static)>,
    ) -> Outcome {
        let item = match current {
            Some(item) if item.id() == event.item => item,
            _ => {
                debug!("Ignoring event from stale item {:?}", event.item);
                return Outcome::Stale;
            }
        };

        match event.change {
            ItemChange::TimedMetadata(items) => Outcome::Track(Some(Track::from_metadata(&items))),
            ItemChange::TrackList => {
                // The streamer renders audio; the item's own audio would double it
                let mut silenced = 0;
                for track in item.tracks() {
                    if track.media_type == MediaType::Audio {
                        debug!("Disabling audio track {} of item {:?}", track.id, event.item);
                        item.set_track_enabled(track.id, false);
                        silenced += 1;
                    }
                }
                Outcome::TracksSilenced(silenced)
            }
            ItemChange::Other(key) => {
                warn!("Unrecognized item event '{}'", key);
                Outcome::Track(None)
            }
        }
    }
}
