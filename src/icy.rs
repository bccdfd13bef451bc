//! Engine-level player that follows a stream's ICY metadata.
//!
//! The engine requests the stream with `Icy-MetaData: 1`, publishes the
//! stream's media tracks once the response headers arrive, then reports
//! every `StreamTitle` block as timed metadata. Audio is never rendered
//! here; the streamer owns the output.

use anyhow::Result;
use futures_util::stream::StreamExt;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::api::MetadataItem;
use crate::audio::resolve_stream_url;
use crate::observer::{EventSender, ItemChange, ItemEvent, ItemKey};
use crate::session::{Engine, ItemId, MediaTrack, MediaType, PlaybackItem};
use crate::utils::parsing::{IcyMetadataReader, ParsingUtils};

#[derive(Default)]
struct ItemShared {
    observers: Mutex<HashMap<ItemKey, EventSender>>,
    tracks: Mutex<Vec<MediaTrack>>,
}

impl ItemShared {
    /// Deliver to the observer registered for `key`, if any.
    fn emit(&self, item: ItemId, key: ItemKey, change: ItemChange) {
        if let Ok(observers) = self.observers.lock() {
            if let Some(tx) = observers.get(&key) {
                let _ = tx.send(ItemEvent { item, change });
            }
        }
    }
}

pub struct IcyItem {
    id: ItemId,
    url: Url,
    shared: Arc<ItemShared>,
}

impl IcyItem {
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl PlaybackItem for IcyItem {
    fn id(&self) -> ItemId {
        self.id
    }

    fn add_observer(&mut self, key: ItemKey, events: EventSender) {
        if let Ok(mut observers) = self.shared.observers.lock() {
            observers.insert(key, events);
        }
    }

    fn remove_observer(&mut self, key: ItemKey) {
        if let Ok(mut observers) = self.shared.observers.lock() {
            observers.remove(&key);
        }
    }

    fn tracks(&self) -> Vec<MediaTrack> {
        self.shared
            .tracks
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    fn set_track_enabled(&mut self, track_id: u32, enabled: bool) {
        if let Ok(mut tracks) = self.shared.tracks.lock() {
            if let Some(track) = tracks.iter_mut().find(|t| t.id == track_id) {
                track.enabled = enabled;
            }
        }
    }
}

pub struct IcyEngine {
    id: ItemId,
    url: Url,
    runtime: Handle,
    shared: Arc<ItemShared>,
    cancellation_token: Option<CancellationToken>,
}

impl IcyEngine {
    /// Create an engine together with the item it plays.
    pub fn open(url: &Url, runtime: Handle) -> (Self, IcyItem) {
        let id = ItemId::next();
        let shared = Arc::new(ItemShared::default());
        let engine = Self {
            id,
            url: url.clone(),
            runtime,
            shared: shared.clone(),
            cancellation_token: None,
        };
        let item = IcyItem {
            id,
            url: url.clone(),
            shared,
        };
        (engine, item)
    }
}

impl Engine for IcyEngine {
    fn play(&mut self) {
        if self.cancellation_token.is_some() {
            return;
        }

        let token = CancellationToken::new();
        let id = self.id;
        let url = self.url.to_string();
        let shared = self.shared.clone();
        let task_token = token.clone();
        self.runtime.spawn(async move {
            if let Err(e) = watch_metadata(id, &url, &shared, &task_token).await {
                warn!("Metadata watch for {} failed: {}", url, e);
            }
        });
        self.cancellation_token = Some(token);
    }
}

impl Drop for IcyEngine {
    fn drop(&mut self) {
        if let Some(token) = self.cancellation_token.take() {
            token.cancel();
        }
    }
}

fn media_type_for(content_type: Option<&str>) -> MediaType {
    match content_type.map(|c| c.trim().to_ascii_lowercase()) {
        Some(c) if c.starts_with("video/") => MediaType::Video,
        Some(c) if c.starts_with("text/") => MediaType::Text,
        _ => MediaType::Audio,
    }
}

async fn watch_metadata(
    id: ItemId,
    url: &str,
    shared: &ItemShared,
    cancellation_token: &CancellationToken,
) -> Result<()> {
    let client = reqwest::Client::new();
    let stream_url = resolve_stream_url(&client, url).await?;

    let response = client
        .get(&stream_url)
        .header("Icy-MetaData", "1")
        .send()
        .await?
        .error_for_status()?;

    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let metaint = header("icy-metaint").and_then(|v| v.trim().parse::<usize>().ok());
    let media_type = media_type_for(header("content-type").as_deref());

    if let Ok(mut tracks) = shared.tracks.lock() {
        *tracks = vec![MediaTrack {
            id: 1,
            media_type,
            enabled: true,
        }];
    }
    shared.emit(id, ItemKey::Tracks, ItemChange::TrackList);

    let Some(metaint) = metaint.filter(|m| *m > 0) else {
        debug!("{} publishes no ICY metadata", stream_url);
        return Ok(());
    };

    let mut reader = IcyMetadataReader::new(metaint);
    let mut body = response.bytes_stream();
    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                debug!("Metadata watch cancelled");
                break;
            }
            chunk = body.next() => match chunk {
                Some(Ok(bytes)) => {
                    for block in reader.feed(&bytes) {
                        if let Some(title) = ParsingUtils::parse_stream_title(&block) {
                            debug!("ICY title: {}", title);
                            let metadata = vec![MetadataItem::new("StreamTitle", title)];
                            let change = ItemChange::TimedMetadata(metadata);
                            shared.emit(id, ItemKey::TimedMetadata, change);
                        }
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => break,
            }
        }
    }

    Ok(())
}
