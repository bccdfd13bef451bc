use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::Path;

/// A selectable radio station.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Channel {
    #[serde(deserialize_with = "deserialize_identifier")]
    pub id: String,
    pub name: String,
}

impl Channel {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A concrete playable URL published for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Stream {
    pub url: String,
    #[serde(rename = "channelID", default, deserialize_with = "deserialize_identifier")]
    pub channel_id: String,
}

impl Stream {
    pub fn new(channel_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            channel_id: channel_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamList {
    #[serde(rename = "channelIDToStreams", default)]
    pub channel_id_to_streams: HashMap<String, Vec<Stream>>,
}

/// Catalog of channels and the streams published for each of them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamSet {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub streamlist: StreamList,
}

/// Read-only view the player needs from a catalog.
pub trait StreamCatalog {
    /// Streams for a channel in published order. Empty when nothing is published.
    fn lookup(&self, channel_id: &str) -> &[Stream];
}

impl StreamCatalog for StreamSet {
    fn lookup(&self, channel_id: &str) -> &[Stream] {
        self.streamlist
            .channel_id_to_streams
            .get(channel_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl StreamSet {
    pub fn from_json(json: &str) -> Result<Self> {
        let mut set: StreamSet = serde_json::from_str(json)?;

        // Streams inherit the key they were published under when the entry omits it
        for (channel_id, streams) in set.streamlist.channel_id_to_streams.iter_mut() {
            for stream in streams.iter_mut().filter(|s| s.channel_id.is_empty()) {
                stream.channel_id = channel_id.clone();
            }
        }

        debug!("Loaded stream set '{}' with {} channels", set.name, set.channels.len());
        Ok(set)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read stream set {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Invalid stream set {}", path.display()))
    }

    /// Find a channel by identifier, falling back to a case-insensitive name match.
    pub fn channel(&self, query: &str) -> Option<&Channel> {
        self.channels
            .iter()
            .find(|c| c.id == query)
            .or_else(|| self.channels.iter().find(|c| c.name.eq_ignore_ascii_case(query)))
    }
}

/// One entry of a playback item's timed metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataItem {
    pub key: String,
    pub value: String,
}

impl MetadataItem {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Now-playing snapshot, replaced wholesale on every metadata event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Track {
    pub artist: String,
    pub title: String,
}

impl Track {
    pub fn from_metadata(items: &[MetadataItem]) -> Self {
        let mut track = Track::default();

        for item in items {
            match item.key.to_ascii_lowercase().as_str() {
                "artist" => track.artist = item.value.trim().to_string(),
                "title" => track.title = item.value.trim().to_string(),
                "streamtitle" if track.title.is_empty() => {
                    // ICY titles are published as "Artist - Title"
                    match item.value.split_once(" - ") {
                        Some((artist, title)) => {
                            track.artist = artist.trim().to_string();
                            track.title = title.trim().to_string();
                        }
                        None => track.title = item.value.trim().to_string(),
                    }
                }
                _ => {}
            }
        }

        track
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.artist.is_empty() {
            write!(f, "{}", self.title)
        } else {
            write!(f, "{} - {}", self.artist, self.title)
        }
    }
}

fn deserialize_identifier<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => Ok(s),
        StringOrNumber::Number(n) => Ok(n.to_string()),
    }
}
