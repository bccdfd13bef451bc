use anyhow::Result;
use log::debug;
use std::rc::Rc;
use std::sync::Arc;

use crate::actions::Command;
use difm_player::{Channel, Player, PlayerDelegate, StreamCatalog, StreamSet, Track};

/// Prints player transitions to the console.
struct ConsoleDelegate;

impl PlayerDelegate for ConsoleDelegate {
    fn playback_started(&self, channel: &Channel) {
        println!("▶ {}", channel.name);
    }

    fn playback_paused(&self) {
        println!("⏸ paused");
    }

    fn playback_stopped(&self) {
        println!("⏹ stopped");
    }

    fn track_changed(&self, _new_track: Option<&Track>) {}
}

pub struct AppController {
    player: Player,
    stream_set: Arc<StreamSet>,
    // Owns the delegate; the player only holds a weak handle
    _delegate: Rc<dyn PlayerDelegate>,
    shown_track: Option<Track>,
}

impl AppController {
    pub fn new(mut player: Player, stream_set: Arc<StreamSet>, listen_key: Option<String>) -> Self {
        let delegate: Rc<dyn PlayerDelegate> = Rc::new(ConsoleDelegate);
        player.set_delegate(&delegate);
        player.set_listen_key(listen_key);
        player.set_stream_set(Some(stream_set.clone() as Arc<dyn StreamCatalog>));

        Self {
            player,
            stream_set,
            _delegate: delegate,
            shown_track: None,
        }
    }

    /// Returns true when the user asked to quit.
    pub fn handle_command(&mut self, command: Command) -> Result<bool> {
        debug!("Handling {:?}", command);
        match command {
            Command::List => self.list_channels(),
            Command::Select(query) => match self.stream_set.channel(&query).cloned() {
                Some(channel) => self.player.set_current_channel(Some(channel)),
                None => println!("No channel matches '{}'", query),
            },
            Command::Clear => self.player.set_current_channel(None),
            Command::Play => self.player.play(),
            Command::Pause => self.player.pause(),
            Command::Toggle => {
                if self.player.is_playing() {
                    self.player.pause();
                } else {
                    self.player.play();
                }
            }
            Command::Status => self.print_status(),
            Command::Quit => return Ok(true),
        }
        Ok(false)
    }

    /// Apply queued item events and show the track when it changes.
    pub fn tick(&mut self) {
        if self.player.pump_events() == 0 {
            return;
        }
        if self.player.current_track() != self.shown_track.as_ref() {
            self.shown_track = self.player.current_track().cloned();
            if let Some(track) = &self.shown_track {
                println!("♪ {}", track);
            }
        }
    }

    pub fn shutdown(&mut self) {
        self.player.pause();
    }

    fn list_channels(&self) {
        let selected = self.player.current_channel().map(|c| c.id.as_str());
        for channel in &self.stream_set.channels {
            let marker = if Some(channel.id.as_str()) == selected { ">" } else { " " };
            let streams = self.stream_set.lookup(&channel.id).len();
            println!("{} {:>6}  {} ({} streams)", marker, channel.id, channel.name, streams);
        }
    }

    fn print_status(&self) {
        let channel = self
            .player
            .current_channel()
            .map(|c| c.name.as_str())
            .unwrap_or("none");
        println!("channel: {}", channel);
        println!("state:   {:?}", self.player.state());
        if let Some(url) = self.player.current_url() {
            println!("stream:  {}", url);
        }
        if let Some(track) = self.player.current_track() {
            println!("track:   {}", track);
        }
    }
}
