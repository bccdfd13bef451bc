use std::rc::Rc;
use tokio::runtime::Handle;
use url::Url;

use crate::audio::{AudioOutput, HttpStreamer};
use crate::icy::IcyEngine;
use crate::session::{Engine, PlaybackItem, SessionBackend, Streamer};

/// Builds network-backed sessions on a tokio runtime.
pub struct DefaultBackend {
    runtime: Handle,
    output: Rc<AudioOutput>,
}

impl DefaultBackend {
    pub fn new(runtime: Handle, output: Rc<AudioOutput>) -> Self {
        Self { runtime, output }
    }
}

impl SessionBackend for DefaultBackend {
    fn open_player(&self, url: &Url) -> (Box<dyn Engine>, Box<dyn PlaybackItem>) {
        let (engine, item) = IcyEngine::open(url, self.runtime.clone());
        (Box::new(engine), Box::new(item))
    }

    fn open_streamer(&self, url: &Url) -> Box<dyn Streamer> {
        Box::new(HttpStreamer::new(url.clone(), self.runtime.clone(), self.output.clone()))
    }
}
