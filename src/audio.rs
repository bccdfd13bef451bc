use anyhow::Result;
use futures_util::stream::StreamExt;
use log::{debug, warn};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::cell::RefCell;
use std::io::{Read, Seek, SeekFrom};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::AudioSessionError;
use crate::player::AudioSession;
use crate::session::Streamer;
use crate::utils::parsing::ParsingUtils;

const CHUNK_CHANNEL_BOUND: usize = 64;
const SINK_QUEUE_BOUND: usize = 16;

/// Default audio output device, opened on first use.
#[derive(Default)]
pub struct AudioOutput {
    device: RefCell<Option<(OutputStream, OutputStreamHandle)>>,
}

impl AudioOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Option<OutputStreamHandle> {
        self.device.borrow().as_ref().map(|(_, handle)| handle.clone())
    }
}

impl AudioSession for AudioOutput {
    fn set_playback_category(&self) -> Result<(), AudioSessionError> {
        let mut device = self.device.borrow_mut();
        if device.is_none() {
            let opened = OutputStream::try_default()
                .map_err(|e| AudioSessionError::OutputUnavailable(e.to_string()))?;
            debug!("Opened default audio output");
            *device = Some(opened);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamerState {
    Stopped,
    Connecting,
    Playing,
    Error(String),
}

/// Network chunks exposed to Symphonia as a blocking reader
struct ChunkReader {
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        while self.pos >= self.chunk.len() {
            let rx = self.rx.get_mut().map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::Other, "failed to lock receiver")
            })?;
            match rx.blocking_recv() {
                Some(chunk) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Seek for ChunkReader {
    fn seek(&mut self, _: SeekFrom) -> std::io::Result<u64> {
        Err(std::io::Error::new(std::io::ErrorKind::Unsupported, "seek not supported"))
    }
}

impl MediaSource for ChunkReader {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}

/// Streams and decodes one URL into the shared audio output.
pub struct HttpStreamer {
    url: Url,
    runtime: Handle,
    output: Rc<AudioOutput>,
    state: Arc<Mutex<StreamerState>>,
    sink: Option<Arc<Sink>>,
    cancellation_token: Option<CancellationToken>,
}

impl HttpStreamer {
    pub fn new(url: Url, runtime: Handle, output: Rc<AudioOutput>) -> Self {
        Self {
            url,
            runtime,
            output,
            state: Arc::new(Mutex::new(StreamerState::Stopped)),
            sink: None,
            cancellation_token: None,
        }
    }

    pub fn state(&self) -> StreamerState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|_| StreamerState::Error("Failed to acquire state lock".to_string()))
    }

    fn set_state(state: &Mutex<StreamerState>, next: StreamerState) {
        if let Ok(mut guard) = state.lock() {
            debug!("Streamer state changing from {:?} to {:?}", *guard, next);
            *guard = next;
        }
    }

    /// Write `next` unless `token` was cancelled. The check happens under the
    /// state lock so a concurrent `stop()` is never overwritten.
    fn set_state_unless_cancelled(
        state: &Mutex<StreamerState>,
        next: StreamerState,
        token: &CancellationToken,
    ) {
        if let Ok(mut guard) = state.lock() {
            if token.is_cancelled() {
                return;
            }
            debug!("Streamer state changing from {:?} to {:?}", *guard, next);
            *guard = next;
        }
    }
}

impl Streamer for HttpStreamer {
    fn start(&mut self) {
        if self.is_playing() {
            return;
        }

        let Some(handle) = self.output.handle() else {
            warn!("No audio output available for {}", self.url);
            Self::set_state(&self.state, StreamerState::Error("no audio output".to_string()));
            return;
        };
        let sink = match Sink::try_new(&handle) {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                warn!("Failed to create sink: {}", e);
                Self::set_state(&self.state, StreamerState::Error(e.to_string()));
                return;
            }
        };

        if let Some(previous) = self.cancellation_token.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        Self::set_state(&self.state, StreamerState::Connecting);

        let url = self.url.to_string();
        let state = self.state.clone();
        let task_sink = sink.clone();
        let task_token = token.clone();
        self.runtime.spawn(async move {
            let next = match fetch_and_play(&url, task_sink, &state, &task_token).await {
                Ok(()) => StreamerState::Stopped,
                Err(e) => {
                    warn!("Streaming task failed: {}", e);
                    StreamerState::Error(e.to_string())
                }
            };
            // A stopped streamer may already belong to a newer start()
            Self::set_state_unless_cancelled(&state, next, &task_token);
        });

        self.sink = Some(sink);
        self.cancellation_token = Some(token);
    }

    fn stop(&mut self) {
        if let Some(token) = self.cancellation_token.take() {
            token.cancel();
        }
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        Self::set_state(&self.state, StreamerState::Stopped);
    }

    fn is_playing(&self) -> bool {
        matches!(self.state(), StreamerState::Connecting | StreamerState::Playing)
    }
}

impl Drop for HttpStreamer {
    fn drop(&mut self) {
        if let Some(token) = self.cancellation_token.take() {
            token.cancel();
        }
    }
}

pub(crate) async fn resolve_stream_url(client: &reqwest::Client, url: &str) -> Result<String> {
    if !ParsingUtils::is_playlist_url(url) {
        return Ok(url.to_string());
    }

    debug!("Parsing playlist from URL: {}", url);
    let content = client.get(url).send().await?.error_for_status()?.text().await?;
    ParsingUtils::parse_playlist(url, &content)
}

async fn fetch_and_play(
    url: &str,
    sink: Arc<Sink>,
    state: &Arc<Mutex<StreamerState>>,
    cancellation_token: &CancellationToken,
) -> Result<()> {
    let client = reqwest::Client::new();
    let stream_url = resolve_stream_url(&client, url).await?;
    debug!("Fetching stream from {}", stream_url);

    let response = client.get(&stream_url).send().await?;
    if !response.status().is_success() {
        return Err(anyhow::anyhow!("HTTP error: {}", response.status()));
    }
    HttpStreamer::set_state_unless_cancelled(state, StreamerState::Playing, cancellation_token);
    if cancellation_token.is_cancelled() {
        return Ok(());
    }

    let (chunk_tx, chunk_rx) = mpsc::channel::<Vec<u8>>(CHUNK_CHANNEL_BOUND);
    let decode_token = cancellation_token.clone();
    let decode_task =
        tokio::task::spawn_blocking(move || decode_blocking_task(chunk_rx, sink, decode_token));

    let mut body = response.bytes_stream();
    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                debug!("Network fetch cancelled");
                break;
            }
            chunk = body.next() => match chunk {
                Some(Ok(bytes)) => {
                    if chunk_tx.send(bytes.to_vec()).await.is_err() {
                        debug!("Decoder gone, ending fetch");
                        break;
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    debug!("Network stream ended");
                    break;
                }
            }
        }
    }

    drop(chunk_tx);
    decode_task.await??;
    Ok(())
}

fn decode_blocking_task(
    chunk_rx: mpsc::Receiver<Vec<u8>>,
    sink: Arc<Sink>,
    cancellation_token: CancellationToken,
) -> Result<()> {
    let source = ChunkReader {
        rx: Mutex::new(chunk_rx),
        chunk: Vec::new(),
        pos: 0,
    };
    let mss = MediaSourceStream::new(Box::new(source), MediaSourceStreamOptions::default());

    let probed = get_probe().format(
        &Hint::new(),
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("no default track"))?;
    let track_id = track.id;
    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    debug!(
        "Found audio track: codec={:?}, sample_rate={:?}",
        track.codec_params.codec, track.codec_params.sample_rate
    );

    while !cancellation_token.is_cancelled() {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                debug!("Stream exhausted");
                break;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Non-fatal, skip bad frame
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        samples.copy_interleaved_ref(decoded);

        while sink.len() > SINK_QUEUE_BOUND && !cancellation_token.is_cancelled() {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        sink.append(rodio::buffer::SamplesBuffer::new(
            spec.channels.count() as u16,
            spec.rate,
            samples.samples().to_vec(),
        ));
    }

    debug!("Decode blocking task ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_reader_spans_chunks_and_ends() {
        let (tx, rx) = mpsc::channel(4);
        tx.try_send(b"abc".to_vec()).unwrap();
        tx.try_send(b"defg".to_vec()).unwrap();
        drop(tx);

        let mut reader = ChunkReader {
            rx: Mutex::new(rx),
            chunk: Vec::new(),
            pos: 0,
        };
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abcdefg");
        assert!(reader.seek(SeekFrom::Start(0)).is_err());
    }

    #[test]
    fn test_start_without_output_does_not_play() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let url = Url::parse("http://prem1.di.fm/trance_hi?key").unwrap();
        let output = Rc::new(AudioOutput::new());
        let mut streamer = HttpStreamer::new(url, runtime.handle().clone(), output);

        streamer.start();
        assert!(!streamer.is_playing());
        assert!(matches!(streamer.state(), StreamerState::Error(_)));

        streamer.stop();
        assert_eq!(streamer.state(), StreamerState::Stopped);
    }

    #[test]
    fn test_stop_wins_over_late_playing_write() {
        let state = Mutex::new(StreamerState::Connecting);
        let token = CancellationToken::new();

        // stop() runs between the task's connect and its Playing write
        token.cancel();
        HttpStreamer::set_state(&state, StreamerState::Stopped);
        HttpStreamer::set_state_unless_cancelled(&state, StreamerState::Playing, &token);

        assert_eq!(*state.lock().unwrap(), StreamerState::Stopped);
    }

    #[test]
    fn test_live_token_allows_state_write() {
        let state = Mutex::new(StreamerState::Connecting);
        let token = CancellationToken::new();

        HttpStreamer::set_state_unless_cancelled(&state, StreamerState::Playing, &token);

        assert_eq!(*state.lock().unwrap(), StreamerState::Playing);
    }
}
