//! Host audio transport: playback output plus a live sample tap for
//! spectrum analysis.
//!
//! The `AudioTransport` trait is the seam between the playback controller
//! and the host audio subsystem. The rodio implementation owns decode and
//! output; a `TapSource` wrapper mixes decoded frames to mono into a shared
//! ring buffer that the frame loop snapshots for FFT analysis.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use rodio::source::SeekError;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use thiserror::Error;

use crate::player::ResourceHandle;

/// Cross-origin policy for a source binding.
///
/// Local file sources must not request cross-origin access; remote URL
/// sources must request anonymous access or their output cannot be
/// analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossOrigin {
    None,
    Anonymous,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("audio output device unavailable: {0}")]
    Device(String),
    #[error("no media source bound")]
    NoSource,
    #[error("playback rejected: {0}")]
    Rejected(String),
}

/// Ring buffer capacity; a few FFT windows of headroom.
const TAP_CAPACITY: usize = 8192;

/// Samples flushed from the audio callback in batches to keep mutex
/// traffic off the per-sample path.
const TAP_FLUSH: usize = 512;

/// Shared mono sample ring written by the audio thread and snapshotted by
/// the frame loop.
#[derive(Clone, Default)]
pub struct SampleTap {
    samples: Arc<Mutex<VecDeque<f32>>>,
    sample_rate: Arc<AtomicU32>,
}

impl SampleTap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    fn set_sample_rate(&self, rate: u32) {
        self.sample_rate.store(rate, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        if let Ok(mut samples) = self.samples.lock() {
            samples.clear();
        }
    }

    fn extend(&self, chunk: &[f32]) {
        if let Ok(mut samples) = self.samples.lock() {
            samples.extend(chunk.iter().copied());
            while samples.len() > TAP_CAPACITY {
                samples.pop_front();
            }
        }
    }

    /// Copy the newest samples into `out[..n]`, preserving time order.
    /// Returns how many samples were available.
    pub fn latest(&self, out: &mut [f32]) -> usize {
        let Ok(samples) = self.samples.lock() else {
            return 0;
        };
        let n = samples.len().min(out.len());
        let start = samples.len() - n;
        for (dst, src) in out[..n].iter_mut().zip(samples.iter().skip(start)) {
            *dst = *src;
        }
        n
    }
}

/// Pass-through source that feeds a mono mixdown of every frame into a
/// `SampleTap` while the sink consumes it.
pub struct TapSource<S>
where
    S: Source<Item = f32>,
{
    inner: S,
    tap: SampleTap,
    channels: u16,
    frame_acc: f32,
    frame_fill: u16,
    pending: Vec<f32>,
}

impl<S> TapSource<S>
where
    S: Source<Item = f32>,
{
    pub fn new(inner: S, tap: SampleTap) -> Self {
        tap.set_sample_rate(inner.sample_rate());
        tap.clear();
        let channels = inner.channels().max(1);
        Self {
            inner,
            tap,
            channels,
            frame_acc: 0.0,
            frame_fill: 0,
            pending: Vec::with_capacity(TAP_FLUSH),
        }
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            self.tap.extend(&self.pending);
            self.pending.clear();
        }
    }
}

impl<S> Iterator for TapSource<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        match self.inner.next() {
            Some(sample) => {
                self.frame_acc += sample;
                self.frame_fill += 1;
                if self.frame_fill >= self.channels {
                    self.pending.push(self.frame_acc / self.channels as f32);
                    self.frame_acc = 0.0;
                    self.frame_fill = 0;
                    if self.pending.len() >= TAP_FLUSH {
                        self.flush();
                    }
                }
                Some(sample)
            }
            None => {
                self.flush();
                None
            }
        }
    }
}

impl<S> Source for TapSource<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.inner.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }

    fn try_seek(&mut self, pos: Duration) -> std::result::Result<(), SeekError> {
        self.tap.clear();
        self.inner.try_seek(pos)
    }
}

/// The host audio transport consumed by the playback controller.
pub trait AudioTransport {
    /// Lazily initialize the output device (first-user-gesture analogue).
    fn ensure_ready(&mut self) -> Result<()>;

    /// Bind a new media source with the given cross-origin policy. Must be
    /// called before resuming playback of a newly selected track.
    fn bind(&mut self, handle: &ResourceHandle, cors: CrossOrigin) -> Result<()>;

    /// Start or resume playback. Failures are recoverable-reported.
    fn play(&mut self) -> std::result::Result<(), TransportError>;

    fn pause(&mut self);

    /// Release the bound source entirely.
    fn stop(&mut self);

    fn seek(&mut self, position: Duration);

    fn set_volume(&mut self, volume: f32);

    fn position(&self) -> Duration;

    fn duration(&self) -> Option<Duration>;

    /// True exactly once when the bound source has played to completion.
    fn ended(&mut self) -> bool;

    /// Live sample feed for spectrum analysis, if this transport has one.
    fn sample_tap(&self) -> Option<SampleTap>;
}

/// rodio-backed transport. Decoding and resampling are rodio's concern;
/// remote URL streaming is delegated upstream and surfaces here as a
/// recoverable play failure.
pub struct RodioTransport {
    output: Option<(OutputStream, OutputStreamHandle)>,
    sink: Option<Sink>,
    tap: SampleTap,
    volume: f32,
    has_source: bool,
    playing: bool,
    duration: Option<Duration>,
    base_position: Duration,
    started_at: Option<Instant>,
}

impl RodioTransport {
    pub fn new() -> Self {
        Self {
            output: None,
            sink: None,
            tap: SampleTap::new(),
            volume: 0.8,
            has_source: false,
            playing: false,
            duration: None,
            base_position: Duration::ZERO,
            started_at: None,
        }
    }
}

impl Default for RodioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioTransport for RodioTransport {
    fn ensure_ready(&mut self) -> Result<()> {
        if self.output.is_none() {
            let (stream, handle) = OutputStream::try_default()
                .map_err(|e| anyhow!("no audio output device: {e}"))?;
            self.output = Some((stream, handle));
            debug!("audio output stream initialized");
        }
        Ok(())
    }

    fn bind(&mut self, handle: &ResourceHandle, cors: CrossOrigin) -> Result<()> {
        self.ensure_ready()?;
        if let Some(old) = self.sink.take() {
            old.stop();
        }
        self.has_source = false;
        self.playing = false;
        self.duration = None;
        self.base_position = Duration::ZERO;
        self.started_at = None;
        self.tap.clear();

        let Some((_, stream_handle)) = &self.output else {
            return Err(anyhow!("audio output not initialized"));
        };
        let sink = Sink::try_new(stream_handle).context("creating audio sink")?;
        sink.set_volume(self.volume);
        sink.pause();

        match handle {
            ResourceHandle::File(path) => {
                debug!("binding local file {:?} ({:?} cross-origin)", path, cors);
                let file = File::open(path)
                    .with_context(|| format!("opening audio file {}", path.display()))?;
                let decoder = Decoder::new(BufReader::new(file))
                    .with_context(|| format!("decoding audio file {}", path.display()))?;
                self.duration = decoder.total_duration();
                let source = TapSource::new(decoder.convert_samples::<f32>(), self.tap.clone());
                sink.append(source);
                self.has_source = true;
            }
            ResourceHandle::Url(url) => {
                // Fetching remote streams is an upstream concern; the
                // binding and its CORS policy are still recorded so a
                // capable transport could take over.
                info!("bound remote source {url} ({cors:?} cross-origin); streaming is delegated");
            }
        }

        self.sink = Some(sink);
        Ok(())
    }

    fn play(&mut self) -> std::result::Result<(), TransportError> {
        let Some(sink) = &self.sink else {
            return Err(TransportError::NoSource);
        };
        if !self.has_source {
            return Err(TransportError::NoSource);
        }
        sink.play();
        self.playing = true;
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(started) = self.started_at.take() {
            self.base_position += started.elapsed();
        }
        self.playing = false;
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.has_source = false;
        self.playing = false;
        self.duration = None;
        self.base_position = Duration::ZERO;
        self.started_at = None;
        self.tap.clear();
    }

    fn seek(&mut self, position: Duration) {
        let position = match self.duration {
            Some(total) => position.min(total),
            None => position,
        };
        let Some(sink) = &self.sink else { return };
        match sink.try_seek(position) {
            Ok(()) => {
                self.base_position = position;
                if self.playing {
                    self.started_at = Some(Instant::now());
                }
            }
            Err(e) => warn!("seek to {position:?} failed: {e}"),
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
    }

    fn position(&self) -> Duration {
        let mut position = self.base_position;
        if let Some(started) = self.started_at {
            position += started.elapsed();
        }
        match self.duration {
            Some(total) => position.min(total),
            None => position,
        }
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn ended(&mut self) -> bool {
        let finished = self.has_source && self.sink.as_ref().is_some_and(|s| s.empty());
        if finished {
            self.has_source = false;
            self.playing = false;
            self.started_at = None;
        }
        finished
    }

    fn sample_tap(&self) -> Option<SampleTap> {
        Some(self.tap.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rodio::buffer::SamplesBuffer;

    #[test]
    fn test_sample_tap_latest_preserves_order() {
        let tap = SampleTap::new();
        tap.extend(&[1.0, 2.0, 3.0, 4.0]);

        let mut out = [0.0f32; 3];
        let n = tap.latest(&mut out);
        assert_eq!(n, 3);
        assert_eq!(out, [2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_sample_tap_short_fill() {
        let tap = SampleTap::new();
        tap.extend(&[0.5, -0.5]);

        let mut out = [9.0f32; 4];
        let n = tap.latest(&mut out);
        assert_eq!(n, 2);
        assert_eq!(&out[..2], &[0.5, -0.5]);
    }

    #[test]
    fn test_sample_tap_caps_backlog() {
        let tap = SampleTap::new();
        let chunk = vec![1.0f32; TAP_CAPACITY + 100];
        tap.extend(&chunk);
        let mut out = vec![0.0f32; 2 * TAP_CAPACITY];
        assert_eq!(tap.latest(&mut out), TAP_CAPACITY);
    }

    #[test]
    fn test_tap_source_mixes_stereo_to_mono() {
        let tap = SampleTap::new();
        // Two stereo frames: (0.2, 0.4) and (-1.0, 0.0)
        let inner = SamplesBuffer::new(2, 44_100, vec![0.2f32, 0.4, -1.0, 0.0]);
        let mut source = TapSource::new(inner, tap.clone());

        // Drain the source as the sink would.
        let consumed: Vec<f32> = source.by_ref().collect();
        assert_eq!(consumed.len(), 4);

        let mut out = [0.0f32; 4];
        let n = tap.latest(&mut out);
        assert_eq!(n, 2);
        assert!((out[0] - 0.3).abs() < 1e-6);
        assert!((out[1] - (-0.5)).abs() < 1e-6);
        assert_eq!(tap.sample_rate(), 44_100);
    }
}
