// SPDX-License-Identifier: MIT
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use super::buffer::SampleBuffer;
use super::namer::SequenceNamer;
use super::rate::RateEstimator;
use crate::config::CaptureConfig;
use crate::error::{CaptureError, Result};
use crate::recording::format::{FRAME_DIR, SessionMetadata};
use crate::recording::writer::{
    self, DiskSink, SealedSequence, SequenceSink, SequenceWriter, WriterStats,
};
use crate::sample::{Channel, Reading, Sample};

/// Shared view of the capturing state for producer threads.
///
/// Stores use `Release` and loads use `Acquire`, so a producer that sees
/// `true` also sees the buffers and directory installed by `start`.
#[derive(Clone, Debug, Default)]
pub struct CaptureFlag(Arc<AtomicBool>);

impl CaptureFlag {
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, capturing: bool) {
        self.0.store(capturing, Ordering::Release);
    }
}

/// What `ingest` did with a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// Not capturing: only the display state was updated.
    Observed,
    /// Appended to the live buffer.
    Buffered,
    /// Appended and sealed; the buffer went to the writer as `index`.
    Sealed { index: u64 },
    /// Dropped with a logged warning.
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(PathBuf),
    /// `start` while capturing is a no-op; carries the active directory.
    AlreadyCapturing(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// `sequences` counts every index issued during the session, across
    /// channels, including the trailing flushes done by this stop.
    Stopped { dir: PathBuf, sequences: u64 },
    /// `stop` while idle is a no-op.
    AlreadyIdle,
}

struct ChannelState {
    channel: Channel,
    capacity: usize,
    recording: bool,
    buffer: SampleBuffer<Sample>,
    namer: SequenceNamer,
    rate: RateEstimator,
    dir: Option<Arc<Path>>,
}

impl ChannelState {
    fn new(channel: Channel, config: &CaptureConfig) -> Self {
        // Frames are large and arrive at preview rate: each one is its own
        // sequence.
        let (capacity, recording, width) = if channel.is_inertial() {
            (config.inertial_capacity, true, config.index_width)
        } else {
            (1, config.record_frames, config.frame_index_width)
        };
        Self {
            channel,
            capacity,
            recording,
            buffer: SampleBuffer::new(channel, capacity),
            namer: SequenceNamer::new(channel, width),
            rate: RateEstimator::new(config.rate_window),
            dir: None,
        }
    }

    fn reset(&mut self, dir: Option<Arc<Path>>) {
        self.buffer = SampleBuffer::new(self.channel, self.capacity);
        self.namer.reset();
        self.rate.reset();
        self.dir = dir;
    }
}

/// One capture activation at a time: per-channel buffers and sequence
/// counters, rate estimates for display, and the writer pool.
///
/// `ingest` and `observe` take `&self` and can be called from one producer
/// thread per channel. Each channel sits behind its own mutex, which is
/// only contended at `start`/`stop` boundaries. Display getters read the
/// published copies below and never take a channel lock.
pub struct CaptureSession {
    config: CaptureConfig,
    flag: CaptureFlag,
    session_dir: Mutex<Option<PathBuf>>,
    channels: [Mutex<ChannelState>; 3],
    rates: [AtomicU64; 3],
    latest: [Mutex<Option<Reading>>; 3],
    buffered: [AtomicUsize; 3],
    issued: [AtomicU64; 3],
    rejected: AtomicU64,
    writer: SequenceWriter,
}

impl CaptureSession {
    /// Builds an idle session that writes to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or the writer pool cannot
    /// be spawned.
    pub fn new(config: CaptureConfig) -> Result<Self> {
        let sink = Arc::new(DiskSink::new(&config));
        Self::with_sink(config, sink)
    }

    /// Builds an idle session persisting through `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or the writer pool cannot
    /// be spawned.
    pub fn with_sink(config: CaptureConfig, sink: Arc<dyn SequenceSink>) -> Result<Self> {
        config.validate()?;
        let writer = SequenceWriter::spawn(sink, config.writer_threads)?;
        let channels = Channel::ALL.map(|channel| Mutex::new(ChannelState::new(channel, &config)));
        Ok(Self {
            config,
            flag: CaptureFlag::default(),
            session_dir: Mutex::new(None),
            channels,
            rates: [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)],
            latest: [Mutex::new(None), Mutex::new(None), Mutex::new(None)],
            buffered: [AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0)],
            issued: [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)],
            rejected: AtomicU64::new(0),
            writer,
        })
    }

    /// Idle -> Capturing. Creates `dir` (and `IMG/` when frames are
    /// recorded), writes the session header, and resets buffers, sequence
    /// counters and rate estimators.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::StorageUnavailable`] if the directory or
    /// header cannot be created; the session then stays idle.
    pub fn start(&self, dir: &Path) -> Result<StartOutcome> {
        let mut current = lock(&self.session_dir);
        if self.flag.is_capturing() {
            let active = current.clone().unwrap_or_default();
            tracing::info!(dir = %active.display(), "start ignored, already capturing");
            return Ok(StartOutcome::AlreadyCapturing(active));
        }

        fs::create_dir_all(dir).map_err(|e| CaptureError::storage(dir, e))?;
        if self.config.record_frames {
            let frame_dir = dir.join(FRAME_DIR);
            fs::create_dir_all(&frame_dir).map_err(|e| CaptureError::storage(frame_dir, e))?;
        }
        writer::write_session_metadata(
            dir,
            &SessionMetadata::new(self.config.clone(), SystemTime::now()),
        )?;

        let shared: Arc<Path> = Arc::from(dir);
        for (slot, channel) in self.channels.iter().enumerate() {
            let mut state = lock(channel);
            state.reset(Some(Arc::clone(&shared)));
            self.publish(&state);
            self.rates[slot].store(0f64.to_bits(), Ordering::Relaxed);
        }

        *current = Some(dir.to_path_buf());
        self.flag.set(true);
        tracing::info!(dir = %dir.display(), "capture started");
        Ok(StartOutcome::Started(dir.to_path_buf()))
    }

    /// Capturing -> Idle. Seals every channel's remaining buffer, partial or
    /// empty, and dispatches it like a full one. Does not wait for the
    /// writes; see [`drain`](Self::drain).
    pub fn stop(&self) -> StopOutcome {
        let mut current = lock(&self.session_dir);
        if !self.flag.is_capturing() {
            tracing::debug!("stop ignored, not capturing");
            return StopOutcome::AlreadyIdle;
        }
        self.flag.set(false);

        let mut sequences = 0;
        for channel in &self.channels {
            let mut state = lock(channel);
            if state.recording {
                self.flush_remaining(&mut state);
                self.publish(&state);
            }
            sequences += state.namer.issued();
            state.dir = None;
        }

        let dir = current.take().unwrap_or_default();
        tracing::info!(dir = %dir.display(), sequences, "capture stopped");
        StopOutcome::Stopped { dir, sequences }
    }

    /// Producer entry point. Never blocks on I/O and never fails: problems
    /// are logged and reported as [`Ingest::Rejected`].
    pub fn ingest(&self, channel: Channel, sample: Sample) -> Ingest {
        if !sample.fits(channel) {
            let err = CaptureError::ChannelMismatch {
                channel,
                kind: sample.kind(),
            };
            tracing::warn!(error = %err, "sample rejected");
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Ingest::Rejected;
        }

        let mut state = lock(&self.channels[channel.slot()]);
        self.observe_locked(&mut state, &sample);

        if !(state.recording && state.dir.is_some() && self.flag.is_capturing()) {
            return Ingest::Observed;
        }

        if state.namer.is_exhausted() {
            let err = CaptureError::SequenceExhausted {
                channel,
                width: state.namer.width(),
            };
            tracing::warn!(error = %err, "sample rejected");
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Ingest::Rejected;
        }

        if state.buffer.is_sealed() {
            tracing::error!(
                error = %CaptureError::BufferSealed { channel },
                "sealed buffer left in place, replacing it"
            );
            state.buffer = SampleBuffer::new(channel, state.capacity);
        }

        let outcome = match state.buffer.append(sample) {
            Ok(false) => Ingest::Buffered,
            Ok(true) => self
                .seal_and_dispatch(&mut state)
                .map_or(Ingest::Buffered, |index| Ingest::Sealed { index }),
            Err(e) => {
                tracing::error!(error = %e, "append failed");
                self.rejected.fetch_add(1, Ordering::Relaxed);
                Ingest::Rejected
            }
        };
        self.publish(&state);
        outcome
    }

    /// Updates the channel's latest reading and rate without recording.
    pub fn observe(&self, channel: Channel, sample: &Sample) {
        let mut state = lock(&self.channels[channel.slot()]);
        self.observe_locked(&mut state, sample);
    }

    /// Blocks until every dispatched sequence has been written or failed.
    pub fn drain(&self) {
        self.writer.drain();
    }

    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.flag.is_capturing()
    }

    #[must_use]
    pub fn flag(&self) -> CaptureFlag {
        self.flag.clone()
    }

    #[must_use]
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Directory of the active session, if capturing.
    #[must_use]
    pub fn session_dir(&self) -> Option<PathBuf> {
        lock(&self.session_dir).clone()
    }

    /// Last computed events-per-second for `channel`.
    #[must_use]
    pub fn rate(&self, channel: Channel) -> f64 {
        f64::from_bits(self.rates[channel.slot()].load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn latest(&self, channel: Channel) -> Option<Reading> {
        *lock(&self.latest[channel.slot()])
    }

    /// Samples waiting in the live buffer of `channel`.
    #[must_use]
    pub fn buffered(&self, channel: Channel) -> usize {
        self.buffered[channel.slot()].load(Ordering::Relaxed)
    }

    /// Sequence indices issued for `channel` since the last start.
    #[must_use]
    pub fn sequences(&self, channel: Channel) -> u64 {
        self.issued[channel.slot()].load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn writer_stats(&self) -> WriterStats {
        self.writer.stats()
    }

    fn observe_locked(&self, state: &mut ChannelState, sample: &Sample) {
        let slot = state.channel.slot();
        *lock(&self.latest[slot]) = Some(Reading::from(sample));
        let rate = state.rate.tick(sample.timestamp_ns());
        self.rates[slot].store(rate.to_bits(), Ordering::Relaxed);
    }

    fn publish(&self, state: &ChannelState) {
        let slot = state.channel.slot();
        self.buffered[slot].store(state.buffer.len(), Ordering::Relaxed);
        self.issued[slot].store(state.namer.issued(), Ordering::Relaxed);
    }

    fn flush_remaining(&self, state: &mut ChannelState) {
        // An empty frame sequence has no image to write, and an exhausted
        // channel has no index left for an empty trailer.
        if state.buffer.is_empty()
            && (!state.channel.is_inertial() || state.namer.is_exhausted())
        {
            return;
        }
        self.seal_and_dispatch(state);
    }

    /// Assigns the next index, hands the sealed contents to the writer and
    /// installs a fresh buffer.
    fn seal_and_dispatch(&self, state: &mut ChannelState) -> Option<u64> {
        let channel = state.channel;
        let Some(dir) = state.dir.clone() else {
            tracing::warn!(%channel, "no session directory, buffer kept");
            return None;
        };
        let index = match state.namer.next() {
            Ok(index) => index,
            Err(e) => {
                tracing::error!(error = %e, "no sequence index left, buffer kept");
                return None;
            }
        };

        let samples = state.buffer.seal();
        state.buffer = SampleBuffer::new(channel, state.capacity);
        tracing::debug!(%channel, index, samples = samples.len(), "sequence sealed");

        self.writer.dispatch(
            dir,
            SealedSequence {
                channel,
                index,
                samples,
            },
        );
        Some(index)
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
