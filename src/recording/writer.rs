// SPDX-License-Identifier: MIT
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use crate::config::{CaptureConfig, InertialFormat};
use crate::error::{CaptureError, Result};
use crate::recording::format::{self, SessionMetadata};
use crate::recording::jpeg;
use crate::sample::{Channel, InertialSample, Sample};

/// Immutable snapshot of one sealed buffer, owned by the writer from
/// dispatch on.
#[derive(Debug, Clone)]
pub struct SealedSequence {
    pub channel: Channel,
    pub index: u64,
    pub samples: Vec<Sample>,
}

impl SealedSequence {
    fn inertial_rows(&self) -> Result<Vec<InertialSample>> {
        self.samples
            .iter()
            .map(|sample| match sample {
                Sample::Inertial(s) => Ok(*s),
                Sample::Frame(_) => Err(CaptureError::Serialization {
                    channel: self.channel,
                    index: self.index,
                    reason: "frame sample in an inertial sequence".into(),
                }),
            })
            .collect()
    }
}

/// Persists one sealed sequence under a session directory.
pub trait SequenceSink: Send + Sync {
    /// Writes `sequence` and returns the path of the file it produced.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence cannot be serialized or stored.
    fn persist(&self, dir: &Path, sequence: &SealedSequence) -> Result<PathBuf>;
}

/// Writes inertial sequences as text or binary rows and frames as JPEG.
#[derive(Debug, Clone)]
pub struct DiskSink {
    inertial_format: InertialFormat,
    jpeg_quality: u8,
    index_width: u32,
    frame_index_width: u32,
}

impl DiskSink {
    #[must_use]
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            inertial_format: config.inertial_format,
            jpeg_quality: config.jpeg_quality,
            index_width: config.index_width,
            frame_index_width: config.frame_index_width,
        }
    }

    fn encode_inertial(&self, sequence: &SealedSequence) -> Result<Vec<u8>> {
        let rows = sequence.inertial_rows()?;
        let serialization = |reason: String| CaptureError::Serialization {
            channel: sequence.channel,
            index: sequence.index,
            reason,
        };
        match self.inertial_format {
            InertialFormat::Text => {
                let mut out = Vec::with_capacity(rows.len() * 48);
                format::write_text_rows(&mut out, &rows).map_err(|e| serialization(e.to_string()))?;
                Ok(out)
            }
            InertialFormat::Binary => format::encode_binary(sequence.channel, sequence.index, &rows)
                .map_err(|e| serialization(format!("{e:#}"))),
        }
    }

    fn encode_frame(&self, sequence: &SealedSequence) -> Result<Vec<u8>> {
        match sequence.samples.as_slice() {
            [Sample::Frame(frame)] => jpeg::encode_jpeg(frame, sequence.index, self.jpeg_quality),
            other => Err(CaptureError::Serialization {
                channel: Channel::Frame,
                index: sequence.index,
                reason: format!("expected exactly one frame, got {} samples", other.len()),
            }),
        }
    }
}

impl SequenceSink for DiskSink {
    fn persist(&self, dir: &Path, sequence: &SealedSequence) -> Result<PathBuf> {
        let (bytes, width) = if sequence.channel.is_inertial() {
            (self.encode_inertial(sequence)?, self.index_width)
        } else {
            (self.encode_frame(sequence)?, self.frame_index_width)
        };
        let path = dir.join(format::sequence_file_name(
            sequence.channel,
            sequence.index,
            width,
            self.inertial_format,
        ));
        write_atomic(&path, &bytes)?;
        Ok(path)
    }
}

/// Writes `bytes` to a sibling `.tmp` file and renames it over `path`.
/// A failed write leaves no file at `path`; the temporary is removed on a
/// best-effort basis.
///
/// # Errors
///
/// Returns [`CaptureError::StorageUnavailable`] on any I/O failure.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let written = File::create(&tmp).and_then(|file| {
        let mut out = BufWriter::new(file);
        out.write_all(bytes)?;
        out.flush()
    });
    if let Err(e) = written.and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(CaptureError::storage(path, e));
    }
    Ok(())
}

/// Stores the session header next to the sequence files.
///
/// # Errors
///
/// Returns [`CaptureError::StorageUnavailable`] if the file cannot be
/// written.
pub fn write_session_metadata(dir: &Path, meta: &SessionMetadata) -> Result<()> {
    let path = dir.join(format::SESSION_META);
    let bytes = format::encode_session_metadata(meta).map_err(|e| {
        CaptureError::storage(&path, std::io::Error::other(format!("{e:#}")))
    })?;
    write_atomic(&path, &bytes)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub dispatched: u64,
    pub completed: u64,
    pub failed: u64,
    pub pending: usize,
    pub last_error: Option<String>,
}

struct Job {
    dir: Arc<Path>,
    sequence: SealedSequence,
}

#[derive(Default)]
struct Shared {
    pending: Mutex<usize>,
    idle: Condvar,
    dispatched: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl Shared {
    fn finish_one(&self) {
        let mut pending = lock(&self.pending);
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.idle.notify_all();
        }
    }

    fn record_failure(&self, message: String) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        *lock(&self.last_error) = Some(message);
    }
}

/// Fixed pool of worker threads that persist sealed sequences.
///
/// `dispatch` only enqueues, so the producer never waits on I/O. Each job
/// writes its own uniquely named file, so jobs may finish in any order.
/// A failed job is logged and counted without affecting the others.
pub struct SequenceWriter {
    sender: Option<Sender<Job>>,
    shared: Arc<Shared>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl SequenceWriter {
    /// Spawns `threads` workers (at least one) feeding `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::WorkerSpawn`] if a worker thread cannot be
    /// started.
    pub fn spawn(sink: Arc<dyn SequenceSink>, threads: usize) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let shared = Arc::new(Shared::default());

        let mut writer = Self {
            sender: Some(sender),
            shared: Arc::clone(&shared),
            handles: Vec::with_capacity(threads.max(1)),
        };

        for id in 0..threads.max(1) {
            let receiver = receiver.clone();
            let shared = Arc::clone(&shared);
            let sink = Arc::clone(&sink);
            let handle = thread::Builder::new()
                .name(format!("seq-writer-{id}"))
                .spawn(move || worker_loop(&receiver, &shared, sink.as_ref()))
                .map_err(CaptureError::WorkerSpawn)?;
            writer.handles.push(handle);
        }

        Ok(writer)
    }

    /// Queues `sequence` for writing under `dir` and returns immediately.
    pub fn dispatch(&self, dir: Arc<Path>, sequence: SealedSequence) {
        *lock(&self.shared.pending) += 1;
        self.shared.dispatched.fetch_add(1, Ordering::Relaxed);

        let (channel, index) = (sequence.channel, sequence.index);
        let sent = self
            .sender
            .as_ref()
            .is_some_and(|tx| tx.send(Job { dir, sequence }).is_ok());
        if !sent {
            tracing::warn!(%channel, index, "writer pool is gone, sequence not written");
            self.shared
                .record_failure(format!("{channel} sequence {index}: writer pool is gone"));
            self.shared.finish_one();
        }
    }

    /// Blocks until every dispatched sequence has been written or has failed.
    pub fn drain(&self) {
        let mut pending = lock(&self.shared.pending);
        while *pending > 0 {
            pending = self
                .shared
                .idle
                .wait(pending)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    #[must_use]
    pub fn stats(&self) -> WriterStats {
        WriterStats {
            dispatched: self.shared.dispatched.load(Ordering::Relaxed),
            completed: self.shared.completed.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            pending: *lock(&self.shared.pending),
            last_error: lock(&self.shared.last_error).clone(),
        }
    }

    /// Lets the workers finish the queue, then joins them.
    pub fn shutdown(&mut self) {
        self.sender.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for SequenceWriter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: &Receiver<Job>, shared: &Shared, sink: &dyn SequenceSink) {
    for job in receiver {
        let (channel, index) = (job.sequence.channel, job.sequence.index);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            sink.persist(&job.dir, &job.sequence)
        }));
        match outcome {
            Ok(Ok(path)) => {
                shared.completed.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(%channel, index, path = %path.display(), "sequence written");
            }
            Ok(Err(e)) => {
                tracing::warn!(%channel, index, error = %e, "sequence flush failed");
                shared.record_failure(e.to_string());
            }
            Err(_) => {
                tracing::error!(%channel, index, "sequence sink panicked");
                shared.record_failure(format!("{channel} sequence {index}: sink panicked"));
            }
        }
        shared.finish_one();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
