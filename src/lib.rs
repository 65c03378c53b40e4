// SPDX-License-Identifier: MIT
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Buffered, non-blocking capture of IMU samples and camera frames to disk.
//!
//! Producers call [`CaptureSession::ingest`] from their callback threads.
//! Samples collect in bounded per-channel buffers; a full buffer is sealed,
//! numbered and handed to a [`SequenceWriter`] pool that serializes it to
//! its own file while the producer carries on.

pub mod capture;
pub mod config;
pub mod error;
pub mod recording;
pub mod sample;
pub mod source;

pub use capture::buffer::SampleBuffer;
pub use capture::namer::SequenceNamer;
pub use capture::rate::RateEstimator;
pub use capture::session::{CaptureFlag, CaptureSession, Ingest, StartOutcome, StopOutcome};
pub use config::{CaptureConfig, InertialFormat};
pub use error::{CaptureError, Result};
pub use recording::writer::{DiskSink, SealedSequence, SequenceSink, SequenceWriter, WriterStats};
pub use sample::{Channel, FrameSample, InertialSample, PixelFormat, Reading, Sample};
