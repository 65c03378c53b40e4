// SPDX-License-Identifier: MIT
//! Synthetic sensor and camera drivers.
//!
//! Each channel runs on its own thread and pushes samples into a shared
//! [`CaptureSession`] at a fixed rate, the way platform sensor and preview
//! callbacks would.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::capture::session::CaptureSession;
use crate::error::{CaptureError, Result};
use crate::sample::{Channel, FrameSample, InertialSample, PixelFormat, Sample};

const STANDARD_GRAVITY: f32 = 9.806_65;

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub gyro_hz: f64,
    pub acce_hz: f64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            gyro_hz: 200.0,
            acce_hz: 200.0,
            fps: 30.0,
            width: 320,
            height: 240,
            format: PixelFormat::Nv21,
        }
    }
}

impl SourceConfig {
    fn period(hz: f64) -> Option<Duration> {
        (hz > 0.0 && hz.is_finite()).then(|| Duration::from_secs_f64(1.0 / hz))
    }
}

/// Running producer threads. Dropping stops and joins them.
pub struct Producers {
    shutdown: Arc<AtomicBool>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl Producers {
    /// Starts one thread per channel with a positive rate. Timestamps are
    /// nanoseconds since `epoch`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::WorkerSpawn`] if a thread cannot be started.
    pub fn spawn(session: &Arc<CaptureSession>, config: &SourceConfig, epoch: Instant) -> Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut producers = Self {
            shutdown: Arc::clone(&shutdown),
            handles: Vec::new(),
        };

        for channel in Channel::ALL {
            let hz = match channel {
                Channel::Gyro => config.gyro_hz,
                Channel::Acce => config.acce_hz,
                Channel::Frame => config.fps,
            };
            let Some(period) = SourceConfig::period(hz) else {
                continue;
            };

            let session = Arc::clone(session);
            let shutdown = Arc::clone(&shutdown);
            let config = config.clone();
            let handle = thread::Builder::new()
                .name(format!("{channel}-source"))
                .spawn(move || {
                    let mut n: u64 = 0;
                    let mut next = Instant::now();
                    while !shutdown.load(Ordering::Relaxed) {
                        next += period;
                        if let Some(wait) = next.checked_duration_since(Instant::now()) {
                            thread::sleep(wait);
                        }
                        let timestamp_ns =
                            i64::try_from(epoch.elapsed().as_nanos()).unwrap_or(i64::MAX);
                        let sample = synthetic_sample(channel, &config, n, timestamp_ns);
                        session.ingest(channel, sample);
                        n += 1;
                    }
                })
                .map_err(CaptureError::WorkerSpawn)?;
            producers.handles.push(handle);
        }

        Ok(producers)
    }

    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for Producers {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sample number `n` of `channel`: slow sinusoids for the IMU, a moving
/// gradient for the camera.
#[must_use]
pub fn synthetic_sample(channel: Channel, config: &SourceConfig, n: u64, timestamp_ns: i64) -> Sample {
    #[allow(clippy::cast_precision_loss)]
    let t = timestamp_ns as f32 / 1e9;
    match channel {
        Channel::Gyro => Sample::Inertial(InertialSample::new(
            timestamp_ns,
            0.2 * (t * 1.3).sin(),
            0.1 * (t * 0.7).cos(),
            0.05 * (t * 2.1).sin(),
        )),
        Channel::Acce => Sample::Inertial(InertialSample::new(
            timestamp_ns,
            0.3 * (t * 0.9).sin(),
            0.3 * (t * 1.1).cos(),
            STANDARD_GRAVITY + 0.1 * (t * 3.0).sin(),
        )),
        Channel::Frame => Sample::Frame(gradient_frame(config, n, timestamp_ns)),
    }
}

fn gradient_frame(config: &SourceConfig, n: u64, timestamp_ns: i64) -> FrameSample {
    let (width, height) = (config.width as usize, config.height as usize);
    let mut data = vec![128u8; config.format.frame_len(config.width, config.height)];
    #[allow(clippy::cast_possible_truncation)]
    let shift = (n % 256) as usize;
    for y in 0..height {
        for x in 0..width {
            #[allow(clippy::cast_possible_truncation)]
            let luma = ((x + y + shift) % 256) as u8;
            data[y * width + x] = luma;
        }
    }
    FrameSample {
        data,
        width: config.width,
        height: config.height,
        format: config.format,
        timestamp_ns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::session::CaptureSession;
    use crate::config::CaptureConfig;
    use crate::recording::reader::SessionReader;

    #[test]
    fn synthetic_samples_fit_their_channels() {
        let config = SourceConfig {
            width: 6,
            height: 4,
            ..SourceConfig::default()
        };
        for channel in Channel::ALL {
            let sample = synthetic_sample(channel, &config, 3, 1_000);
            assert!(sample.fits(channel));
            assert_eq!(sample.timestamp_ns(), 1_000);
        }
        let Sample::Frame(frame) = synthetic_sample(Channel::Frame, &config, 0, 0) else {
            panic!("expected a frame");
        };
        assert_eq!(frame.data.len(), PixelFormat::Nv21.frame_len(6, 4));
    }

    #[test]
    fn zero_rate_disables_a_channel() {
        assert!(SourceConfig::period(0.0).is_none());
        assert!(SourceConfig::period(f64::NAN).is_none());
        assert_eq!(SourceConfig::period(100.0), Some(Duration::from_millis(10)));
    }

    #[test]
    fn producers_feed_a_running_session() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("s");
        let session = Arc::new(
            CaptureSession::new(CaptureConfig {
                inertial_capacity: 8,
                ..CaptureConfig::default()
            })
            .unwrap(),
        );
        session.start(&dir).unwrap();

        let source = SourceConfig {
            gyro_hz: 500.0,
            acce_hz: 500.0,
            fps: 50.0,
            width: 16,
            height: 8,
            format: PixelFormat::Nv21,
        };
        let mut producers = Producers::spawn(&session, &source, Instant::now()).unwrap();
        thread::sleep(Duration::from_millis(200));
        producers.shutdown();
        session.stop();
        session.drain();

        let reader = SessionReader::open(&dir).unwrap();
        let gyro = reader.read_inertial(Channel::Gyro).unwrap();
        assert!(!gyro.is_empty());
        assert!(gyro.windows(2).all(|w| w[0].timestamp_ns <= w[1].timestamp_ns));
        assert!(reader.frame_count() > 0);
        assert_eq!(session.writer_stats().failed, 0);
    }
}
