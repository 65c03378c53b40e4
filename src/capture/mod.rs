// SPDX-License-Identifier: MIT
pub mod buffer;
pub mod namer;
pub mod rate;
pub mod session;

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use crate::capture::session::{CaptureSession, Ingest, StartOutcome, StopOutcome};
    use crate::config::CaptureConfig;
    use crate::error::{CaptureError, Result};
    use crate::recording::format::{FRAME_DIR, SESSION_META};
    use crate::recording::reader::{SessionReader, read_inertial_file};
    use crate::recording::writer::{DiskSink, SealedSequence, SequenceSink};
    use crate::sample::{Channel, FrameSample, InertialSample, PixelFormat, Reading, Sample};

    fn config(capacity: usize) -> CaptureConfig {
        CaptureConfig {
            inertial_capacity: capacity,
            record_frames: false,
            ..CaptureConfig::default()
        }
    }

    fn imu(timestamp_ns: i64) -> Sample {
        #[allow(clippy::cast_precision_loss)]
        let v = timestamp_ns as f32 / 100.0;
        Sample::Inertial(InertialSample::new(timestamp_ns, v, -v, 0.5))
    }

    fn frame(timestamp_ns: i64) -> Sample {
        let (width, height) = (8, 4);
        Sample::Frame(FrameSample {
            data: vec![100; PixelFormat::Nv21.frame_len(width, height)],
            width,
            height,
            format: PixelFormat::Nv21,
            timestamp_ns,
        })
    }

    fn timestamps(path: &Path) -> Vec<i64> {
        read_inertial_file(path)
            .unwrap()
            .iter()
            .map(|s| s.timestamp_ns)
            .collect()
    }

    #[test]
    fn capacity_three_five_samples_gives_two_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("session");
        let session = CaptureSession::new(config(3)).unwrap();

        assert_eq!(
            session.start(&dir).unwrap(),
            StartOutcome::Started(dir.clone())
        );

        let outcomes: Vec<Ingest> = [100, 200, 300, 400, 500]
            .into_iter()
            .map(|ts| session.ingest(Channel::Gyro, imu(ts)))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                Ingest::Buffered,
                Ingest::Buffered,
                Ingest::Sealed { index: 0 },
                Ingest::Buffered,
                Ingest::Buffered,
            ]
        );
        assert_eq!(session.buffered(Channel::Gyro), 2);

        let StopOutcome::Stopped { dir: stopped, .. } = session.stop() else {
            panic!("session should have been capturing");
        };
        assert_eq!(stopped, dir);
        session.drain();

        assert_eq!(timestamps(&dir.join("gyro_0000000000.txt")), vec![100, 200, 300]);
        assert_eq!(timestamps(&dir.join("gyro_0000000001.txt")), vec![400, 500]);
        assert!(!dir.join("gyro_0000000002.txt").exists());
        assert!(dir.join(SESSION_META).is_file());

        let stats = session.writer_stats();
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.pending, 0);
    }

    #[test]
    fn every_ingested_sample_is_persisted_once_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("s");
        let session = CaptureSession::new(config(7)).unwrap();
        session.start(&dir).unwrap();

        for ts in 0..100 {
            session.ingest(Channel::Acce, imu(ts));
            session.ingest(Channel::Gyro, imu(1_000 + ts));
        }
        session.stop();
        session.drain();

        let reader = SessionReader::open(&dir).unwrap();
        // 100 = 14 * 7 + 2: 14 full sequences plus the partial trailer.
        assert_eq!(reader.sequence_files(Channel::Acce).len(), 15);
        let acce: Vec<i64> = reader
            .read_inertial(Channel::Acce)
            .unwrap()
            .iter()
            .map(|s| s.timestamp_ns)
            .collect();
        assert_eq!(acce, (0..100).collect::<Vec<_>>());

        let gyro = reader.read_inertial(Channel::Gyro).unwrap();
        assert_eq!(gyro.len(), 100);
        assert_eq!(gyro[0].timestamp_ns, 1_000);
        assert_eq!(gyro[99].timestamp_ns, 1_099);
    }

    #[test]
    fn stop_after_exact_multiple_writes_empty_trailer() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("s");
        let session = CaptureSession::new(config(2)).unwrap();
        session.start(&dir).unwrap();
        for ts in 1..=4 {
            session.ingest(Channel::Gyro, imu(ts));
        }
        let StopOutcome::Stopped { sequences, .. } = session.stop() else {
            panic!("expected stop");
        };
        session.drain();

        // gyro: 0, 1 full, 2 empty trailer; acce: 0 empty trailer.
        assert_eq!(sequences, 4);
        assert!(timestamps(&dir.join("gyro_0000000002.txt")).is_empty());
        assert!(timestamps(&dir.join("acce_0000000000.txt")).is_empty());
    }

    #[test]
    fn idle_session_observes_without_recording() {
        let session = CaptureSession::new(config(3)).unwrap();
        assert_eq!(session.ingest(Channel::Gyro, imu(5)), Ingest::Observed);
        assert_eq!(
            session.latest(Channel::Gyro),
            Some(Reading::Inertial(InertialSample::new(5, 0.05, -0.05, 0.5)))
        );
        assert_eq!(session.buffered(Channel::Gyro), 0);
        assert_eq!(session.writer_stats().dispatched, 0);
    }

    #[test]
    fn redundant_transitions_are_benign() {
        let tmp = tempfile::tempdir().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        let session = CaptureSession::new(config(3)).unwrap();

        assert_eq!(session.stop(), StopOutcome::AlreadyIdle);
        session.start(&first).unwrap();
        assert_eq!(
            session.start(&second).unwrap(),
            StartOutcome::AlreadyCapturing(first.clone())
        );
        assert!(!second.exists());
        assert_eq!(session.session_dir(), Some(first.clone()));
        assert!(matches!(session.stop(), StopOutcome::Stopped { .. }));
        assert_eq!(session.stop(), StopOutcome::AlreadyIdle);
        assert_eq!(session.session_dir(), None);
    }

    #[test]
    fn restart_resets_sequence_numbering() {
        let tmp = tempfile::tempdir().unwrap();
        let session = CaptureSession::new(config(1)).unwrap();

        session.start(&tmp.path().join("a")).unwrap();
        assert_eq!(session.ingest(Channel::Gyro, imu(1)), Ingest::Sealed { index: 0 });
        assert_eq!(session.ingest(Channel::Gyro, imu(2)), Ingest::Sealed { index: 1 });
        session.stop();

        session.start(&tmp.path().join("b")).unwrap();
        assert_eq!(session.sequences(Channel::Gyro), 0);
        assert_eq!(session.ingest(Channel::Gyro, imu(3)), Ingest::Sealed { index: 0 });
        session.stop();
        session.drain();

        assert_eq!(timestamps(&tmp.path().join("b/gyro_0000000000.txt")), vec![3]);
    }

    #[test]
    fn start_fails_when_storage_cannot_be_created() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let session = CaptureSession::new(config(3)).unwrap();

        let err = session.start(&blocker.join("session")).unwrap_err();
        assert!(matches!(err, CaptureError::StorageUnavailable { .. }));
        assert!(!session.is_capturing());
        assert_eq!(session.ingest(Channel::Gyro, imu(1)), Ingest::Observed);
    }

    #[test]
    fn mismatched_sample_is_rejected_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let session = CaptureSession::new(config(3)).unwrap();
        session.start(tmp.path()).unwrap();

        assert_eq!(session.ingest(Channel::Gyro, frame(1)), Ingest::Rejected);
        assert_eq!(session.ingest(Channel::Frame, imu(1)), Ingest::Rejected);
        assert_eq!(session.rejected(), 2);
        assert_eq!(session.ingest(Channel::Gyro, imu(2)), Ingest::Buffered);
    }

    #[test]
    fn frames_are_sealed_on_arrival() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("s");
        let session = CaptureSession::new(CaptureConfig::default()).unwrap();
        session.start(&dir).unwrap();

        assert_eq!(session.ingest(Channel::Frame, frame(10)), Ingest::Sealed { index: 0 });
        assert_eq!(session.ingest(Channel::Frame, frame(20)), Ingest::Sealed { index: 1 });
        session.stop();
        session.drain();

        let frame_dir = dir.join(FRAME_DIR);
        assert!(frame_dir.join("0000000000000.jpg").is_file());
        assert!(frame_dir.join("0000000000001.jpg").is_file());
        // No empty trailer for frames.
        assert!(!frame_dir.join("0000000000002.jpg").exists());
        assert_eq!(SessionReader::open(&dir).unwrap().frame_count(), 2);
    }

    #[test]
    fn frames_are_only_observed_when_not_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let session = CaptureSession::new(config(3)).unwrap();
        session.start(tmp.path()).unwrap();
        assert_eq!(session.ingest(Channel::Frame, frame(1)), Ingest::Observed);
        assert!(!tmp.path().join(FRAME_DIR).exists());
        assert_eq!(
            session.latest(Channel::Frame),
            Some(Reading::Frame {
                width: 8,
                height: 4,
                timestamp_ns: 1
            })
        );
    }

    #[test]
    fn exhausted_channel_rejects_further_samples() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("s");
        let session = CaptureSession::new(CaptureConfig {
            inertial_capacity: 1,
            index_width: 1,
            record_frames: false,
            ..CaptureConfig::default()
        })
        .unwrap();
        session.start(&dir).unwrap();

        for ts in 0..10 {
            assert_eq!(
                session.ingest(Channel::Gyro, imu(ts)),
                Ingest::Sealed {
                    index: u64::try_from(ts).unwrap()
                }
            );
        }
        assert_eq!(session.ingest(Channel::Gyro, imu(10)), Ingest::Rejected);
        session.stop();
        session.drain();

        let reader = SessionReader::open(&dir).unwrap();
        assert_eq!(reader.sequence_files(Channel::Gyro).len(), 10);
        assert_eq!(reader.read_inertial(Channel::Gyro).unwrap().len(), 10);
    }

    #[test]
    fn rate_is_published_per_channel() {
        let session = CaptureSession::new(config(3)).unwrap();
        for i in 0..=5 {
            session.observe(Channel::Frame, &frame(i * 33_333_333));
        }
        assert!((session.rate(Channel::Frame) - 30.0).abs() < 0.01);
        assert!(session.rate(Channel::Gyro).abs() < f64::EPSILON);
    }

    #[test]
    fn concurrent_producers_lose_nothing_across_stop() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("s");
        let session = Arc::new(CaptureSession::new(config(16)).unwrap());
        session.start(&dir).unwrap();

        let producers: Vec<_> = Channel::INERTIAL
            .into_iter()
            .map(|channel| {
                let session = Arc::clone(&session);
                thread::spawn(move || {
                    let mut recorded = Vec::new();
                    for ts in 0..2_000 {
                        match session.ingest(channel, imu(ts)) {
                            Ingest::Buffered | Ingest::Sealed { .. } => recorded.push(ts),
                            Ingest::Observed => {}
                            Ingest::Rejected => panic!("unexpected rejection"),
                        }
                    }
                    (channel, recorded)
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(1));
        session.stop();
        let results: Vec<_> = producers.into_iter().map(|h| h.join().unwrap()).collect();
        session.drain();

        let reader = SessionReader::open(&dir).unwrap();
        for (channel, recorded) in results {
            let persisted: Vec<i64> = reader
                .read_inertial(channel)
                .unwrap()
                .iter()
                .map(|s| s.timestamp_ns)
                .collect();
            assert_eq!(persisted, recorded, "{channel}");
        }
    }

    /// Delays chosen indices and remembers completion order.
    struct DelayedSink {
        inner: DiskSink,
        delays: HashMap<u64, Duration>,
        completed: Mutex<Vec<u64>>,
    }

    impl SequenceSink for DelayedSink {
        fn persist(&self, dir: &Path, sequence: &SealedSequence) -> Result<PathBuf> {
            if let Some(delay) = self.delays.get(&sequence.index) {
                thread::sleep(*delay);
            }
            let path = self.inner.persist(dir, sequence)?;
            self.completed.lock().unwrap().push(sequence.index);
            Ok(path)
        }
    }

    #[test]
    fn reverse_completion_keeps_indices_and_contents_aligned() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("s");
        let cfg = CaptureConfig {
            writer_threads: 2,
            ..config(2)
        };
        let sink = Arc::new(DelayedSink {
            inner: DiskSink::new(&cfg),
            delays: HashMap::from([(0, Duration::from_millis(300))]),
            completed: Mutex::new(Vec::new()),
        });
        let session = CaptureSession::with_sink(cfg, Arc::clone(&sink) as Arc<dyn SequenceSink>)
            .unwrap();
        session.start(&dir).unwrap();

        for ts in [1, 2, 3, 4] {
            session.ingest(Channel::Gyro, imu(ts));
        }
        session.drain();

        assert_eq!(*sink.completed.lock().unwrap(), vec![1, 0]);
        assert_eq!(timestamps(&dir.join("gyro_0000000000.txt")), vec![1, 2]);
        assert_eq!(timestamps(&dir.join("gyro_0000000001.txt")), vec![3, 4]);
        session.stop();
    }

    /// Fails one index, succeeds otherwise.
    struct FlakySink {
        inner: DiskSink,
        fail_index: u64,
    }

    impl SequenceSink for FlakySink {
        fn persist(&self, dir: &Path, sequence: &SealedSequence) -> Result<PathBuf> {
            if sequence.index == self.fail_index {
                return Err(CaptureError::StorageUnavailable {
                    path: dir.to_path_buf(),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.inner.persist(dir, sequence)
        }
    }

    #[test]
    fn failed_flush_is_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("s");
        let cfg = config(1);
        let sink = Arc::new(FlakySink {
            inner: DiskSink::new(&cfg),
            fail_index: 1,
        });
        let session = CaptureSession::with_sink(cfg, sink).unwrap();
        session.start(&dir).unwrap();

        for ts in 0..4 {
            assert_eq!(
                session.ingest(Channel::Gyro, imu(ts)),
                Ingest::Sealed {
                    index: u64::try_from(ts).unwrap()
                }
            );
        }
        session.drain();

        let stats = session.writer_stats();
        assert_eq!(stats.dispatched, 4);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.failed, 1);
        assert!(stats.last_error.unwrap().contains("disk full"));
        assert!(dir.join("gyro_0000000000.txt").is_file());
        assert!(!dir.join("gyro_0000000001.txt").exists());
        assert!(dir.join("gyro_0000000003.txt").is_file());
        assert!(session.is_capturing());
        session.stop();
    }
}
