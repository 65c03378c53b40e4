// SPDX-License-Identifier: MIT
use crate::error::{CaptureError, Result};
use crate::sample::Channel;

/// Bounded, append-only run of samples for one channel.
///
/// Reaching `capacity` seals the buffer. A sealed buffer rejects further
/// appends and must be replaced by a fresh one.
#[derive(Debug)]
pub struct SampleBuffer<T> {
    channel: Channel,
    capacity: usize,
    samples: Vec<T>,
    sealed: bool,
}

impl<T> SampleBuffer<T> {
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn new(channel: Channel, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            channel,
            capacity,
            samples: Vec::with_capacity(capacity),
            sealed: false,
        }
    }

    /// Appends `sample` and reports whether the buffer is now full (and
    /// therefore sealed).
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::BufferSealed`] if the buffer was already sealed.
    pub fn append(&mut self, sample: T) -> Result<bool> {
        if self.sealed {
            return Err(CaptureError::BufferSealed {
                channel: self.channel,
            });
        }
        self.samples.push(sample);
        if self.samples.len() >= self.capacity {
            self.sealed = true;
        }
        Ok(self.sealed)
    }

    /// Marks the buffer sealed and hands over its contents. Sealing twice is
    /// allowed; the second call yields nothing since the samples have
    /// already moved out.
    pub fn seal(&mut self) -> Vec<T> {
        self.sealed = true;
        std::mem::take(&mut self.samples)
    }

    #[must_use]
    pub fn channel(&self) -> Channel {
        self.channel
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}
