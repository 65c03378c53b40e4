// SPDX-License-Identifier: MIT
use crate::error::{CaptureError, Result};
use crate::sample::Channel;

/// Per-channel sequence counter. Indices start at 0 and are strictly
/// increasing until `reset`; the largest index has `width` decimal digits.
#[derive(Debug)]
pub struct SequenceNamer {
    channel: Channel,
    width: u32,
    next: u64,
}

impl SequenceNamer {
    /// `width` is clamped to `1..=19` so that `10^width` fits in a `u64`.
    #[must_use]
    pub fn new(channel: Channel, width: u32) -> Self {
        Self {
            channel,
            width: width.clamp(1, 19),
            next: 0,
        }
    }

    /// Issues the next unused index.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::SequenceExhausted`] once every `width`-digit
    /// index has been issued.
    pub fn next(&mut self) -> Result<u64> {
        if self.is_exhausted() {
            return Err(CaptureError::SequenceExhausted {
                channel: self.channel,
                width: self.width,
            });
        }
        let index = self.next;
        self.next += 1;
        Ok(index)
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.next >= self.limit()
    }

    /// Number of indices issued since the last reset.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.next
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }

    fn limit(&self) -> u64 {
        10u64.pow(self.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero_and_strictly_increases() {
        let mut namer = SequenceNamer::new(Channel::Gyro, 10);
        let issued: Vec<u64> = (0..100).map(|_| namer.next().unwrap()).collect();
        assert_eq!(issued[0], 0);
        assert!(issued.windows(2).all(|w| w[1] == w[0] + 1));
        assert_eq!(namer.issued(), 100);
    }

    #[test]
    fn reset_restarts_at_zero() {
        let mut namer = SequenceNamer::new(Channel::Acce, 10);
        namer.next().unwrap();
        namer.next().unwrap();
        namer.reset();
        assert_eq!(namer.next().unwrap(), 0);
    }

    #[test]
    fn exhausts_at_width_boundary() {
        let mut namer = SequenceNamer::new(Channel::Frame, 1);
        for expected in 0..10 {
            assert_eq!(namer.next().unwrap(), expected);
        }
        assert!(namer.is_exhausted());
        assert!(matches!(
            namer.next(),
            Err(CaptureError::SequenceExhausted {
                channel: Channel::Frame,
                width: 1
            })
        ));
        // Stays exhausted, never wraps.
        assert!(namer.next().is_err());
        assert_eq!(namer.issued(), 10);
    }

    #[test]
    fn width_is_clamped() {
        assert_eq!(SequenceNamer::new(Channel::Gyro, 0).width(), 1);
        assert_eq!(SequenceNamer::new(Channel::Gyro, 40).width(), 19);
        assert!(!SequenceNamer::new(Channel::Gyro, 19).is_exhausted());
    }
}
