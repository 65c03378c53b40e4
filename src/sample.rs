// SPDX-License-Identifier: MIT
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A data channel recorded by a capture session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Gyro,
    Acce,
    Frame,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Gyro, Channel::Acce, Channel::Frame];
    pub const INERTIAL: [Channel; 2] = [Channel::Gyro, Channel::Acce];

    /// Prefix used for this channel's files inside a session directory.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Channel::Gyro => "gyro",
            Channel::Acce => "acce",
            Channel::Frame => "IMG",
        }
    }

    #[must_use]
    pub fn is_inertial(self) -> bool {
        !matches!(self, Channel::Frame)
    }

    pub(crate) fn slot(self) -> usize {
        match self {
            Channel::Gyro => 0,
            Channel::Acce => 1,
            Channel::Frame => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gyro" => Ok(Channel::Gyro),
            "acce" | "accel" => Ok(Channel::Acce),
            "frame" | "img" => Ok(Channel::Frame),
            other => Err(format!("unknown channel '{other}' (expected gyro, acce or frame)")),
        }
    }
}

/// One gyroscope or accelerometer reading.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InertialSample {
    pub timestamp_ns: i64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl InertialSample {
    #[must_use]
    pub fn new(timestamp_ns: i64, x: f32, y: f32, z: f32) -> Self {
        Self {
            timestamp_ns,
            x,
            y,
            z,
        }
    }
}

/// YUV 4:2:0 semi-planar layouts: a full-size luma plane followed by one
/// interleaved chroma plane at half resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Chroma interleaved as V,U (the camera preview default).
    Nv21,
    /// Chroma interleaved as U,V.
    Nv12,
}

impl PixelFormat {
    #[must_use]
    pub fn frame_len(self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        w * h + w.div_ceil(2) * h.div_ceil(2) * 2
    }
}

/// One raw camera preview frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameSample {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub timestamp_ns: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Sample {
    Inertial(InertialSample),
    Frame(FrameSample),
}

impl Sample {
    #[must_use]
    pub fn timestamp_ns(&self) -> i64 {
        match self {
            Sample::Inertial(s) => s.timestamp_ns,
            Sample::Frame(f) => f.timestamp_ns,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Sample::Inertial(_) => "inertial",
            Sample::Frame(_) => "frame",
        }
    }

    /// Whether this sample may be recorded on `channel`.
    #[must_use]
    pub fn fits(&self, channel: Channel) -> bool {
        matches!(self, Sample::Inertial(_)) == channel.is_inertial()
    }
}

/// What the display shows for a channel: the last values seen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Reading {
    Inertial(InertialSample),
    Frame {
        width: u32,
        height: u32,
        timestamp_ns: i64,
    },
}

impl From<&Sample> for Reading {
    fn from(sample: &Sample) -> Self {
        match sample {
            Sample::Inertial(s) => Reading::Inertial(*s),
            Sample::Frame(f) => Reading::Frame {
                width: f.width,
                height: f.height,
                timestamp_ns: f.timestamp_ns,
            },
        }
    }
}
