// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, Result};
use crate::recording::format::MAX_BINARY_ROWS;

pub const DEFAULT_INERTIAL_CAPACITY: usize = 10_000;
pub const DEFAULT_RATE_WINDOW: u32 = 5;
pub const DEFAULT_WRITER_THREADS: usize = 2;
pub const DEFAULT_JPEG_QUALITY: u8 = 95;
pub const DEFAULT_INDEX_WIDTH: u32 = 10;
pub const DEFAULT_FRAME_INDEX_WIDTH: u32 = 13;

/// Widest index that still fits in a `u64` counter.
const MAX_INDEX_WIDTH: u32 = 19;

/// Row encoding for inertial sequence files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InertialFormat {
    /// `<timestamp> <x> <y> <z>` lines in a `.txt` file.
    #[default]
    Text,
    /// postcard rows inside a zstd stream in a `.imu` file.
    Binary,
}

impl std::str::FromStr for InertialFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(InertialFormat::Text),
            "binary" | "bin" | "imu" => Ok(InertialFormat::Binary),
            other => Err(format!("unknown format '{other}' (expected text or binary)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub inertial_capacity: usize,
    pub rate_window: u32,
    pub writer_threads: usize,
    pub inertial_format: InertialFormat,
    pub jpeg_quality: u8,
    pub record_frames: bool,
    pub index_width: u32,
    pub frame_index_width: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            inertial_capacity: DEFAULT_INERTIAL_CAPACITY,
            rate_window: DEFAULT_RATE_WINDOW,
            writer_threads: DEFAULT_WRITER_THREADS,
            inertial_format: InertialFormat::Text,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            record_frames: true,
            index_width: DEFAULT_INDEX_WIDTH,
            frame_index_width: DEFAULT_FRAME_INDEX_WIDTH,
        }
    }
}

impl CaptureConfig {
    /// Checks every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.inertial_capacity == 0 {
            return Err(CaptureError::InvalidConfig(
                "inertial_capacity must be at least 1".into(),
            ));
        }
        if self.inertial_format == InertialFormat::Binary
            && self.inertial_capacity > MAX_BINARY_ROWS
        {
            return Err(CaptureError::InvalidConfig(format!(
                "inertial_capacity {} exceeds {MAX_BINARY_ROWS} rows per binary sequence",
                self.inertial_capacity
            )));
        }
        if self.rate_window == 0 {
            return Err(CaptureError::InvalidConfig(
                "rate_window must be at least 1".into(),
            ));
        }
        if self.writer_threads == 0 {
            return Err(CaptureError::InvalidConfig(
                "writer_threads must be at least 1".into(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(CaptureError::InvalidConfig(format!(
                "jpeg_quality {} outside 1..=100",
                self.jpeg_quality
            )));
        }
        for (name, width) in [
            ("index_width", self.index_width),
            ("frame_index_width", self.frame_index_width),
        ] {
            if !(1..=MAX_INDEX_WIDTH).contains(&width) {
                return Err(CaptureError::InvalidConfig(format!(
                    "{name} {width} outside 1..={MAX_INDEX_WIDTH}"
                )));
            }
        }
        Ok(())
    }
}
