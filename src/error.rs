// SPDX-License-Identifier: MIT
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::sample::Channel;

#[derive(Error, Debug)]
pub enum CaptureError {
    /// Append after seal. The session replaces sealed buffers before the next
    /// append, so seeing this means the handoff discipline was broken.
    #[error("append to sealed {channel} buffer")]
    BufferSealed { channel: Channel },
    #[error("storage unavailable at {}: {source}", path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize {channel} sequence {index}: {reason}")]
    Serialization {
        channel: Channel,
        index: u64,
        reason: String,
    },
    #[error("{kind} sample cannot be recorded on the {channel} channel")]
    ChannelMismatch { channel: Channel, kind: &'static str },
    #[error("{channel} sequence index exhausted ({width} digits)")]
    SequenceExhausted { channel: Channel, width: u32 },
    #[error("failed to spawn writer worker: {0}")]
    WorkerSpawn(#[source] io::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CaptureError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CaptureError::StorageUnavailable {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
