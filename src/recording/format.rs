// SPDX-License-Identifier: MIT
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use crate::config::{CaptureConfig, InertialFormat};
use crate::sample::{Channel, InertialSample};

pub const MAGIC: [u8; 4] = *b"CIMU";
pub const SESSION_MAGIC: [u8; 4] = *b"CIMS";
pub const FORMAT_VERSION: u8 = 1;
pub const EOF_MARKER: [u8; 4] = *b"CEOF";

pub const TEXT_EXT: &str = "txt";
pub const BINARY_EXT: &str = "imu";
pub const FRAME_EXT: &str = "jpg";
pub const FRAME_DIR: &str = "IMG";
pub const SESSION_META: &str = "session.meta";

const ZSTD_LEVEL: i32 = 3;
pub const MAX_BLOCK_LEN: usize = 64 * 1024 * 1024;
/// Largest postcard encoding of one `InertialSample`: a 10-byte varint
/// timestamp and three `f32`s.
const MAX_ROW_LEN: usize = 22;
/// Rows that always fit in one block, leaving room for the length varint.
pub const MAX_BINARY_ROWS: usize = (MAX_BLOCK_LEN - 10) / MAX_ROW_LEN;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FileHeader {
    pub magic: [u8; 4],
    pub format_version: u8,
    pub channel: Channel,
    pub sequence_index: u64,
    pub sample_count: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionMetadata {
    pub magic: [u8; 4],
    pub format_version: u8,
    pub config: CaptureConfig,
    pub started_at: SystemTime,
}

impl SessionMetadata {
    #[must_use]
    pub fn new(config: CaptureConfig, started_at: SystemTime) -> Self {
        Self {
            magic: SESSION_MAGIC,
            format_version: FORMAT_VERSION,
            config,
            started_at,
        }
    }
}

/// Path of a sequence file relative to the session directory:
/// `gyro_0000000003.txt`, `acce_0000000003.imu` or `IMG/0000000000003.jpg`.
#[must_use]
pub fn sequence_file_name(
    channel: Channel,
    index: u64,
    width: u32,
    format: InertialFormat,
) -> PathBuf {
    let width = width as usize;
    if channel.is_inertial() {
        let ext = match format {
            InertialFormat::Text => TEXT_EXT,
            InertialFormat::Binary => BINARY_EXT,
        };
        PathBuf::from(format!("{}_{index:0width$}.{ext}", channel.tag()))
    } else {
        Path::new(FRAME_DIR).join(format!("{index:0width$}.{FRAME_EXT}"))
    }
}

/// Inverse of [`sequence_file_name`] for inertial files: the channel and
/// index encoded in a bare file name.
#[must_use]
pub fn parse_inertial_file_name(name: &str) -> Option<(Channel, u64, InertialFormat)> {
    let (stem, ext) = name.rsplit_once('.')?;
    let format = match ext {
        TEXT_EXT => InertialFormat::Text,
        BINARY_EXT => InertialFormat::Binary,
        _ => return None,
    };
    let (tag, digits) = stem.split_once('_')?;
    let channel = Channel::INERTIAL.into_iter().find(|c| c.tag() == tag)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((channel, digits.parse().ok()?, format))
}

#[must_use]
pub fn parse_frame_file_name(name: &str) -> Option<u64> {
    let digits = name.strip_suffix(".jpg")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

// ---------------------------------------------------------------------------
// Text rows
// ---------------------------------------------------------------------------

/// Writes one `<timestamp> <x> <y> <z>` line per sample, six decimals.
///
/// # Errors
///
/// Propagates write errors from `out`.
pub fn write_text_rows(out: &mut impl Write, samples: &[InertialSample]) -> io::Result<()> {
    for s in samples {
        writeln!(out, "{} {:.6} {:.6} {:.6}", s.timestamp_ns, s.x, s.y, s.z)?;
    }
    Ok(())
}

/// Parses one text row.
///
/// # Errors
///
/// Returns an error if the row does not hold a timestamp and three floats.
pub fn parse_text_row(line: &str) -> anyhow::Result<InertialSample> {
    let mut fields = line.split_whitespace();
    let mut next = |name: &str| {
        fields
            .next()
            .with_context(|| format!("missing {name} field"))
    };

    let timestamp_ns = next("timestamp")?
        .parse::<i64>()
        .context("invalid timestamp")?;
    let x = next("x")?.parse::<f32>().context("invalid x")?;
    let y = next("y")?.parse::<f32>().context("invalid y")?;
    let z = next("z")?.parse::<f32>().context("invalid z")?;

    if fields.next().is_some() {
        bail!("trailing fields after z");
    }
    Ok(InertialSample::new(timestamp_ns, x, y, z))
}

// ---------------------------------------------------------------------------
// Binary rows
// ---------------------------------------------------------------------------

/// Encodes a sealed inertial sequence as a zstd stream holding a
/// length-prefixed header, a length-prefixed row block and the EOF marker.
///
/// # Errors
///
/// Returns an error if postcard serialization or compression fails.
pub fn encode_binary(
    channel: Channel,
    sequence_index: u64,
    samples: &[InertialSample],
) -> anyhow::Result<Vec<u8>> {
    let mut encoder =
        zstd::Encoder::new(Vec::new(), ZSTD_LEVEL).context("failed to create zstd encoder")?;

    let header = FileHeader {
        magic: MAGIC,
        format_version: FORMAT_VERSION,
        channel,
        sequence_index,
        sample_count: samples.len() as u64,
    };
    let header = postcard::to_stdvec(&header).context("failed to serialize file header")?;
    write_block(&mut encoder, &header).context("failed to write header")?;

    let rows = postcard::to_stdvec(samples).context("failed to serialize rows")?;
    write_block(&mut encoder, &rows).context("failed to write rows")?;

    encoder
        .write_all(&EOF_MARKER)
        .context("failed to write EOF marker")?;
    encoder.finish().context("failed to finish zstd encoder")
}

/// Decodes a stream written by [`encode_binary`].
///
/// # Errors
///
/// Returns an error on a bad magic, an unsupported version, a row count
/// that disagrees with the header, or corrupted data.
pub fn decode_binary(reader: impl Read) -> anyhow::Result<(FileHeader, Vec<InertialSample>)> {
    let mut decoder = zstd::Decoder::new(reader).context("failed to create zstd decoder")?;

    let header: FileHeader = postcard::from_bytes(
        &read_block(&mut decoder).context("failed to read header")?,
    )
    .context("failed to deserialize file header")?;

    if header.magic != MAGIC {
        bail!("invalid magic bytes in sequence file");
    }
    if header.format_version != FORMAT_VERSION {
        bail!(
            "unsupported format version {} (expected {FORMAT_VERSION})",
            header.format_version
        );
    }

    let samples: Vec<InertialSample> =
        postcard::from_bytes(&read_block(&mut decoder).context("failed to read rows")?)
            .context("failed to deserialize rows")?;
    if samples.len() as u64 != header.sample_count {
        bail!(
            "header announces {} samples but {} were decoded",
            header.sample_count,
            samples.len()
        );
    }

    let mut marker = [0u8; 4];
    decoder
        .read_exact(&mut marker)
        .context("missing EOF marker")?;
    if marker != EOF_MARKER {
        bail!("invalid EOF marker");
    }

    Ok((header, samples))
}

/// Encodes session metadata the same way as a sequence header.
///
/// # Errors
///
/// Returns an error if serialization or compression fails.
pub fn encode_session_metadata(meta: &SessionMetadata) -> anyhow::Result<Vec<u8>> {
    let mut encoder =
        zstd::Encoder::new(Vec::new(), ZSTD_LEVEL).context("failed to create zstd encoder")?;
    let serialized = postcard::to_stdvec(meta).context("failed to serialize session metadata")?;
    write_block(&mut encoder, &serialized).context("failed to write session metadata")?;
    encoder.finish().context("failed to finish zstd encoder")
}

/// # Errors
///
/// Returns an error on corrupted data or a magic/version mismatch.
pub fn decode_session_metadata(reader: impl Read) -> anyhow::Result<SessionMetadata> {
    let mut decoder = zstd::Decoder::new(reader).context("failed to create zstd decoder")?;
    let meta: SessionMetadata = postcard::from_bytes(
        &read_block(&mut decoder).context("failed to read session metadata")?,
    )
    .context("failed to deserialize session metadata")?;

    if meta.magic != SESSION_MAGIC {
        bail!("invalid magic bytes in session metadata");
    }
    if meta.format_version != FORMAT_VERSION {
        bail!(
            "unsupported session format version {} (expected {FORMAT_VERSION})",
            meta.format_version
        );
    }
    Ok(meta)
}

fn write_block(out: &mut impl Write, data: &[u8]) -> anyhow::Result<()> {
    if data.len() > MAX_BLOCK_LEN {
        bail!(
            "block length {} exceeds {MAX_BLOCK_LEN} bytes",
            data.len()
        );
    }
    let len = u32::try_from(data.len()).context("block larger than 4 GiB")?;
    out.write_all(&len.to_le_bytes())
        .context("failed to write block length")?;
    out.write_all(data).context("failed to write block data")?;
    Ok(())
}

fn read_block(reader: &mut impl Read) -> anyhow::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .context("failed to read block length")?;
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_BLOCK_LEN {
        bail!("block length {len} exceeds {MAX_BLOCK_LEN} bytes");
    }

    let mut data = vec![0u8; len];
    reader
        .read_exact(&mut data)
        .context("failed to read block data")?;
    Ok(data)
}
