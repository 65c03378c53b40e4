// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::format::{self, FRAME_DIR, SESSION_META, SessionMetadata};
use crate::config::InertialFormat;
use crate::sample::{Channel, InertialSample};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceFile {
    pub index: u64,
    pub path: PathBuf,
}

/// Read-only view of a finished session directory.
pub struct SessionReader {
    dir: PathBuf,
    metadata: Option<SessionMetadata>,
    files: HashMap<Channel, Vec<SequenceFile>>,
}

impl SessionReader {
    /// Scans `dir` for sequence files and loads `session.meta` if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed or the metadata
    /// file is corrupted.
    pub fn open(dir: &Path) -> Result<Self> {
        let mut files: HashMap<Channel, Vec<SequenceFile>> = HashMap::new();

        for entry in fs::read_dir(dir)
            .with_context(|| format!("failed to list session directory: {}", dir.display()))?
        {
            let entry = entry.context("failed to read directory entry")?;
            let name = entry.file_name();
            if let Some((channel, index, _)) =
                format::parse_inertial_file_name(&name.to_string_lossy())
            {
                files.entry(channel).or_default().push(SequenceFile {
                    index,
                    path: entry.path(),
                });
            }
        }

        let frame_dir = dir.join(FRAME_DIR);
        if frame_dir.is_dir() {
            for entry in fs::read_dir(&frame_dir)
                .with_context(|| format!("failed to list {}", frame_dir.display()))?
            {
                let entry = entry.context("failed to read directory entry")?;
                let name = entry.file_name();
                if let Some(index) = format::parse_frame_file_name(&name.to_string_lossy()) {
                    files.entry(Channel::Frame).or_default().push(SequenceFile {
                        index,
                        path: entry.path(),
                    });
                }
            }
        }

        for list in files.values_mut() {
            list.sort_unstable_by_key(|f| f.index);
        }

        let meta_path = dir.join(SESSION_META);
        let metadata = if meta_path.is_file() {
            let file = File::open(&meta_path)
                .with_context(|| format!("failed to open {}", meta_path.display()))?;
            Some(format::decode_session_metadata(BufReader::new(file))?)
        } else {
            None
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            metadata,
            files,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn metadata(&self) -> Option<&SessionMetadata> {
        self.metadata.as_ref()
    }

    /// Sequence files of `channel` in index order.
    #[must_use]
    pub fn sequence_files(&self, channel: Channel) -> &[SequenceFile] {
        self.files.get(&channel).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.sequence_files(Channel::Frame).len()
    }

    /// All samples of an inertial channel, concatenated in index order.
    ///
    /// # Errors
    ///
    /// Returns an error if any sequence file cannot be read or parsed.
    pub fn read_inertial(&self, channel: Channel) -> Result<Vec<InertialSample>> {
        let mut samples = Vec::new();
        for file in self.sequence_files(channel) {
            samples.extend(read_inertial_file(&file.path)?);
        }
        Ok(samples)
    }
}

/// Reads one inertial sequence file, text or binary by extension.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, has an unknown extension,
/// or holds a malformed row.
pub fn read_inertial_file(path: &Path) -> Result<Vec<InertialSample>> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (_, _, inertial_format) = format::parse_inertial_file_name(&name)
        .with_context(|| format!("not an inertial sequence file: {}", path.display()))?;

    let file = File::open(path)
        .with_context(|| format!("failed to open sequence file: {}", path.display()))?;
    let reader = BufReader::new(file);

    match inertial_format {
        InertialFormat::Text => {
            let mut samples = Vec::new();
            for (n, line) in reader.lines().enumerate() {
                let line =
                    line.with_context(|| format!("failed to read {}", path.display()))?;
                if line.trim().is_empty() {
                    continue;
                }
                let sample = format::parse_text_row(&line)
                    .with_context(|| format!("{}:{}", path.display(), n + 1))?;
                samples.push(sample);
            }
            Ok(samples)
        }
        InertialFormat::Binary => {
            let (_, samples) = format::decode_binary(reader)
                .with_context(|| format!("failed to decode {}", path.display()))?;
            Ok(samples)
        }
    }
}
