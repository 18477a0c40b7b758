//! Snapshot of the state that must survive a restart.
//!
//! Only the listening channels are persisted. The file is a single JSON
//! object: `{"listeningChannels": ["123", "456"]}`.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bot::event::ChannelId;

/// Errors from reading or writing the snapshot.
#[derive(Debug)]
pub enum PersistError {
    /// The snapshot exists but could not be read.
    Read { path: PathBuf, source: std::io::Error },
    /// The snapshot is not valid JSON of the expected shape.
    Parse { path: PathBuf, source: serde_json::Error },
    /// A listed channel is not a numeric id.
    InvalidChannelId { path: PathBuf, value: String },
    /// The snapshot could not be encoded.
    Encode { path: PathBuf, source: serde_json::Error },
    /// The snapshot could not be written.
    Write { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read snapshot '{}': {}", path.display(), source)
            }
            Self::Parse { path, source } => {
                write!(f, "malformed snapshot '{}': {}", path.display(), source)
            }
            Self::InvalidChannelId { path, value } => {
                write!(f, "malformed snapshot '{}': invalid channel id '{}'", path.display(), value)
            }
            Self::Encode { path, source } => {
                write!(f, "failed to encode snapshot '{}': {}", path.display(), source)
            }
            Self::Write { path, source } => {
                write!(f, "failed to write snapshot '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::InvalidChannelId { .. } => None,
            Self::Encode { source, .. } => Some(source),
            Self::Write { source, .. } => Some(source),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    #[serde(rename = "listeningChannels")]
    listening_channels: Vec<String>,
}

/// The persisted projection of the bot state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSnapshot {
    pub listening_channels: HashSet<ChannelId>,
}

/// Reads and writes the snapshot file.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the snapshot with the given channels.
    pub fn save(&self, listening_channels: &HashSet<ChannelId>) -> Result<(), PersistError> {
        let mut ids: Vec<ChannelId> = listening_channels.iter().copied().collect();
        ids.sort();
        let file = SnapshotFile {
            listening_channels: ids.iter().map(ToString::to_string).collect(),
        };

        let json = serde_json::to_string(&file)
            .map_err(|e| PersistError::Encode { path: self.path.clone(), source: e })?;

        // Write next to the target then rename so a crash never leaves half a file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| PersistError::Write { path: tmp.clone(), source: e })?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| PersistError::Write { path: self.path.clone(), source: e })?;

        info!("💾 Saved snapshot ({} channel(s)) to {:?}", ids.len(), self.path);
        Ok(())
    }

    /// Read the snapshot. `Ok(None)` when no snapshot has been written yet.
    pub fn load(&self) -> Result<Option<PersistedSnapshot>, PersistError> {
        if !self.path.exists() {
            info!("No snapshot at {:?}, starting fresh", self.path);
            return Ok(None);
        }

        let json = std::fs::read_to_string(&self.path)
            .map_err(|e| PersistError::Read { path: self.path.clone(), source: e })?;
        let file: SnapshotFile = serde_json::from_str(&json)
            .map_err(|e| PersistError::Parse { path: self.path.clone(), source: e })?;

        let listening_channels = file
            .listening_channels
            .into_iter()
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map(ChannelId)
                    .map_err(|_| PersistError::InvalidChannelId { path: self.path.clone(), value: raw })
            })
            .collect::<Result<HashSet<_>, _>>()?;

        info!("Loaded snapshot from {:?} ({} channel(s))", self.path, listening_channels.len());
        Ok(Some(PersistedSnapshot { listening_channels }))
    }
}
