//! Defines the persisted [`ChannelRecord`] and the [`ChannelStore`] that
//! loads, replaces and discards it.

use std::{
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use crate::{error::RelayerError, identity::RelayerIdentity};

/// The IBC transfer channel between the child chain (source) and the hub
/// (destination).
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[allow(clippy::module_name_repetitions)]
pub struct ChannelRecord {
    /// The channel ID on the child chain.
    pub src_channel: String,
    /// The channel ID on the hub.
    pub dst_channel: String,
    /// Whether the handshake that produced the channel completed.
    pub ready: bool,
}

impl ChannelRecord {
    /// Builds the record of a completed handshake.
    ///
    /// # Errors
    /// Returns [`RelayerError::HandshakeFailure`] if either channel ID is empty.
    pub fn established(
        src_channel: impl Into<String>,
        dst_channel: impl Into<String>,
    ) -> Result<Self, RelayerError> {
        let record = Self {
            src_channel: src_channel.into(),
            dst_channel: dst_channel.into(),
            ready: true,
        };
        if !record.is_ready() {
            return Err(RelayerError::HandshakeFailure(format!(
                "handshake returned incomplete channel ids (src: '{}', dst: '{}')",
                record.src_channel, record.dst_channel
            )));
        }
        Ok(record)
    }

    /// A channel is ready only when the flag is set and both IDs are present.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready && !self.src_channel.is_empty() && !self.dst_channel.is_empty()
    }
}

/// File-backed storage for the channel record of one relayer identity.
#[derive(Clone, Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct ChannelStore {
    path: PathBuf,
}

impl ChannelStore {
    /// Create a store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create the store owned by `identity`.
    #[must_use]
    pub fn for_identity(identity: &RelayerIdentity) -> Self {
        Self::new(identity.channel_record_path())
    }

    /// The path of the record file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted record, or `None` if none has been written yet.
    ///
    /// # Errors
    /// Returns [`RelayerError::StateCorruption`] if the file cannot be parsed,
    /// and [`RelayerError::Io`] if it cannot be read.
    pub fn load(&self) -> Result<Option<ChannelRecord>, RelayerError> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RelayerError::io(&self.path, e)),
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|e| RelayerError::StateCorruption {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    /// Replaces the persisted record. The new content becomes visible
    /// atomically: readers see either the old record or the new one.
    ///
    /// # Errors
    /// Returns [`RelayerError::Io`] if the record cannot be written.
    #[instrument(skip_all, fields(path = %self.path.display()), err(Display))]
    pub fn save(&self, record: &ChannelRecord) -> Result<(), RelayerError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| RelayerError::io(dir, e))?;

        let mut file = NamedTempFile::new_in(dir).map_err(|e| RelayerError::io(dir, e))?;
        let content = serde_json::to_vec_pretty(record)
            .map_err(|e| RelayerError::io(&self.path, e.into()))?;
        file.write_all(&content)
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| RelayerError::io(file.path(), e))?;
        file.persist(&self.path)
            .map_err(|e| RelayerError::io(&self.path, e.error))?;

        debug!(src = %record.src_channel, dst = %record.dst_channel, "Persisted channel record");
        Ok(())
    }

    /// Removes the persisted record, if any.
    ///
    /// # Errors
    /// Returns [`RelayerError::Io`] if an existing record cannot be removed.
    pub fn discard(&self) -> Result<(), RelayerError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Discarded channel record");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RelayerError::io(&self.path, e)),
        }
    }
}

/// Reads the persisted channel state of a relayer identity.
pub struct ChannelInspector<'a> {
    store: &'a ChannelStore,
}

impl<'a> ChannelInspector<'a> {
    /// Create a new `ChannelInspector`.
    #[must_use]
    pub const fn new(store: &'a ChannelStore) -> Self {
        Self { store }
    }

    /// Returns the persisted record if it describes a ready channel.
    ///
    /// A missing record, or one with a missing channel ID, is not ready.
    ///
    /// # Errors
    /// Returns [`RelayerError::StateCorruption`] for an unreadable record.
    pub fn ready_channel(&self) -> Result<Option<ChannelRecord>, RelayerError> {
        Ok(self.store.load()?.filter(ChannelRecord::is_ready))
    }
}
