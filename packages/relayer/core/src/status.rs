//! Writes the single-line relayer status read by dashboards and health checks.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::{channel::ChannelRecord, error::RelayerError, identity::RelayerIdentity};

/// Status written once both relayer accounts are funded.
pub const BALANCES_VERIFIED: &str = "Balances verified";
/// Status written while the channel handshake runs.
pub const ESTABLISHING_CHANNEL: &str = "Establishing IBC transfer channel";

/// The status line of a ready channel. Health checks grep for `Active`.
#[must_use]
pub fn active_status(record: &ChannelRecord) -> String {
    format!(
        "Active src, {} <-> {}, dst",
        record.src_channel, record.dst_channel
    )
}

/// Persists the relayer status line.
#[derive(Clone, Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct StatusReporter {
    path: PathBuf,
}

impl StatusReporter {
    /// Create a reporter writing to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create the reporter owned by `identity`.
    #[must_use]
    pub fn for_identity(identity: &RelayerIdentity) -> Self {
        Self::new(identity.status_path())
    }

    /// Replaces the status line.
    ///
    /// # Errors
    /// Returns [`RelayerError::Io`] if the status file cannot be written.
    pub fn write(&self, status: &str) -> Result<(), RelayerError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| RelayerError::io(dir, e))?;

        let mut file = NamedTempFile::new_in(dir).map_err(|e| RelayerError::io(dir, e))?;
        writeln!(file, "{status}").map_err(|e| RelayerError::io(file.path(), e))?;
        file.persist(&self.path)
            .map_err(|e| RelayerError::io(&self.path, e.error))?;

        debug!(%status, "Updated relayer status");
        Ok(())
    }

    /// Reads the current status line, if any has been written.
    ///
    /// # Errors
    /// Returns [`RelayerError::Io`] if an existing status file cannot be read.
    pub fn read(&self) -> Result<Option<String>, RelayerError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content.trim_end().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RelayerError::io(&self.path, e)),
        }
    }
}
