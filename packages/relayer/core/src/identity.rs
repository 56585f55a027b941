//! Defines the [`RelayerIdentity`] that scopes all persisted relayer state.

use std::path::{Path, PathBuf};

/// Directory under the home directory that holds the toolchain home and all
/// state owned by the relayer.
const RELAYER_DIR: &str = "relayer";
/// Directory under the relayer directory that holds the per-job log files.
const LOGS_DIR: &str = "logs";
/// File name of the relayer status line.
const STATUS_FILE: &str = "status.txt";

/// The identity of a relayer: which home directory it lives in and which
/// pair of chains it connects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayerIdentity {
    home: PathBuf,
    child_chain_id: String,
    hub_chain_id: String,
}

impl RelayerIdentity {
    /// Create a new relayer identity.
    #[must_use]
    pub fn new(
        home: impl Into<PathBuf>,
        child_chain_id: impl Into<String>,
        hub_chain_id: impl Into<String>,
    ) -> Self {
        Self {
            home: home.into(),
            child_chain_id: child_chain_id.into(),
            hub_chain_id: hub_chain_id.into(),
        }
    }

    /// The home directory of the relayer.
    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// The chain ID of the child chain.
    #[must_use]
    pub fn child_chain_id(&self) -> &str {
        &self.child_chain_id
    }

    /// The chain ID of the hub chain.
    #[must_use]
    pub fn hub_chain_id(&self) -> &str {
        &self.hub_chain_id
    }

    /// The home directory handed to the `rly` toolchain.
    #[must_use]
    pub fn relayer_home(&self) -> PathBuf {
        self.home.join(RELAYER_DIR)
    }

    /// Path of the persisted channel record for this chain pair.
    #[must_use]
    pub fn channel_record_path(&self) -> PathBuf {
        self.relayer_home().join(format!(
            "channel_{}_{}.json",
            self.child_chain_id, self.hub_chain_id
        ))
    }

    /// Path of the human-readable status file.
    #[must_use]
    pub fn status_path(&self) -> PathBuf {
        self.relayer_home().join(STATUS_FILE)
    }

    /// Directory holding one log file per recurring job.
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.relayer_home().join(LOGS_DIR)
    }
}
