//! Defines the [`RelayerError`] taxonomy shared by every relayer component.

use std::path::PathBuf;

use thiserror::Error;

use crate::balance::{describe_insufficient_balances, AccountBalanceCheck};

/// Errors that can occur while starting or running the relayer.
///
/// Every variant except [`RelayerError::JobInvocation`] is fatal during the
/// startup phase.
#[derive(Debug, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum RelayerError {
    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The relayer address for a chain could not be resolved from the local keyring.
    #[error("failed to resolve the relayer address for {chain_id}: {reason}")]
    LookupFailure {
        /// The chain whose relayer key is missing.
        chain_id: String,
        /// The underlying reason.
        reason: String,
    },

    /// A balance query against a remote node failed.
    #[error("failed to query the balance of {address} on {chain_id}: {reason}")]
    QueryFailure {
        /// The queried chain.
        chain_id: String,
        /// The queried address.
        address: String,
        /// The underlying reason.
        reason: String,
    },

    /// One or more relayer accounts hold less than the required balance.
    #[error("{}", describe_insufficient_balances(.0))]
    InsufficientBalances(Vec<AccountBalanceCheck>),

    /// The persisted channel record could not be read.
    #[error("channel record at {} is corrupted: {reason}; remove it or start with --override", path.display())]
    StateCorruption {
        /// The path of the record.
        path: PathBuf,
        /// The underlying reason.
        reason: String,
    },

    /// The channel handshake failed.
    #[error("failed to establish the IBC transfer channel: {0}")]
    HandshakeFailure(String),

    /// A single recurring job invocation failed.
    #[error("job {job} failed: {reason}")]
    JobInvocation {
        /// The name of the job.
        job: String,
        /// The underlying reason.
        reason: String,
    },

    /// Reading or writing a local file failed.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl RelayerError {
    /// Wrap an [`std::io::Error`] together with the path that caused it.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
