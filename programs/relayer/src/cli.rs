//! Contains the command line interface for the relayer.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

/// Name of the default home directory under the user's home.
const DEFAULT_HOME_DIR: &str = ".roller";

/// The command line interface for the relayer.
#[derive(Clone, Debug, Parser)]
#[command(
    author,
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"),
    about = "Relays IBC packets between the Dymension hub and a rollapp",
    long_about = None
)]
pub struct RelayerCli {
    /// The home directory holding the relayer configuration and state.
    /// [default: ~/.roller]
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// The subcommands for the relayer.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Starts a relayer between the Dymension hub and the rollapp.
    Start(StartArgs),
}

/// The arguments for the `start` subcommand.
#[derive(Clone, Debug, Parser)]
pub struct StartArgs {
    /// Override the existing relayer clients and channels.
    #[arg(long = "override")]
    pub override_channel: bool,
}

impl RelayerCli {
    /// Returns the home directory, defaulting to `~/.roller`.
    ///
    /// # Errors
    /// Returns an error if no home was given and the user's home directory
    /// cannot be determined.
    pub fn home(&self) -> anyhow::Result<PathBuf> {
        self.home
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(DEFAULT_HOME_DIR)))
            .context("Home directory not found, pass --home")
    }
}
