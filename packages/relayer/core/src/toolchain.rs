//! Adapters around the external `rly` toolchain and the chain node binaries.
//!
//! The relayer never builds IBC messages itself; every chain interaction is a
//! subprocess whose exit status decides success.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::{
    balance::{BalanceQuerier, KeyStore},
    channel::ChannelRecord,
    config::{ChainConfig, JobsConfig, RelayerConfig},
    error::RelayerError,
    establisher::HandshakeDriver,
    identity::RelayerIdentity,
    orchestrator::JobFactory,
    supervisor::{CommandJob, LogSink, RecurringJob},
};

/// Name of the client update job.
pub const UPDATE_CLIENTS_JOB: &str = "update-clients";
/// Name of the packet relay job.
pub const RELAY_PACKETS_JOB: &str = "relay-packets";
/// Name of the acknowledgement relay job.
pub const RELAY_ACKS_JOB: &str = "relay-acks";

const TRANSFER_PORT: &str = "transfer";
const TRANSFER_VERSION: &str = "ics20-1";
const OPEN_STATE: &str = "STATE_OPEN";

/// Runs `program` and returns its trimmed stdout, or a description of the failure.
async fn capture(program: &Path, args: &[String]) -> Result<String, String> {
    debug!(program = %program.display(), ?args, "Running command");
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| format!("failed to spawn {}: {e}", program.display()))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!(
            "{} exited with {}: {}",
            program.display(),
            output.status,
            stderr.trim()
        ))
    }
}

/// The `rly` relayer toolchain bound to one relayer identity.
#[derive(Clone, Debug)]
pub struct RlyToolchain {
    binary: PathBuf,
    home: PathBuf,
    path_name: String,
    child_chain_id: String,
    handshake_timeout: Duration,
    jobs: JobsConfig,
    log_dir: PathBuf,
}

impl RlyToolchain {
    /// Create the toolchain adapter for `identity`.
    #[must_use]
    pub fn new(identity: &RelayerIdentity, config: &RelayerConfig) -> Self {
        Self {
            binary: config.toolchain.binary.clone(),
            home: identity.relayer_home(),
            path_name: config.toolchain.path_name.clone(),
            child_chain_id: identity.child_chain_id().to_string(),
            handshake_timeout: config.toolchain.handshake_timeout(),
            jobs: config.jobs.clone(),
            log_dir: identity.log_dir(),
        }
    }

    /// The `rly` executable.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn args<const N: usize>(&self, args: [&str; N]) -> Vec<String> {
        args.iter()
            .map(ToString::to_string)
            .chain(["--home".to_string(), self.home.display().to_string()])
            .collect()
    }

    /// Arguments of the client update command.
    #[must_use]
    pub fn update_clients_args(&self) -> Vec<String> {
        self.args(["tx", "update-clients", self.path_name.as_str()])
    }

    /// Arguments of the packet relay command.
    #[must_use]
    pub fn relay_packets_args(&self, src_channel: &str) -> Vec<String> {
        self.args(["tx", "relay-packets", self.path_name.as_str(), src_channel])
    }

    /// Arguments of the acknowledgement relay command.
    #[must_use]
    pub fn relay_acks_args(&self, src_channel: &str) -> Vec<String> {
        self.args(["tx", "relay-acknowledgements", self.path_name.as_str(), src_channel])
    }

    /// Arguments of the channel handshake command.
    #[must_use]
    pub fn link_args(&self, override_existing: bool) -> Vec<String> {
        let mut args = self.args([
            "transact",
            "link",
            self.path_name.as_str(),
            "--src-port",
            TRANSFER_PORT,
            "--dst-port",
            TRANSFER_PORT,
            "--version",
            TRANSFER_VERSION,
        ]);
        if override_existing {
            args.push("--override".to_string());
        }
        args
    }

    /// Arguments of the command describing the configured path.
    #[must_use]
    pub fn show_path_args(&self) -> Vec<String> {
        self.args(["paths", "show", self.path_name.as_str(), "--json"])
    }

    /// Arguments of the channel listing command for the child chain.
    #[must_use]
    pub fn query_channels_args(&self) -> Vec<String> {
        self.args(["query", "channels", self.child_chain_id.as_str()])
    }

    fn job(
        &self,
        name: &str,
        args: Vec<String>,
        interval_secs: u64,
    ) -> Result<RecurringJob, RelayerError> {
        let sink = LogSink::new(self.log_dir.join(format!("{name}.log")));
        RecurringJob::new(
            Arc::new(CommandJob::new(name, &self.binary, args, sink)),
            Duration::from_secs(interval_secs),
        )
    }
}

#[async_trait]
impl KeyStore for RlyToolchain {
    async fn relayer_address(&self, chain_id: &str) -> Result<String, RelayerError> {
        let address = capture(&self.binary, &self.args(["keys", "show", chain_id]))
            .await
            .map_err(|reason| RelayerError::LookupFailure {
                chain_id: chain_id.to_string(),
                reason,
            })?;

        if address.is_empty() {
            return Err(RelayerError::LookupFailure {
                chain_id: chain_id.to_string(),
                reason: "no relayer key in the keyring".to_string(),
            });
        }
        Ok(address)
    }
}

#[async_trait]
impl HandshakeDriver for RlyToolchain {
    #[instrument(skip(self, log_sink), fields(path = %self.path_name), err(Display))]
    async fn create_channel(
        &self,
        override_existing: bool,
        log_sink: &LogSink,
    ) -> Result<(String, String), RelayerError> {
        let (stdout, stderr) = log_sink.stdio()?;
        let mut link = Command::new(&self.binary);
        link.args(self.link_args(override_existing))
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true);

        info!(log = %log_sink.path().display(), "Running channel handshake");
        let status = tokio::time::timeout(self.handshake_timeout, link.status())
            .await
            .map_err(|_| {
                RelayerError::HandshakeFailure(format!(
                    "handshake timed out after {}s",
                    self.handshake_timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                RelayerError::HandshakeFailure(format!(
                    "failed to spawn {}: {e}",
                    self.binary.display()
                ))
            })?;
        if !status.success() {
            return Err(RelayerError::HandshakeFailure(format!(
                "{} transact link exited with {status}, see {}",
                self.binary.display(),
                log_sink.path().display()
            )));
        }

        let path = capture(&self.binary, &self.show_path_args())
            .await
            .map_err(RelayerError::HandshakeFailure)?;
        let connection_id = parse_path_connection(&path, &self.child_chain_id).ok_or_else(|| {
            RelayerError::HandshakeFailure(format!(
                "path {} has no connection on {}",
                self.path_name, self.child_chain_id
            ))
        })?;

        let channels = capture(&self.binary, &self.query_channels_args())
            .await
            .map_err(RelayerError::HandshakeFailure)?;
        parse_open_transfer_channel(&channels, &connection_id).ok_or_else(|| {
            RelayerError::HandshakeFailure(format!(
                "no open {TRANSFER_PORT} channel on {connection_id} of {} after the handshake",
                self.child_chain_id
            ))
        })
    }
}

impl JobFactory for RlyToolchain {
    fn recurring_jobs(&self, record: &ChannelRecord) -> Result<Vec<RecurringJob>, RelayerError> {
        Ok(vec![
            self.job(
                UPDATE_CLIENTS_JOB,
                self.update_clients_args(),
                self.jobs.update_clients_interval_secs,
            )?,
            self.job(
                RELAY_PACKETS_JOB,
                self.relay_packets_args(&record.src_channel),
                self.jobs.relay_packets_interval_secs,
            )?,
            self.job(
                RELAY_ACKS_JOB,
                self.relay_acks_args(&record.src_channel),
                self.jobs.relay_acks_interval_secs,
            )?,
        ])
    }
}

#[derive(serde::Deserialize)]
struct ChannelCounterparty {
    #[serde(default)]
    channel_id: String,
}

#[derive(serde::Deserialize)]
struct ChannelEntry {
    state: String,
    port_id: String,
    channel_id: String,
    #[serde(default)]
    connection_hops: Vec<String>,
    counterparty: ChannelCounterparty,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PathEnd {
    chain_id: String,
    #[serde(default)]
    connection_id: String,
}

#[derive(serde::Deserialize)]
struct PathEnds {
    src: PathEnd,
    dst: PathEnd,
}

#[derive(serde::Deserialize)]
struct PathDescription {
    path: PathEnds,
}

/// Returns the connection of `chain_id`'s end of the path described by
/// `rly paths show --json`.
fn parse_path_connection(output: &str, chain_id: &str) -> Option<String> {
    let description: PathDescription = serde_json::from_str(output.trim()).ok()?;
    [description.path.src, description.path.dst]
        .into_iter()
        .find(|end| end.chain_id == chain_id && !end.connection_id.is_empty())
        .map(|end| end.connection_id)
}

/// Picks the most recent open transfer channel on `connection_id` from
/// `rly query channels` output (one JSON object per line) and returns
/// `(channel, counterparty)`.
fn parse_open_transfer_channel(output: &str, connection_id: &str) -> Option<(String, String)> {
    output
        .lines()
        .filter_map(|line| serde_json::from_str::<ChannelEntry>(line.trim()).ok())
        .filter(|c| {
            c.state == OPEN_STATE
                && c.port_id == TRANSFER_PORT
                && c.connection_hops.first().map(String::as_str) == Some(connection_id)
                && !c.channel_id.is_empty()
                && !c.counterparty.channel_id.is_empty()
        })
        .next_back()
        .map(|c| (c.channel_id, c.counterparty.channel_id))
}

#[derive(serde::Deserialize)]
struct Coin {
    denom: String,
    amount: String,
}

#[derive(serde::Deserialize)]
struct BalancesResponse {
    balances: Vec<Coin>,
}

/// Extracts the `denom` amount from `query bank balances` JSON output. A
/// denomination absent from the response is a zero balance.
fn parse_balance(output: &str, denom: &str) -> Result<u128, String> {
    let response: BalancesResponse =
        serde_json::from_str(output).map_err(|e| format!("malformed balances response: {e}"))?;
    response
        .balances
        .into_iter()
        .find(|coin| coin.denom == denom)
        .map_or(Ok(0), |coin| {
            coin.amount
                .parse()
                .map_err(|e| format!("malformed amount '{}': {e}", coin.amount))
        })
}

/// Queries balances with the chain's own node binary.
#[derive(Clone, Copy, Debug, Default)]
pub struct CliBalanceQuerier;

#[async_trait]
impl BalanceQuerier for CliBalanceQuerier {
    async fn query_balance(
        &self,
        chain: &ChainConfig,
        address: &str,
    ) -> Result<u128, RelayerError> {
        let args = [
            "query", "bank", "balances", address, "--node", chain.rpc_url.as_str(), "--output", "json",
        ]
        .map(ToString::to_string);

        let query_failure = |reason| RelayerError::QueryFailure {
            chain_id: chain.chain_id.clone(),
            address: address.to_string(),
            reason,
        };
        let output = capture(Path::new(&chain.binary), &args)
            .await
            .map_err(query_failure)?;
        parse_balance(&output, &chain.denom).map_err(query_failure)
    }
}
