//! Defines the top level configuration for the relayer.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use tracing::Level;

use crate::error::RelayerError;

/// Location of the configuration file relative to the home directory.
const CONFIG_FILE: &[&str] = &["relayer", "config.json"];

/// The top level configuration for the relayer.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[allow(clippy::module_name_repetitions)]
pub struct RelayerConfig {
    /// The hub chain.
    pub hub: ChainConfig,
    /// The child chain.
    pub child: ChainConfig,
    /// The minimum balances each relayer account must hold.
    #[serde(default)]
    pub pricing: PricingConfig,
    /// The external relayer toolchain.
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    /// How the child chain sequencer is probed before a handshake.
    #[serde(default)]
    pub sequencer: SequencerConfig,
    /// The intervals of the recurring jobs.
    #[serde(default)]
    pub jobs: JobsConfig,
    /// The observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// The Prometheus endpoint. Disabled when absent.
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
}

/// Connection details of one chain.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[allow(clippy::module_name_repetitions)]
pub struct ChainConfig {
    /// The chain ID.
    pub chain_id: String,
    /// The Tendermint RPC endpoint of a node of the chain.
    pub rpc_url: String,
    /// The fee denomination the relayer account pays in.
    pub denom: String,
    /// The chain's node binary, used to query balances.
    pub binary: String,
}

/// Per-network minimum balances, currently the cost of one day of relaying.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[allow(clippy::module_name_repetitions)]
pub struct PricingConfig {
    /// Minimum balance of the hub relayer account.
    #[serde(default = "default_one_day_relay_price")]
    pub hub_one_day_relay_price: u128,
    /// Minimum balance of the child relayer account.
    #[serde(default = "default_one_day_relay_price")]
    pub child_one_day_relay_price: u128,
}

/// The `rly` toolchain configuration.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[allow(clippy::module_name_repetitions)]
pub struct ToolchainConfig {
    /// Path or name of the `rly` executable.
    #[serde(default = "default_toolchain_binary")]
    pub binary: PathBuf,
    /// Name of the `rly` path connecting the two chains.
    #[serde(default = "default_path_name")]
    pub path_name: String,
    /// Upper bound for the whole channel handshake.
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
}

/// Sequencer liveness probing.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[allow(clippy::module_name_repetitions)]
pub struct SequencerConfig {
    /// How long the child chain may take to produce a new block.
    #[serde(default = "default_liveness_timeout_secs")]
    pub liveness_timeout_secs: u64,
    /// Delay between two status polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Intervals of the recurring jobs.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[allow(clippy::module_name_repetitions)]
pub struct JobsConfig {
    /// Interval between two client updates.
    #[serde(default = "default_update_clients_interval_secs")]
    pub update_clients_interval_secs: u64,
    /// Interval between two packet relays.
    #[serde(default = "default_relay_interval_secs")]
    pub relay_packets_interval_secs: u64,
    /// Interval between two acknowledgement relays.
    #[serde(default = "default_relay_interval_secs")]
    pub relay_acks_interval_secs: u64,
}

/// The configuration for logging and tracing.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[allow(clippy::module_name_repetitions)]
pub struct ObservabilityConfig {
    /// The log level.
    #[serde(default = "default_level")]
    pub level: String,
    /// Whether to export traces and logs over OTLP.
    #[serde(default)]
    pub use_otel: bool,
    /// The service name reported to the collector.
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// The OTLP collector endpoint. Uses the exporter default when absent.
    #[serde(default)]
    pub otel_endpoint: Option<String>,
}

/// The configuration for the metrics server.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[allow(clippy::module_name_repetitions)]
pub struct MetricsConfig {
    /// The address to bind the server to.
    pub address: String,
    /// The port to bind the server to.
    pub port: u16,
}

const fn default_one_day_relay_price() -> u128 {
    1
}

fn default_toolchain_binary() -> PathBuf {
    PathBuf::from("rly")
}

fn default_path_name() -> String {
    "hub-rollapp".to_string()
}

const fn default_handshake_timeout_secs() -> u64 {
    600
}

const fn default_liveness_timeout_secs() -> u64 {
    60
}

const fn default_poll_interval_ms() -> u64 {
    1_000
}

const fn default_update_clients_interval_secs() -> u64 {
    3_600
}

const fn default_relay_interval_secs() -> u64 {
    5
}

fn default_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "hub-relayer".to_string()
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            hub_one_day_relay_price: default_one_day_relay_price(),
            child_one_day_relay_price: default_one_day_relay_price(),
        }
    }
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            binary: default_toolchain_binary(),
            path_name: default_path_name(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
        }
    }
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            liveness_timeout_secs: default_liveness_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            update_clients_interval_secs: default_update_clients_interval_secs(),
            relay_packets_interval_secs: default_relay_interval_secs(),
            relay_acks_interval_secs: default_relay_interval_secs(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            use_otel: false,
            service_name: default_service_name(),
            otel_endpoint: None,
        }
    }
}

impl ObservabilityConfig {
    /// Returns the log level, falling back to `INFO` on unknown values.
    #[must_use]
    pub fn level(&self) -> Level {
        Level::from_str(&self.level).unwrap_or(Level::INFO)
    }
}

impl ToolchainConfig {
    /// The handshake timeout as a [`Duration`].
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

impl SequencerConfig {
    /// The liveness timeout as a [`Duration`].
    #[must_use]
    pub const fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.liveness_timeout_secs)
    }

    /// The poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl RelayerConfig {
    /// Returns the path of the configuration file inside `home`.
    #[must_use]
    pub fn path(home: &Path) -> PathBuf {
        CONFIG_FILE.iter().fold(home.to_path_buf(), |p, c| p.join(c))
    }

    /// Reads and validates the configuration stored in `home`.
    ///
    /// # Errors
    /// Returns [`RelayerError::Configuration`] if the file is missing, is not
    /// valid JSON for this schema, or fails validation.
    pub fn from_home(home: &Path) -> Result<Self, RelayerError> {
        let path = Self::path(home);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            RelayerError::Configuration(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;

        let config: Self = parse_config(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the parsed configuration.
    ///
    /// # Errors
    /// Returns [`RelayerError::Configuration`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), RelayerError> {
        self.hub.validate("hub")?;
        self.child.validate("child")?;

        if self.hub.chain_id == self.child.chain_id {
            return Err(RelayerError::Configuration(format!(
                "hub and child chain share the chain id '{}'",
                self.hub.chain_id
            )));
        }
        if self.toolchain.binary.as_os_str().is_empty() {
            return Err(RelayerError::Configuration(
                "toolchain.binary must not be empty".to_string(),
            ));
        }
        if self.toolchain.path_name.is_empty() {
            return Err(RelayerError::Configuration(
                "toolchain.path_name must not be empty".to_string(),
            ));
        }

        for (field, value) in [
            (
                "jobs.update_clients_interval_secs",
                self.jobs.update_clients_interval_secs,
            ),
            (
                "jobs.relay_packets_interval_secs",
                self.jobs.relay_packets_interval_secs,
            ),
            ("jobs.relay_acks_interval_secs", self.jobs.relay_acks_interval_secs),
            (
                "toolchain.handshake_timeout_secs",
                self.toolchain.handshake_timeout_secs,
            ),
            (
                "sequencer.liveness_timeout_secs",
                self.sequencer.liveness_timeout_secs,
            ),
            ("sequencer.poll_interval_ms", self.sequencer.poll_interval_ms),
        ] {
            if value == 0 {
                return Err(RelayerError::Configuration(format!(
                    "{field} must be greater than zero"
                )));
            }
        }

        Ok(())
    }
}

impl ChainConfig {
    fn validate(&self, name: &str) -> Result<(), RelayerError> {
        for (field, value) in [
            ("chain_id", &self.chain_id),
            ("rpc_url", &self.rpc_url),
            ("denom", &self.denom),
            ("binary", &self.binary),
        ] {
            if value.trim().is_empty() {
                return Err(RelayerError::Configuration(format!(
                    "{name}.{field} must not be empty"
                )));
            }
        }
        Ok(())
    }
}

/// Parse a JSON configuration document into the target struct while producing
/// path-aware error messages (e.g. `hub.rpc_url`).
///
/// # Errors
/// Returns [`RelayerError::Configuration`] with the JSON path of the failure
/// and the original serde error message.
pub fn parse_config<T>(json: &str) -> Result<T, RelayerError>
where
    T: serde::de::DeserializeOwned,
{
    let mut deserializer = serde_json::Deserializer::from_str(json);
    serde_path_to_error::deserialize::<_, T>(&mut deserializer)
        .map_err(|e| RelayerError::Configuration(format!("config error at {}: {}", e.path(), e)))
}
