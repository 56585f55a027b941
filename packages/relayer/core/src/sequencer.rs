//! Probes the child chain sequencer before a channel handshake.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::{config::SequencerConfig, error::RelayerError};

/// The child chain process producing blocks.
#[async_trait]
pub trait Sequencer: Send + Sync {
    /// Succeeds once the sequencer is observed producing blocks.
    ///
    /// # Errors
    /// Returns [`RelayerError::HandshakeFailure`] if the sequencer is
    /// unreachable or does not produce a block in time.
    async fn ensure_live(&self) -> Result<(), RelayerError>;
}

#[derive(serde::Deserialize)]
struct StatusResponse {
    result: StatusResult,
}

#[derive(serde::Deserialize)]
struct StatusResult {
    sync_info: SyncInfo,
}

#[derive(serde::Deserialize)]
struct SyncInfo {
    latest_block_height: String,
}

/// Extracts the latest block height from a Tendermint `/status` response.
fn parse_latest_height(body: &[u8]) -> Result<u64, String> {
    let status: StatusResponse =
        serde_json::from_slice(body).map_err(|e| format!("malformed status response: {e}"))?;
    status
        .result
        .sync_info
        .latest_block_height
        .parse()
        .map_err(|e| format!("malformed block height: {e}"))
}

/// A [`Sequencer`] observed through the child chain's Tendermint RPC.
#[derive(Clone, Debug)]
pub struct RpcSequencer {
    client: reqwest::Client,
    rpc_url: String,
    liveness_timeout: Duration,
    poll_interval: Duration,
}

impl RpcSequencer {
    /// Create a liveness check for the node at `rpc_url`. Every status request is
    /// bounded by the liveness timeout.
    #[must_use]
    pub fn new(rpc_url: impl Into<String>, config: &SequencerConfig) -> Self {
        let liveness_timeout = config.liveness_timeout();
        let client = reqwest::Client::builder()
            .timeout(liveness_timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            rpc_url: rpc_url.into(),
            liveness_timeout,
            poll_interval: config.poll_interval(),
        }
    }

    async fn latest_height(&self) -> Result<u64, String> {
        let url = format!("{}/status", self.rpc_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| format!("failed to query {url}: {e}"))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| format!("failed to read status from {url}: {e}"))?;
        parse_latest_height(&body)
    }
}

#[async_trait]
impl Sequencer for RpcSequencer {
    #[instrument(skip(self), fields(rpc_url = %self.rpc_url), err(Display))]
    async fn ensure_live(&self) -> Result<(), RelayerError> {
        let liveness = async {
            let start = self
                .latest_height()
                .await
                .map_err(|e| format!("sequencer unavailable: {e}"))?;
            loop {
                tokio::time::sleep(self.poll_interval).await;
                match self.latest_height().await {
                    Ok(height) if height > start => return Ok::<_, String>((start, height)),
                    Ok(height) => debug!(height, "Waiting for a new block"),
                    Err(e) => debug!(error = %e, "Status poll failed"),
                }
            }
        };

        let (start, produced) = tokio::time::timeout(self.liveness_timeout, liveness)
            .await
            .map_err(|_| {
                RelayerError::HandshakeFailure(format!(
                    "sequencer did not produce a block within {}s",
                    self.liveness_timeout.as_secs()
                ))
            })?
            .map_err(RelayerError::HandshakeFailure)?;

        info!(start, height = produced, "Sequencer is producing blocks");
        Ok(())
    }
}
