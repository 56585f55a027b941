//! Creates the IBC transfer channel between the child chain and the hub.

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::{
    channel::{ChannelRecord, ChannelStore},
    error::RelayerError,
    sequencer::Sequencer,
    supervisor::LogSink,
};

/// Drives the channel handshake.
#[async_trait]
pub trait HandshakeDriver: Send + Sync {
    /// Runs the handshake and returns `(src_channel, dst_channel)`, the
    /// channel IDs on the child chain and on the hub.
    ///
    /// # Errors
    /// Returns [`RelayerError::HandshakeFailure`] if any handshake step fails.
    async fn create_channel(
        &self,
        override_existing: bool,
        log_sink: &LogSink,
    ) -> Result<(String, String), RelayerError>;
}

/// Establishes a channel and persists its record.
pub struct ChannelEstablisher<'a> {
    driver: &'a dyn HandshakeDriver,
    sequencer: &'a dyn Sequencer,
    store: &'a ChannelStore,
}

impl<'a> ChannelEstablisher<'a> {
    /// Create a new `ChannelEstablisher`.
    #[must_use]
    pub fn new(
        driver: &'a dyn HandshakeDriver,
        sequencer: &'a dyn Sequencer,
        store: &'a ChannelStore,
    ) -> Self {
        Self {
            driver,
            sequencer,
            store,
        }
    }

    /// Runs the handshake and persists the resulting record.
    ///
    /// With `override_existing`, any persisted record is discarded first. The
    /// new record is written only after the handshake succeeded.
    ///
    /// # Errors
    /// Returns [`RelayerError::HandshakeFailure`] if the sequencer is not live
    /// or the handshake fails, and [`RelayerError::Io`] if the record cannot
    /// be written.
    #[instrument(skip(self, log_sink), err(Display))]
    pub async fn establish(
        &self,
        override_existing: bool,
        log_sink: &LogSink,
    ) -> Result<ChannelRecord, RelayerError> {
        self.sequencer.ensure_live().await?;

        if override_existing {
            info!("Discarding the existing channel record");
            self.store.discard()?;
        }

        let (src_channel, dst_channel) = self
            .driver
            .create_channel(override_existing, log_sink)
            .await?;
        let record = ChannelRecord::established(src_channel, dst_channel)?;
        self.store.save(&record)?;

        info!(
            src_channel = %record.src_channel,
            dst_channel = %record.dst_channel,
            "IBC transfer channel established"
        );
        Ok(record)
    }
}
