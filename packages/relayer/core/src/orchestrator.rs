//! Drives the relayer from startup checks to the recurring job phase.
//!
//! ```text
//! Start -> BalanceChecked -> ChannelReady ------------------> Running -> Cancelled
//!                         \-> ChannelCreating -> ChannelReady -/
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::{
    balance::{BalanceQuerier, BalanceVerifier, KeyStore},
    channel::{ChannelInspector, ChannelRecord, ChannelStore},
    config::RelayerConfig,
    error::RelayerError,
    establisher::{ChannelEstablisher, HandshakeDriver},
    identity::RelayerIdentity,
    sequencer::{RpcSequencer, Sequencer},
    status::{self, StatusReporter},
    supervisor::{LogSink, RecurringJob, Supervisor},
    toolchain::{CliBalanceQuerier, RlyToolchain},
};

/// The states of the relayer lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartupState {
    /// The process started.
    Start,
    /// Both relayer accounts are funded.
    BalanceChecked,
    /// A channel handshake is running.
    ChannelCreating,
    /// A ready channel exists.
    ChannelReady,
    /// The recurring jobs are running.
    Running,
    /// The relayer was cancelled.
    Cancelled,
}

/// Builds the recurring jobs that keep a ready channel alive.
pub trait JobFactory: Send + Sync {
    /// Returns the client update, packet relay and acknowledgement relay jobs
    /// for `record`.
    ///
    /// # Errors
    /// Returns [`RelayerError::Configuration`] if a job cannot be scheduled.
    fn recurring_jobs(&self, record: &ChannelRecord) -> Result<Vec<RecurringJob>, RelayerError>;
}

/// The external collaborators of the [`Orchestrator`].
#[derive(Clone)]
pub struct Collaborators {
    /// Resolves relayer addresses.
    pub keys: Arc<dyn KeyStore>,
    /// Queries relayer balances.
    pub balances: Arc<dyn BalanceQuerier>,
    /// Runs the channel handshake.
    pub handshake: Arc<dyn HandshakeDriver>,
    /// Probes the child chain sequencer.
    pub sequencer: Arc<dyn Sequencer>,
    /// Builds the recurring jobs.
    pub jobs: Arc<dyn JobFactory>,
}

impl Collaborators {
    /// The production collaborators: the `rly` toolchain, the chains' node
    /// binaries and the child chain RPC.
    #[must_use]
    pub fn rly(identity: &RelayerIdentity, config: &RelayerConfig) -> Self {
        let rly = Arc::new(RlyToolchain::new(identity, config));
        Self {
            keys: rly.clone(),
            balances: Arc::new(CliBalanceQuerier),
            handshake: rly.clone(),
            sequencer: Arc::new(RpcSequencer::new(
                config.child.rpc_url.clone(),
                &config.sequencer,
            )),
            jobs: rly,
        }
    }
}

/// Runs the startup checks, establishes the channel if needed and supervises
/// the recurring jobs.
pub struct Orchestrator {
    identity: RelayerIdentity,
    config: RelayerConfig,
    collaborators: Collaborators,
    store: ChannelStore,
    status: StatusReporter,
    handshake_log: LogSink,
    history: Vec<StartupState>,
}

impl Orchestrator {
    /// Create a new `Orchestrator`.
    #[must_use]
    pub fn new(
        identity: RelayerIdentity,
        config: RelayerConfig,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            store: ChannelStore::for_identity(&identity),
            status: StatusReporter::for_identity(&identity),
            handshake_log: LogSink::new(identity.log_dir().join("handshake.log")),
            identity,
            config,
            collaborators,
            history: Vec::new(),
        }
    }

    /// The states passed through so far, in order.
    #[must_use]
    pub fn history(&self) -> &[StartupState] {
        &self.history
    }

    fn transition(&mut self, state: StartupState) {
        info!(?state, "Relayer state transition");
        self.history.push(state);
    }

    /// Runs the startup phase and returns the ready channel.
    ///
    /// # Errors
    /// Returns the first fatal error: a failed or insufficient balance check,
    /// a corrupted channel record, a failed handshake, or an I/O error.
    #[instrument(
        skip(self),
        fields(child = %self.identity.child_chain_id(), hub = %self.identity.hub_chain_id()),
        err(Display)
    )]
    pub async fn start_up(&mut self, override_existing: bool) -> Result<ChannelRecord, RelayerError> {
        self.history.clear();
        self.transition(StartupState::Start);

        let insufficient = BalanceVerifier::new(
            self.collaborators.keys.as_ref(),
            self.collaborators.balances.as_ref(),
        )
        .insufficient_balances(
            &self.identity,
            &self.config.hub,
            &self.config.child,
            &self.config.pricing,
        )
        .await?;
        if !insufficient.is_empty() {
            return Err(RelayerError::InsufficientBalances(insufficient));
        }
        self.transition(StartupState::BalanceChecked);
        self.status.write(status::BALANCES_VERIFIED)?;

        let reusable = if override_existing {
            info!("Overriding the existing relayer channel");
            None
        } else {
            ChannelInspector::new(&self.store).ready_channel()?
        };

        let record = if let Some(record) = reusable {
            info!(
                src_channel = %record.src_channel,
                dst_channel = %record.dst_channel,
                "IBC transfer channel is already established"
            );
            record
        } else {
            self.transition(StartupState::ChannelCreating);
            self.status.write(status::ESTABLISHING_CHANNEL)?;
            ChannelEstablisher::new(
                self.collaborators.handshake.as_ref(),
                self.collaborators.sequencer.as_ref(),
                &self.store,
            )
            .establish(override_existing, &self.handshake_log)
            .await?
        };

        self.transition(StartupState::ChannelReady);
        self.status.write(&status::active_status(&record))?;
        Ok(record)
    }

    /// Runs the startup phase, then the recurring jobs until `cancel` fires.
    ///
    /// Cancelling during startup aborts it without starting any job.
    ///
    /// # Errors
    /// Returns the fatal startup error, if any. Once the jobs run, this only
    /// returns after cancellation.
    pub async fn run(
        &mut self,
        override_existing: bool,
        cancel: &CancellationToken,
    ) -> Result<(), RelayerError> {
        let startup = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = self.start_up(override_existing) => Some(result),
        };
        let Some(result) = startup else {
            info!("Cancelled during startup");
            self.transition(StartupState::Cancelled);
            return Ok(());
        };
        let record = result?;

        let jobs = self.collaborators.jobs.recurring_jobs(&record)?;
        let handle = Supervisor::new(jobs).spawn(cancel);
        self.transition(StartupState::Running);
        info!(
            src_channel = %record.src_channel,
            dst_channel = %record.dst_channel,
            "The relayer is running"
        );

        handle.join().await;
        self.transition(StartupState::Cancelled);
        Ok(())
    }
}
