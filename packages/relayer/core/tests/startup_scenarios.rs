//! End-to-end startup scenarios against in-process collaborators.

use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use hub_relayer_core::{
    balance::{BalanceQuerier, KeyStore},
    channel::{ChannelRecord, ChannelStore},
    config::{parse_config, ChainConfig, RelayerConfig},
    establisher::HandshakeDriver,
    orchestrator::{Collaborators, JobFactory, Orchestrator, StartupState},
    sequencer::Sequencer,
    status::StatusReporter,
    supervisor::{Job, LogSink, RecurringJob},
    RelayerError, RelayerIdentity,
};
use tempfile::{tempdir, TempDir};
use tokio_util::sync::CancellationToken;

const HUB: &str = "dymension_100-1";
const CHILD: &str = "rollapp_1-1";

struct Keys;

#[async_trait]
impl KeyStore for Keys {
    async fn relayer_address(&self, chain_id: &str) -> Result<String, RelayerError> {
        Ok(format!("{chain_id}-relayer"))
    }
}

struct Balances {
    hub: u128,
    child: u128,
}

#[async_trait]
impl BalanceQuerier for Balances {
    async fn query_balance(&self, chain: &ChainConfig, _address: &str) -> Result<u128, RelayerError> {
        Ok(if chain.chain_id == HUB { self.hub } else { self.child })
    }
}

struct LiveSequencer;

#[async_trait]
impl Sequencer for LiveSequencer {
    async fn ensure_live(&self) -> Result<(), RelayerError> {
        Ok(())
    }
}

/// Hands out a fresh channel pair on every handshake and records the status
/// line visible while it runs.
#[derive(Default)]
struct Handshakes {
    calls: AtomicUsize,
    overrides: Mutex<Vec<bool>>,
    status: Option<StatusReporter>,
    status_during_handshake: Mutex<Vec<Option<String>>>,
    reject: AtomicBool,
}

#[async_trait]
impl HandshakeDriver for Handshakes {
    async fn create_channel(
        &self,
        override_existing: bool,
        _log_sink: &LogSink,
    ) -> Result<(String, String), RelayerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 10;
        self.overrides.lock().unwrap().push(override_existing);
        if let Some(status) = &self.status {
            self.status_during_handshake
                .lock()
                .unwrap()
                .push(status.read().unwrap());
        }
        if self.reject.load(Ordering::SeqCst) {
            return Err(RelayerError::HandshakeFailure("rejected transaction".to_string()));
        }
        Ok((format!("channel-{n}"), format!("channel-{}", n + 100)))
    }
}

struct CountingJob {
    name: &'static str,
    runs: Arc<AtomicUsize>,
}

#[async_trait]
impl Job for CountingJob {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self) -> Result<(), RelayerError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Builds one counting job per relay operation and remembers the channel it was built for.
#[derive(Default)]
struct Jobs {
    runs: Arc<AtomicUsize>,
    built_for: Mutex<Option<ChannelRecord>>,
    unscheduled_relays: AtomicBool,
}

impl JobFactory for Jobs {
    fn recurring_jobs(&self, record: &ChannelRecord) -> Result<Vec<RecurringJob>, RelayerError> {
        *self.built_for.lock().unwrap() = Some(record.clone());
        let relay_secs = if self.unscheduled_relays.load(Ordering::SeqCst) { 0 } else { 5 };
        [("update-clients", 3_600), ("relay-packets", relay_secs), ("relay-acks", relay_secs)]
            .into_iter()
            .map(|(name, secs)| {
                RecurringJob::new(
                    Arc::new(CountingJob {
                        name,
                        runs: self.runs.clone(),
                    }),
                    Duration::from_secs(secs),
                )
            })
            .collect()
    }
}

struct Harness {
    home: TempDir,
    handshakes: Arc<Handshakes>,
    jobs: Arc<Jobs>,
    orchestrator: Orchestrator,
}

impl Harness {
    fn new(hub_balance: u128, child_balance: u128) -> Self {
        let home = tempdir().unwrap();
        let config: RelayerConfig = parse_config(
            &serde_json::json!({
                "hub": { "chain_id": HUB, "rpc_url": "http://hub", "denom": "adym", "binary": "dymd" },
                "child": { "chain_id": CHILD, "rpc_url": "http://child", "denom": "urax", "binary": "rollappd" },
                "pricing": { "hub_one_day_relay_price": 100, "child_one_day_relay_price": 100 }
            })
            .to_string(),
        )
        .unwrap();
        let identity = RelayerIdentity::new(home.path(), CHILD, HUB);
        let handshakes = Arc::new(Handshakes {
            status: Some(StatusReporter::for_identity(&identity)),
            ..Handshakes::default()
        });
        let jobs = Arc::new(Jobs::default());

        let orchestrator = Orchestrator::new(
            identity,
            config,
            Collaborators {
                keys: Arc::new(Keys),
                balances: Arc::new(Balances {
                    hub: hub_balance,
                    child: child_balance,
                }),
                handshake: handshakes.clone(),
                sequencer: Arc::new(LiveSequencer),
                jobs: jobs.clone(),
            },
        );

        Self {
            home,
            handshakes,
            jobs,
            orchestrator,
        }
    }

    fn identity(&self) -> RelayerIdentity {
        RelayerIdentity::new(self.home.path(), CHILD, HUB)
    }

    fn store(&self) -> ChannelStore {
        ChannelStore::for_identity(&self.identity())
    }

    fn status(&self) -> Option<String> {
        StatusReporter::for_identity(&self.identity()).read().unwrap()
    }

    fn handshake_calls(&self) -> usize {
        self.handshakes.calls.load(Ordering::SeqCst)
    }

    /// Runs the orchestrator and cancels it once the jobs had `secs` to run.
    async fn run_for(&mut self, override_existing: bool, secs: u64) -> Result<(), RelayerError> {
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        let (result, ()) = tokio::join!(self.orchestrator.run(override_existing, &cancel), async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            canceller.cancel();
        });
        result
    }
}

fn seed_record(home: &Path, src: &str, dst: &str) -> ChannelRecord {
    let record = ChannelRecord::established(src, dst).unwrap();
    ChannelStore::for_identity(&RelayerIdentity::new(home, CHILD, HUB))
        .save(&record)
        .unwrap();
    record
}

#[tokio::test(start_paused = true)]
async fn fresh_identity_creates_channel_then_runs() {
    let mut harness = Harness::new(100, 1_000);

    harness.run_for(false, 6).await.unwrap();

    assert_eq!(
        harness.orchestrator.history(),
        [
            StartupState::Start,
            StartupState::BalanceChecked,
            StartupState::ChannelCreating,
            StartupState::ChannelReady,
            StartupState::Running,
            StartupState::Cancelled,
        ]
    );
    let record = harness.store().load().unwrap().unwrap();
    assert!(record.is_ready());
    assert_eq!(record, ChannelRecord::established("channel-10", "channel-110").unwrap());
    assert_eq!(
        harness.status().as_deref(),
        Some("Active src, channel-10 <-> channel-110, dst")
    );
    assert_eq!(
        *harness.handshakes.status_during_handshake.lock().unwrap(),
        [Some("Establishing IBC transfer channel".to_string())]
    );
    assert_eq!(harness.jobs.built_for.lock().unwrap().as_ref(), Some(&record));
    // update-clients once, relay-packets and relay-acks at 0s and 5s.
    assert_eq!(harness.jobs.runs.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn ready_record_is_reused_without_handshake() {
    let mut harness = Harness::new(1_000, 1_000);
    let existing = seed_record(harness.home.path(), "channel-0", "channel-3");

    harness.run_for(false, 1).await.unwrap();

    assert_eq!(harness.handshake_calls(), 0);
    assert!(!harness.orchestrator.history().contains(&StartupState::ChannelCreating));
    assert_eq!(harness.store().load().unwrap(), Some(existing));
    assert_eq!(
        harness.status().as_deref(),
        Some("Active src, channel-0 <-> channel-3, dst")
    );
}

#[tokio::test(start_paused = true)]
async fn insufficient_hub_balance_halts_before_channel_decision() {
    let mut harness = Harness::new(99, 1_000);
    let existing = seed_record(harness.home.path(), "channel-0", "channel-3");

    let err = harness.run_for(false, 1).await.unwrap_err();

    match err {
        RelayerError::InsufficientBalances(checks) => {
            assert_eq!(checks.len(), 1);
            assert_eq!(checks[0].network, HUB);
            assert_eq!(checks[0].current_balance, 99);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.orchestrator.history(), [StartupState::Start]);
    assert_eq!(harness.handshake_calls(), 0);
    assert_eq!(harness.store().load().unwrap(), Some(existing));
    assert_eq!(harness.status(), None);
    assert_eq!(harness.jobs.runs.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn insufficient_balance_leaves_fresh_home_untouched() {
    let mut harness = Harness::new(1_000, 0);

    harness.orchestrator.start_up(false).await.unwrap_err();

    assert_eq!(harness.store().load().unwrap(), None);
    assert_eq!(harness.handshake_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn override_replaces_ready_record() {
    let mut harness = Harness::new(1_000, 1_000);
    seed_record(harness.home.path(), "channel-0", "channel-3");

    harness.run_for(true, 1).await.unwrap();

    assert_eq!(harness.handshake_calls(), 1);
    assert_eq!(*harness.handshakes.overrides.lock().unwrap(), [true]);
    assert!(harness.orchestrator.history().contains(&StartupState::ChannelCreating));
    assert_eq!(
        harness.store().load().unwrap(),
        Some(ChannelRecord::established("channel-10", "channel-110").unwrap())
    );
    assert_eq!(
        harness.status().as_deref(),
        Some("Active src, channel-10 <-> channel-110, dst")
    );
}

#[tokio::test]
async fn corrupted_record_is_fatal_without_override() {
    let mut harness = Harness::new(1_000, 1_000);
    let path = harness.store().path().to_path_buf();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"src_channel: channel-0").unwrap();

    let err = harness.orchestrator.start_up(false).await.unwrap_err();
    assert!(matches!(err, RelayerError::StateCorruption { .. }));
    assert_eq!(harness.handshake_calls(), 0);
    assert_eq!(harness.status().as_deref(), Some("Balances verified"));

    let record = harness.orchestrator.start_up(true).await.unwrap();
    assert!(record.is_ready());
    assert_eq!(harness.store().load().unwrap(), Some(record));
}

#[tokio::test]
async fn record_with_missing_id_is_recreated() {
    let mut harness = Harness::new(1_000, 1_000);
    harness
        .store()
        .save(&ChannelRecord {
            src_channel: "channel-0".to_string(),
            dst_channel: String::new(),
            ready: true,
        })
        .unwrap();

    harness.orchestrator.start_up(false).await.unwrap();

    assert_eq!(harness.handshake_calls(), 1);
    assert_eq!(*harness.handshakes.overrides.lock().unwrap(), [false]);
}

#[tokio::test]
async fn cancellation_before_running_starts_no_job() {
    let mut harness = Harness::new(1_000, 1_000);
    let cancel = CancellationToken::new();
    cancel.cancel();

    harness.orchestrator.run(false, &cancel).await.unwrap();

    assert_eq!(harness.orchestrator.history().last(), Some(&StartupState::Cancelled));
    assert!(!harness.orchestrator.history().contains(&StartupState::Running));
    assert_eq!(harness.jobs.runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_handshake_leaves_establishing_status() {
    let mut harness = Harness::new(1_000, 1_000);
    harness.handshakes.reject.store(true, Ordering::SeqCst);

    let err = harness.orchestrator.start_up(false).await.unwrap_err();

    assert!(matches!(err, RelayerError::HandshakeFailure(_)));
    assert_eq!(
        harness.status().as_deref(),
        Some("Establishing IBC transfer channel")
    );
    assert_eq!(harness.store().load().unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn unschedulable_job_is_fatal_before_running() {
    let mut harness = Harness::new(1_000, 1_000);
    harness.jobs.unscheduled_relays.store(true, Ordering::SeqCst);

    let err = harness.run_for(false, 1).await.unwrap_err();

    assert!(matches!(err, RelayerError::Configuration(_)));
    assert_eq!(harness.orchestrator.history().last(), Some(&StartupState::ChannelReady));
    assert_eq!(harness.jobs.runs.load(Ordering::SeqCst), 0);
}
