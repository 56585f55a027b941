//! Runs recurring jobs on independent schedules until cancelled.
//!
//! Every [`RecurringJob`] gets its own task. A job never overlaps with itself:
//! an invocation that outlives its interval delays the next start instead of
//! running concurrently with it. Failed invocations are logged and the
//! schedule continues; only the [`CancellationToken`] stops a job.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::{
    process::Command,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{error::RelayerError, metrics};

/// A unit of work the supervisor invokes on a schedule.
#[async_trait]
pub trait Job: Send + Sync {
    /// The name of the job, used in logs and metrics.
    fn name(&self) -> &str;

    /// Runs the job once.
    ///
    /// # Errors
    /// Returns [`RelayerError::JobInvocation`] if the invocation failed.
    async fn run(&self) -> Result<(), RelayerError>;
}

/// An append-only log file owned by a single job.
#[derive(Clone, Debug)]
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    /// Create a sink appending to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the log file for appending, creating it if needed.
    ///
    /// # Errors
    /// Returns [`RelayerError::Io`] if the file cannot be opened.
    pub fn open(&self) -> Result<File, RelayerError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| RelayerError::io(dir, e))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| RelayerError::io(&self.path, e))
    }

    /// Appends a single line.
    ///
    /// # Errors
    /// Returns [`RelayerError::Io`] if the line cannot be written.
    pub fn append_line(&self, line: &str) -> Result<(), RelayerError> {
        let mut file = self.open()?;
        writeln!(file, "{line}").map_err(|e| RelayerError::io(&self.path, e))
    }

    /// Returns handles suitable for a child process' stdout and stderr.
    ///
    /// # Errors
    /// Returns [`RelayerError::Io`] if the file cannot be opened.
    pub fn stdio(&self) -> Result<(Stdio, Stdio), RelayerError> {
        let stdout = self.open()?;
        let stderr = stdout
            .try_clone()
            .map_err(|e| RelayerError::io(&self.path, e))?;
        Ok((Stdio::from(stdout), Stdio::from(stderr)))
    }
}

/// A job that runs an external executable and judges it by its exit status.
#[derive(Clone, Debug)]
pub struct CommandJob {
    name: String,
    program: PathBuf,
    args: Vec<String>,
    log_sink: LogSink,
}

impl CommandJob {
    /// Create a new `CommandJob`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        program: impl Into<PathBuf>,
        args: Vec<String>,
        log_sink: LogSink,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
            log_sink,
        }
    }

    /// The executable.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The arguments passed to the executable.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The sink receiving the command output.
    #[must_use]
    pub const fn log_sink(&self) -> &LogSink {
        &self.log_sink
    }

    fn invocation_error(&self, reason: String) -> RelayerError {
        if let Err(e) = self.log_sink.append_line(&format!("{}: {reason}", self.name)) {
            warn!(error = %e, "Failed to write to job log");
        }
        RelayerError::JobInvocation {
            job: self.name.clone(),
            reason,
        }
    }
}

#[async_trait]
impl Job for CommandJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), RelayerError> {
        let (stdout, stderr) = self
            .log_sink
            .stdio()
            .map_err(|e| self.invocation_error(e.to_string()))?;

        let status = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .await
            .map_err(|e| {
                self.invocation_error(format!(
                    "failed to spawn {}: {e}",
                    self.program.display()
                ))
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(self.invocation_error(format!("{} exited with {status}", self.program.display())))
        }
    }
}

/// A job together with the interval between two of its starts.
#[derive(Clone)]
pub struct RecurringJob {
    job: Arc<dyn Job>,
    interval: Duration,
}

impl RecurringJob {
    /// Schedule `job` every `interval`.
    ///
    /// # Errors
    /// Returns [`RelayerError::Configuration`] if `interval` is zero.
    pub fn new(job: Arc<dyn Job>, interval: Duration) -> Result<Self, RelayerError> {
        if interval.is_zero() {
            return Err(RelayerError::Configuration(format!(
                "interval of job {} must be greater than zero",
                job.name()
            )));
        }
        Ok(Self { job, interval })
    }

    /// The name of the scheduled job.
    #[must_use]
    pub fn name(&self) -> &str {
        self.job.name()
    }

    /// The interval between two starts.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl std::fmt::Debug for RecurringJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecurringJob")
            .field("name", &self.job.name())
            .field("interval", &self.interval)
            .finish()
    }
}

/// Runs a set of recurring jobs until cancelled.
#[derive(Debug, Default)]
pub struct Supervisor {
    jobs: Vec<RecurringJob>,
}

/// The tasks of a started [`Supervisor`].
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct SupervisorHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl Supervisor {
    /// Create a supervisor for `jobs`.
    #[must_use]
    pub const fn new(jobs: Vec<RecurringJob>) -> Self {
        Self { jobs }
    }

    /// Spawns one task per job. The tasks run until `cancel` fires.
    #[must_use]
    pub fn spawn(self, cancel: &CancellationToken) -> SupervisorHandle {
        let tasks = self
            .jobs
            .into_iter()
            .map(|job| {
                let cancel = cancel.clone();
                tokio::spawn(run_recurring(job, cancel))
            })
            .collect();
        SupervisorHandle { tasks }
    }

    /// Runs every job until `cancel` fires and all of them have stopped.
    pub async fn run(self, cancel: &CancellationToken) {
        self.spawn(cancel).join().await;
    }
}

impl SupervisorHandle {
    /// Waits until every job task has stopped.
    pub async fn join(self) {
        for result in join_all(self.tasks).await {
            if let Err(e) = result {
                error!(error = %e, "Recurring job task terminated abnormally");
            }
        }
    }
}

async fn run_recurring(job: RecurringJob, cancel: CancellationToken) {
    let name = job.name().to_string();
    let mut ticker = interval(job.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    metrics::SCHEDULED_JOBS.inc();
    info!(job = %name, interval_secs = job.interval.as_secs_f64(), "Scheduled recurring job");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let invocation_id = Uuid::new_v4();
        let span = info_span!("job_invocation", job = %name, %invocation_id);
        let result = metrics::track_invocation(&name, || job.job.run())
            .instrument(span)
            .await;

        match result {
            Ok(()) => debug!(job = %name, %invocation_id, "Job invocation succeeded"),
            Err(e) => warn!(
                job = %name,
                %invocation_id,
                error = %e,
                "Job invocation failed, retrying at the next interval"
            ),
        }
    }

    metrics::SCHEDULED_JOBS.dec();
    info!(job = %name, "Recurring job stopped");
}
