//! Metrics module for the relayer.

#![allow(missing_docs)]

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};
use std::{sync::LazyLock, time::Instant};

/// Prometheus metric for job invocations, distinguished by job and outcome
pub static JOB_INVOCATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "hub_relayer_job_invocations_total",
        "Total number of recurring job invocations",
        &["job", "outcome"]
    )
    .unwrap()
});

/// Prometheus metric for job invocation duration in seconds, distinguished by job
pub static JOB_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "hub_relayer_job_duration_seconds",
        "Recurring job invocation duration in seconds",
        &["job"]
    )
    .unwrap()
});

/// Prometheus metric for the number of scheduled recurring jobs
pub static SCHEDULED_JOBS: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("hub_relayer_scheduled_jobs", "Scheduled recurring jobs").unwrap()
});

/// Records the duration and outcome of a single job invocation.
pub async fn track_invocation<F, Fut, E>(job: &str, f: F) -> Result<(), E>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<(), E>>,
{
    let timer = Instant::now();
    let result = f().await;
    let outcome = if result.is_ok() { "success" } else { "failure" };

    JOB_DURATION
        .with_label_values(&[job])
        .observe(timer.elapsed().as_secs_f64());
    JOB_INVOCATIONS.with_label_values(&[job, outcome]).inc();

    result
}
