//! Scheduled collection.
//!
//! Registers the profile and post cycles on their cron schedules and keeps
//! the [`JobScheduler`] alive until the process is asked to stop. The two
//! jobs share one lock so cycles never overlap against the same tables.

use std::sync::Arc;

use boosterdb_collector::CycleTarget;
use boosterdb_core::AppConfig;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::collect::PgCollector;

/// Run both collection jobs until ctrl-c or SIGTERM.
///
/// # Errors
///
/// Returns an error if a schedule does not parse or the scheduler fails to
/// start or stop.
pub(crate) async fn run_watch(
    collector: Arc<PgCollector>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let mut scheduler = build_scheduler(collector, config).await?;
    tracing::info!(
        profile_schedule = %config.profile_schedule,
        post_schedule = %config.post_schedule,
        "watch mode started"
    );

    shutdown_signal().await;
    scheduler.shutdown().await?;
    tracing::info!("watch mode stopped");
    Ok(())
}

/// Builds and starts the scheduler with one job per cycle target.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
async fn build_scheduler(
    collector: Arc<PgCollector>,
    config: &AppConfig,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    let gate = Arc::new(Mutex::new(()));

    register_cycle_job(
        &scheduler,
        Arc::clone(&collector),
        Arc::clone(&gate),
        &config.profile_schedule,
        CycleTarget::Profiles,
    )
    .await?;
    register_cycle_job(
        &scheduler,
        collector,
        gate,
        &config.post_schedule,
        CycleTarget::Posts,
    )
    .await?;

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_cycle_job(
    scheduler: &JobScheduler,
    collector: Arc<PgCollector>,
    gate: Arc<Mutex<()>>,
    schedule: &str,
    target: CycleTarget,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let collector = Arc::clone(&collector);
        let gate = Arc::clone(&gate);

        Box::pin(async move {
            let _running = gate.lock().await;
            tracing::info!(?target, "scheduler: starting collection cycle");
            match collector.run_collection_cycle(target).await {
                Ok(summary) if summary.has_failures() => {
                    tracing::warn!(
                        ?target,
                        failures = summary.failures.len(),
                        "scheduler: cycle finished with failures\n{}",
                        summary.failures
                    );
                }
                Ok(summary) => {
                    tracing::info!(
                        ?target,
                        total = summary.total,
                        events = summary.events_recorded,
                        "scheduler: cycle complete"
                    );
                }
                Err(e) => {
                    tracing::error!(?target, error = %e, "scheduler: collection cycle aborted");
                }
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal");
}
