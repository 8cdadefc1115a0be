//! Background job scheduler.
//!
//! Registers the recurring poll cycle at server startup. The poller's own
//! run-lock serializes overlapping triggers, so a scheduled run that lands
//! while a manual run is in flight is skipped, not queued.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use repwatch_poller::{CycleError, Poller};

/// Every 15 minutes, on the hour boundary grid.
const POLL_SCHEDULE: &str = "0 */15 * * * *";

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process; dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(poller: Arc<Poller>) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(POLL_SCHEDULE, move |_uuid, _lock| {
        let poller = Arc::clone(&poller);
        Box::pin(async move {
            tracing::info!("scheduler: starting poll cycle");
            match poller.run_cycle().await {
                Ok(report) => {
                    tracing::info!(
                        polled = report.polled,
                        errors = report.errors,
                        alerts_sent = report.alerts_sent,
                        "scheduler: poll cycle complete"
                    );
                }
                Err(CycleError::CycleInProgress) => {
                    tracing::debug!("scheduler: cycle already in flight, skipping this tick");
                }
                Err(e) => {
                    tracing::error!(error = %e, "scheduler: poll cycle failed");
                }
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    Ok(scheduler)
}
