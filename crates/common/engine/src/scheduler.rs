// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use chrono::Utc;
use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, warn};

use crate::{
    config::SchedulerConfig,
    driver::TriggerDriver,
    handle::ScheduleHandle,
    id::ScheduleId,
    job::{Job, JobContext, JobFactory, TriggerFiredBundle},
    metrics::{
        JOB_EXECUTION_DURATION_SECONDS, JOB_EXECUTION_ERRORS, JOB_EXECUTIONS, SCHEDULE_ACTIVE,
        SCHEDULE_STARTED, SCHEDULE_STOPPED,
    },
    trigger::Trigger,
};

/// Fires schedules and runs the jobs they produce.
///
/// Every schedule gets its own trigger loop task. When a trigger fires, the
/// loop asks the [`JobFactory`] for an instance and spawns the execution as a
/// separate task, so a slow job never delays the next firing of its own or any
/// other schedule.
pub struct Scheduler {
    cancel_token:     CancellationToken,
    shutdown_timeout: Duration,
    factory:          Arc<dyn JobFactory>,
    loops:            JoinSet<()>,
    executions:       TaskTracker,
}

impl Scheduler {
    /// Create a scheduler. Must be called from within a tokio runtime before
    /// any [`schedule`](Self::schedule) call.
    pub fn new(config: &SchedulerConfig, factory: Arc<dyn JobFactory>) -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            shutdown_timeout: config.shutdown_timeout(),
            factory,
            loops: JoinSet::new(),
            executions: TaskTracker::new(),
        }
    }

    /// Start firing `job_type` on `trigger`. The first firing of a
    /// [`Trigger::Once`] happens right away.
    pub fn schedule(&mut self, job_type: impl Into<Arc<str>>, trigger: Trigger) -> ScheduleHandle {
        let id = ScheduleId::new();
        let job_type = job_type.into();
        let token = self.cancel_token.child_token();

        self.loops.spawn(run_schedule(
            id,
            Arc::clone(&job_type),
            trigger.clone(),
            token.clone(),
            Arc::clone(&self.factory),
            self.executions.clone(),
        ));

        ScheduleHandle::new(id, job_type, trigger, token)
    }

    /// Number of trigger loops that have not been reaped yet.
    pub fn len(&self) -> usize { self.loops.len() }

    pub fn is_empty(&self) -> bool { self.loops.is_empty() }

    /// Stop every schedule and wait for in-flight executions.
    ///
    /// Trigger loops stop immediately. Executions that are still running after
    /// the configured shutdown timeout are abandoned and reported.
    pub async fn shutdown(mut self) {
        info!("Shutting down scheduler");
        self.cancel_token.cancel();

        let mut stopped = 0usize;
        while let Some(result) = self.loops.join_next().await {
            stopped += 1;
            if let Err(e) = result
                && !e.is_cancelled()
            {
                error!(error = ?e, "Schedule task failed during shutdown");
            }
        }

        self.executions.close();
        if tokio::time::timeout(self.shutdown_timeout, self.executions.wait())
            .await
            .is_err()
        {
            error!(
                timeout = ?self.shutdown_timeout,
                in_flight = self.executions.len(),
                "Shutdown timeout reached, abandoning running jobs"
            );
        } else {
            info!(schedules = stopped, "Scheduler shutdown complete");
        }
    }
}

async fn run_schedule(
    id: ScheduleId,
    job_type: Arc<str>,
    trigger: Trigger,
    token: CancellationToken,
    factory: Arc<dyn JobFactory>,
    executions: TaskTracker,
) {
    let name: &str = &job_type;
    info!(job = name, trigger = %trigger, schedule = %id, "Schedule started");
    SCHEDULE_STARTED.with_label_values(&[name]).inc();
    SCHEDULE_ACTIVE.with_label_values(&[name]).inc();

    let mut driver = TriggerDriver::new(&trigger);
    let mut fire_count = 0u64;
    while let Some(fire) = driver.wait_next(&token).await {
        fire_count += 1;
        let bundle = TriggerFiredBundle::new(
            id,
            Arc::clone(&job_type),
            trigger.clone(),
            Utc::now(),
            fire.scheduled_at,
            fire.next_at,
            fire_count,
        );
        debug!(job = name, fire_count, next = ?fire.next_at, "Trigger fired");

        let job = factory.new_job(&bundle);
        let ctx = JobContext::new(bundle, token.child_token());
        executions.spawn(execute(job, ctx, Arc::clone(&factory), token.clone()));
    }

    // Marks handles inactive once a Once trigger is exhausted.
    token.cancel();
    SCHEDULE_ACTIVE.with_label_values(&[name]).dec();
    SCHEDULE_STOPPED.with_label_values(&[name]).inc();
    info!(job = name, schedule = %id, fired = fire_count, "Schedule stopped");
}

async fn execute(
    job: Box<dyn Job>,
    ctx: JobContext,
    factory: Arc<dyn JobFactory>,
    schedule_token: CancellationToken,
) {
    let name = ctx.job_type().to_owned();
    let start = std::time::Instant::now();
    let outcome = AssertUnwindSafe(job.execute(Some(&ctx)))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(())) => {
            JOB_EXECUTIONS.with_label_values(&[&name]).inc();
            JOB_EXECUTION_DURATION_SECONDS
                .with_label_values(&[&name])
                .observe(start.elapsed().as_secs_f64());
            debug!(job = %name, elapsed = ?start.elapsed(), "Job completed");
        }
        Ok(Err(e)) if e.is_fatal() => {
            JOB_EXECUTION_ERRORS.with_label_values(&[&name]).inc();
            error!(job = %name, error = %e, "Job failed fatally, unscheduling");
            schedule_token.cancel();
        }
        Ok(Err(e)) => {
            JOB_EXECUTION_ERRORS.with_label_values(&[&name]).inc();
            warn!(job = %name, error = %e, "Job failed");
        }
        Err(_) => {
            JOB_EXECUTION_ERRORS.with_label_values(&[&name]).inc();
            error!(job = %name, "Job panicked");
        }
    }

    factory.return_job(job);
}
