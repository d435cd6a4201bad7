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

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::{err::JobResult, id::ScheduleId, trigger::Trigger};

/// A unit of work the engine can run.
///
/// `execute` receives `None` when the job is forced to run outside of any
/// trigger (for example once at process start), so implementations must not
/// depend on the context being present. Jobs may run on any worker thread and
/// several executions of the same job type may overlap.
#[async_trait::async_trait]
pub trait Job: Send + Sync + 'static {
    async fn execute(&self, ctx: Option<&JobContext>) -> JobResult;
}

/// Everything the engine knows about one firing of a schedule. Handed to the
/// [`JobFactory`] so it can pick the job instance to run.
#[derive(Debug, Clone)]
pub struct TriggerFiredBundle {
    schedule_id:       ScheduleId,
    job_type:          Arc<str>,
    trigger:           Trigger,
    fired_at:          DateTime<Utc>,
    scheduled_fire_at: DateTime<Utc>,
    next_fire_at:      Option<DateTime<Utc>>,
    fire_count:        u64,
}

impl TriggerFiredBundle {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        schedule_id: ScheduleId,
        job_type: Arc<str>,
        trigger: Trigger,
        fired_at: DateTime<Utc>,
        scheduled_fire_at: DateTime<Utc>,
        next_fire_at: Option<DateTime<Utc>>,
        fire_count: u64,
    ) -> Self {
        Self {
            schedule_id,
            job_type,
            trigger,
            fired_at,
            scheduled_fire_at,
            next_fire_at,
            fire_count,
        }
    }

    pub const fn schedule_id(&self) -> ScheduleId { self.schedule_id }

    /// Identifier of the job type the schedule was created for.
    pub fn job_type(&self) -> &str { &self.job_type }

    pub const fn trigger(&self) -> &Trigger { &self.trigger }

    /// Wall-clock time the engine actually fired.
    pub const fn fired_at(&self) -> DateTime<Utc> { self.fired_at }

    /// Time the trigger was due. Equal to `fired_at` for `Once` triggers.
    pub const fn scheduled_fire_at(&self) -> DateTime<Utc> { self.scheduled_fire_at }

    pub const fn next_fire_at(&self) -> Option<DateTime<Utc>> { self.next_fire_at }

    /// 1-based count of firings of this schedule, including this one.
    pub const fn fire_count(&self) -> u64 { self.fire_count }
}

/// Context passed to a job fired by a trigger.
#[derive(Debug, Clone)]
pub struct JobContext {
    bundle:       TriggerFiredBundle,
    cancel_token: CancellationToken,
}

impl JobContext {
    pub(crate) fn new(bundle: TriggerFiredBundle, cancel_token: CancellationToken) -> Self {
        Self {
            bundle,
            cancel_token,
        }
    }

    pub const fn bundle(&self) -> &TriggerFiredBundle { &self.bundle }

    pub fn job_type(&self) -> &str { self.bundle.job_type() }

    pub const fn trigger(&self) -> &Trigger { self.bundle.trigger() }

    pub const fn fired_at(&self) -> DateTime<Utc> { self.bundle.fired_at() }

    /// Check if the engine is shutting down.
    pub fn is_cancelled(&self) -> bool { self.cancel_token.is_cancelled() }

    /// Wait for the engine to shut down.
    pub async fn cancelled(&self) { self.cancel_token.cancelled().await }

    /// Get a child cancellation token for sub-tasks.
    pub fn child_token(&self) -> CancellationToken { self.cancel_token.child_token() }
}

/// Produces job instances when a trigger fires.
///
/// The engine calls `new_job` on every firing and expects an instance back
/// unconditionally: implementations must not panic and have no way to report
/// a failure, so they are expected to substitute a placeholder job when the
/// real one cannot be built.
pub trait JobFactory: Send + Sync + 'static {
    fn new_job(&self, bundle: &TriggerFiredBundle) -> Box<dyn Job>;

    /// Called with the instance once its execution has finished.
    fn return_job(&self, job: Box<dyn Job>);
}
