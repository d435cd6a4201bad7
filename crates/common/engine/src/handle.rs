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

use tokio_util::sync::CancellationToken;

use crate::{id::ScheduleId, trigger::Trigger};

/// Handle to one running schedule.
///
/// Cloning is cheap; every clone controls the same schedule. Dropping the
/// handle does not stop the schedule.
#[derive(Debug, Clone)]
pub struct ScheduleHandle {
    id:       ScheduleId,
    job_type: Arc<str>,
    trigger:  Trigger,
    token:    CancellationToken,
}

impl ScheduleHandle {
    pub(crate) fn new(
        id: ScheduleId,
        job_type: Arc<str>,
        trigger: Trigger,
        token: CancellationToken,
    ) -> Self {
        Self {
            id,
            job_type,
            trigger,
            token,
        }
    }

    pub const fn id(&self) -> ScheduleId { self.id }

    pub fn job_type(&self) -> &str { &self.job_type }

    pub const fn trigger(&self) -> &Trigger { &self.trigger }

    /// Stop firing this schedule. Executions already running are not
    /// interrupted.
    pub fn unschedule(&self) { self.token.cancel(); }

    /// `false` once the schedule was unscheduled, stopped by a fatal job
    /// error, exhausted (`Once` after its single firing) or the scheduler shut
    /// down.
    pub fn is_active(&self) -> bool { !self.token.is_cancelled() }
}
