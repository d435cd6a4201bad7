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

//! Jobs compiled into the host.

use chrono::{DateTime, Utc};
use jobhost_common_engine::{Job, JobContext, JobResult};
use jobhost_scheduler::{BoxError, Container, JobType, ScheduleRegistrar};
use tracing::info;

/// Logs a line every time it fires. Useful to check that a deployment
/// schedules anything at all.
#[derive(Debug, Clone)]
pub struct HeartbeatJob {
    created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Job for HeartbeatJob {
    async fn execute(&self, ctx: Option<&JobContext>) -> JobResult {
        let fire_count = ctx.map(|ctx| ctx.bundle().fire_count());
        info!(
            created_at = %self.created_at,
            fire_count,
            "Heartbeat"
        );
        Ok(())
    }
}

impl JobType for HeartbeatJob {
    fn build(_container: &Container) -> Result<Self, BoxError> {
        Ok(Self {
            created_at: Utc::now(),
        })
    }
}

/// Registers every built-in job under the triggers that name it.
pub fn register_builtin_jobs(registrar: &mut ScheduleRegistrar, run_once_at_startup: bool) {
    registrar.add_compiled_jobs::<HeartbeatJob>(run_once_at_startup);
}

#[cfg(test)]
mod tests {
    use jobhost_scheduler::{JobCatalog, JobDescriptor, TriggerConfig};

    use super::*;

    #[test]
    fn heartbeat_is_named_by_its_rust_path() {
        assert_eq!(HeartbeatJob::type_name(), "jobhost_app::jobs::HeartbeatJob");
    }

    #[tokio::test]
    async fn heartbeat_binds_to_configured_triggers() {
        let triggers = TriggerConfig::new().with_trigger("*/10 * * * *", [JobDescriptor::builder()
            .class_full_name(HeartbeatJob::type_name())
            .build()]);
        let mut registrar = ScheduleRegistrar::new(Some(triggers), JobCatalog::new());
        register_builtin_jobs(&mut registrar, false);

        let schedule = registrar.build();
        assert_eq!(schedule.registrations().len(), 1);

        let job = schedule
            .container()
            .resolve(HeartbeatJob::type_name())
            .unwrap();
        job.execute(None).await.unwrap();
    }
}
