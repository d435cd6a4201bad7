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

use std::{collections::BTreeSet, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use jobhost_common_engine::Job;
use jobhost_error::ErrorExt;
use snafu::{IntoError, ResultExt};
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::{
    error::{StartupError, StartupJobSnafu, StartupPanickedSnafu, StartupResolveSnafu, panic_message},
    metrics::STARTUP_RUN_FAILURES,
    registrar::Schedule,
};

/// Runs every registered job once, right away, outside of its triggers.
#[derive(Debug, Clone)]
pub struct StartupRunner {
    schedule: Arc<Schedule>,
}

impl StartupRunner {
    #[must_use]
    pub const fn new(schedule: Arc<Schedule>) -> Self { Self { schedule } }

    /// Distinct registered job types the catalog knows, sorted by name.
    #[must_use]
    pub fn eligible_job_types(&self) -> Vec<Arc<str>> {
        let catalog = self.schedule.catalog();
        self.schedule
            .registrations()
            .iter()
            .map(|registration| registration.shared_job_type())
            .filter(|job_type| catalog.contains(job_type))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Executes every instance registered under every eligible job type with
    /// no context, all concurrently, and waits for all of them.
    ///
    /// A failure never stops the other runs. Once everything has finished,
    /// the first failure to complete is returned; every failure is logged.
    /// On success, returns the number of runs.
    pub async fn run_all(&self) -> Result<usize, StartupError> {
        info!("Started running registered jobs on start");
        let container = self.schedule.container();

        let mut failures = Vec::new();
        let mut runs = JoinSet::new();
        for job_type in self.eligible_job_types() {
            for instance in container.resolve_all(&job_type) {
                match instance {
                    Ok(job) => {
                        runs.spawn(run_one(Arc::clone(&job_type), job));
                    }
                    Err(e) => {
                        failures.push(StartupResolveSnafu { job_type: &*job_type }.into_error(e));
                    }
                }
            }
        }

        let mut succeeded = 0usize;
        while let Some(joined) = runs.join_next().await {
            match joined {
                Ok(Ok(())) => succeeded += 1,
                Ok(Err(e)) => failures.push(e),
                Err(e) => error!(error = ?e, "Startup run task was cancelled"),
            }
        }

        for failure in &failures {
            STARTUP_RUN_FAILURES
                .with_label_values(&[failure.job_type()])
                .inc();
            error!(
                job = failure.job_type(),
                status = %failure.status_code(),
                error = %failure.output_msg(),
                "Startup run failed"
            );
        }
        info!(
            succeeded,
            failed = failures.len(),
            "End running registered jobs on start"
        );

        match failures.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(succeeded),
        }
    }
}

async fn run_one(job_type: Arc<str>, job: Box<dyn Job>) -> Result<(), StartupError> {
    match AssertUnwindSafe(job.execute(None)).catch_unwind().await {
        Ok(result) => result.context(StartupJobSnafu { job_type: &*job_type }),
        Err(payload) => StartupPanickedSnafu {
            job_type: &*job_type,
            message:  panic_message(payload.as_ref()),
        }
        .fail(),
    }
}
