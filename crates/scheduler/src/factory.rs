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

use std::time::Duration;

use jobhost_common_engine::{Job, JobContext, JobFactory, JobResult, TriggerFiredBundle};
use jobhost_error::innermost_cause;
use tracing::{error, info};

use crate::{container::Container, metrics::FACTORY_FALLBACKS};

/// Message logged by [`NoopJob`] every time it runs.
pub const NOOP_JOB_MESSAGE: &str = "Could not create the scheduled job, ran a do-nothing job instead";

const NOOP_JOB_DELAY: Duration = Duration::from_millis(100);

/// [`JobFactory`] resolving job instances from a [`Container`].
///
/// Never fails: a job type that cannot be resolved is logged and replaced by
/// a [`NoopJob`], so one broken registration cannot disturb the engine.
#[derive(Debug, Clone)]
pub struct ContainerJobFactory {
    container: Container,
}

impl ContainerJobFactory {
    #[must_use]
    pub const fn new(container: Container) -> Self { Self { container } }

    /// Job registered under `job_type`, or a [`NoopJob`].
    #[must_use]
    pub fn create(&self, job_type: &str) -> Box<dyn Job> {
        match self.container.resolve(job_type) {
            Ok(job) => job,
            Err(err) => {
                let cause = innermost_cause(&err);
                error!(
                    job = job_type,
                    error = %err,
                    cause = %cause,
                    "Failed to create job, giving up and returning a do-nothing job"
                );
                FACTORY_FALLBACKS.with_label_values(&[job_type]).inc();
                Box::new(NoopJob)
            }
        }
    }
}

impl JobFactory for ContainerJobFactory {
    fn new_job(&self, bundle: &TriggerFiredBundle) -> Box<dyn Job> { self.create(bundle.job_type()) }

    // Instances are owned by the container.
    fn return_job(&self, _job: Box<dyn Job>) {}
}

/// Stand-in for a job that could not be resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopJob;

#[async_trait::async_trait]
impl Job for NoopJob {
    async fn execute(&self, ctx: Option<&JobContext>) -> JobResult {
        tokio::time::sleep(NOOP_JOB_DELAY).await;
        info!(job = ctx.map(JobContext::job_type), "{NOOP_JOB_MESSAGE}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{container::constructor, error::BoxError};

    struct Real;

    #[async_trait::async_trait]
    impl Job for Real {
        async fn execute(&self, _ctx: Option<&JobContext>) -> JobResult { Ok(()) }
    }

    fn factory() -> ContainerJobFactory {
        let mut builder = Container::builder();
        builder
            .add_transient("app::Real", constructor(|_| Ok(Box::new(Real))))
            .add_transient(
                "app::Broken",
                constructor(|_| Err(BoxError::from("connection refused"))),
            )
            .add_transient("app::Panics", constructor(|_| panic!("bad constructor")));
        ContainerJobFactory::new(builder.build())
    }

    #[tokio::test(start_paused = true)]
    async fn never_fails_for_any_identifier() {
        let factory = factory();

        let begin = tokio::time::Instant::now();
        factory.create("app::Real").execute(None).await.unwrap();
        assert!(begin.elapsed() < NOOP_JOB_DELAY, "app::Real resolves to itself");

        // app::Broken is counted by `fallbacks_are_counted`, which may run
        // concurrently.
        let begin = tokio::time::Instant::now();
        factory.create("app::Broken").execute(None).await.unwrap();
        assert!(begin.elapsed() >= NOOP_JOB_DELAY);

        for name in ["app::Panics", "app::Unknown", ""] {
            let before = FACTORY_FALLBACKS.with_label_values(&[name]).get();
            let job = factory.create(name);
            assert_eq!(
                FACTORY_FALLBACKS.with_label_values(&[name]).get(),
                before + 1,
                "{name:?} falls back to the do-nothing job"
            );

            let begin = tokio::time::Instant::now();
            assert!(job.execute(None).await.is_ok(), "{name:?} yields a runnable job");
            assert!(begin.elapsed() >= NOOP_JOB_DELAY);
        }
    }

    #[test]
    fn fallbacks_are_counted() {
        let factory = factory();
        let before = FACTORY_FALLBACKS.with_label_values(&["app::Broken"]).get();
        let _ = factory.create("app::Broken");
        let _ = factory.create("app::Broken");
        assert_eq!(
            FACTORY_FALLBACKS.with_label_values(&["app::Broken"]).get(),
            before + 2
        );
        let real_before = FACTORY_FALLBACKS.with_label_values(&["app::Real"]).get();
        let _ = factory.create("app::Real");
        assert_eq!(
            FACTORY_FALLBACKS.with_label_values(&["app::Real"]).get(),
            real_before
        );
    }

    #[test]
    fn return_job_is_a_no_op() {
        let factory = Arc::new(factory());
        let job = factory.create("app::Real");
        factory.return_job(job);
    }
}
