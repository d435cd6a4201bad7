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

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use jobhost_common_engine::{Job, JobContext, JobError, JobResult};
use jobhost_scheduler::{
    BoxError, Container, JobCatalog, JobType, ScheduleRegistrar, StartupError, TriggerConfig,
};

/// Shared log of when each startup run began and ended.
#[derive(Default)]
struct Timeline {
    started:  Mutex<Vec<Instant>>,
    finished: AtomicUsize,
}

macro_rules! slow_job {
    ($name:ident) => {
        struct $name {
            timeline: Arc<Timeline>,
        }

        #[async_trait::async_trait]
        impl Job for $name {
            async fn execute(&self, ctx: Option<&JobContext>) -> JobResult {
                assert!(ctx.is_none(), "startup runs carry no context");
                self.timeline.started.lock().unwrap().push(Instant::now());
                tokio::time::sleep(Duration::from_millis(200)).await;
                self.timeline.finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        impl JobType for $name {
            fn build(container: &Container) -> Result<Self, BoxError> {
                Ok(Self {
                    timeline: container.require::<Timeline>()?,
                })
            }
        }
    };
}

slow_job!(FirstReport);
slow_job!(SecondReport);
slow_job!(ThirdReport);

fn descriptor(class: &str) -> jobhost_scheduler::JobDescriptor {
    jobhost_scheduler::JobDescriptor::builder()
        .class_full_name(class)
        .build()
}

#[tokio::test]
async fn test_startup_runs_are_concurrent() {
    let timeline = Arc::new(Timeline::default());
    let triggers = TriggerConfig::new().with_trigger("0 0 * * *", [
        descriptor(FirstReport::type_name()),
        descriptor(SecondReport::type_name()),
        descriptor(ThirdReport::type_name()),
    ]);
    let mut registrar = ScheduleRegistrar::new(Some(triggers), JobCatalog::new());
    registrar.services_mut().add_shared(Arc::clone(&timeline));
    registrar.add_compiled_jobs::<FirstReport>(false);
    registrar.add_compiled_jobs::<SecondReport>(false);
    registrar.add_compiled_jobs::<ThirdReport>(false);
    let schedule = registrar.build();

    let begin = Instant::now();
    let runs = schedule.startup_runner().run_all().await.unwrap();
    let elapsed = begin.elapsed();

    assert_eq!(runs, 3);
    assert_eq!(timeline.finished.load(Ordering::SeqCst), 3, "returns after all finish");
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(550), "runs overlapped, took {elapsed:?}");

    let started = timeline.started.lock().unwrap().clone();
    let first = started.iter().min().unwrap();
    let last = started.iter().max().unwrap();
    assert!(
        last.duration_since(*first) < Duration::from_millis(50),
        "all runs start within 50ms of each other"
    );
}

struct Failing;

#[async_trait::async_trait]
impl Job for Failing {
    async fn execute(&self, _ctx: Option<&JobContext>) -> JobResult {
        Err(JobError::transient("warehouse offline"))
    }
}

impl JobType for Failing {
    fn build(_container: &Container) -> Result<Self, BoxError> { Ok(Self) }
}

struct Counting {
    runs: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Job for Counting {
    async fn execute(&self, _ctx: Option<&JobContext>) -> JobResult {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl JobType for Counting {
    fn build(container: &Container) -> Result<Self, BoxError> {
        Ok(Self {
            runs: container.require::<AtomicUsize>()?,
        })
    }
}

struct NeedsDatabase;

#[async_trait::async_trait]
impl Job for NeedsDatabase {
    async fn execute(&self, _ctx: Option<&JobContext>) -> JobResult { Ok(()) }
}

struct Database;

impl JobType for NeedsDatabase {
    fn build(container: &Container) -> Result<Self, BoxError> {
        container.require::<Database>()?;
        Ok(Self)
    }
}

#[tokio::test]
async fn test_failure_is_reported_after_everything_finished() {
    let runs = Arc::new(AtomicUsize::new(0));
    let triggers = TriggerConfig::new().with_trigger("0 0 * * *", [
        descriptor(Failing::type_name()),
        descriptor(Counting::type_name()),
    ]);
    let mut registrar = ScheduleRegistrar::new(Some(triggers), JobCatalog::new());
    registrar.services_mut().add_shared(Arc::clone(&runs));
    registrar.add_compiled_jobs::<Failing>(false);
    registrar.add_compiled_jobs::<Counting>(false);
    let schedule = registrar.build();

    let err = schedule.startup_runner().run_all().await.unwrap_err();
    assert!(matches!(err, StartupError::StartupJob { .. }));
    assert_eq!(err.job_type(), Failing::type_name());
    assert_eq!(runs.load(Ordering::SeqCst), 1, "other runs complete despite the failure");
}

#[tokio::test]
async fn test_resolution_failure_counts_as_startup_failure() {
    let triggers = TriggerConfig::new().with_trigger("", [descriptor(NeedsDatabase::type_name())]);
    let mut registrar = ScheduleRegistrar::new(Some(triggers), JobCatalog::new());
    registrar.add_compiled_jobs::<NeedsDatabase>(false);
    let schedule = registrar.build();

    let err = schedule.startup_runner().run_all().await.unwrap_err();
    assert!(matches!(err, StartupError::StartupResolve { .. }));
    assert!(jobhost_error::ErrorExt::output_msg(&err).contains("Database"));
}

#[tokio::test]
async fn test_only_registered_types_run() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut registrar = ScheduleRegistrar::new(None, JobCatalog::new().with::<Counting>());
    registrar.services_mut().add_shared(Arc::clone(&runs));
    let schedule = registrar.build();

    let runner = schedule.startup_runner();
    assert!(runner.eligible_job_types().is_empty());
    assert_eq!(runner.run_all().await.unwrap(), 0);
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_compiled_job_under_two_triggers_runs_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let triggers = TriggerConfig::new()
        .with_trigger("0 0 * * *", [descriptor(Counting::type_name())])
        .with_trigger("0 12 * * *", [descriptor(Counting::type_name())]);
    let mut registrar = ScheduleRegistrar::new(Some(triggers), JobCatalog::new());
    registrar.services_mut().add_shared(Arc::clone(&runs));
    registrar.add_compiled_jobs::<Counting>(true);
    let schedule = registrar.build();
    assert_eq!(schedule.registrations().len(), 4);

    let runner = schedule.startup_runner();
    assert_eq!(runner.eligible_job_types().len(), 1);
    assert_eq!(runner.run_all().await.unwrap(), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// Counts how often [`Shared`] is built and run.
#[derive(Default)]
struct SharedTally {
    built: AtomicUsize,
    ran:   AtomicUsize,
}

struct Shared {
    tally: Arc<SharedTally>,
}

#[async_trait::async_trait]
impl Job for Shared {
    async fn execute(&self, _ctx: Option<&JobContext>) -> JobResult {
        self.tally.ran.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl JobType for Shared {
    fn build(container: &Container) -> Result<Self, BoxError> {
        let tally = container.require::<SharedTally>()?;
        tally.built.fetch_add(1, Ordering::SeqCst);
        Ok(Self { tally })
    }
}

#[tokio::test]
async fn test_singleton_is_built_once_across_triggers() {
    let tally = Arc::new(SharedTally::default());
    let triggers = TriggerConfig::new()
        .with_trigger("0 0 * * *", [descriptor(Shared::type_name())])
        .with_trigger("0 12 * * *", [descriptor(Shared::type_name())]);
    let mut registrar = ScheduleRegistrar::new(Some(triggers), JobCatalog::new());
    registrar.services_mut().add_shared(Arc::clone(&tally));
    assert_eq!(registrar.add_compiled_singleton_jobs::<Shared>(false), 2);
    let schedule = registrar.build();

    assert_eq!(schedule.startup_runner().run_all().await.unwrap(), 1);
    let factory = schedule.job_factory();
    factory.create(Shared::type_name()).execute(None).await.unwrap();
    factory.create(Shared::type_name()).execute(None).await.unwrap();

    assert_eq!(tally.built.load(Ordering::SeqCst), 1);
    assert_eq!(tally.ran.load(Ordering::SeqCst), 3);
}
