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

use std::{fmt, sync::Arc};

use jobhost_common_engine::{CronParseError, Trigger};
use tracing::{debug, info, warn};

use crate::{
    catalog::{CatalogEntry, JobCatalog, JobType, module_of},
    config::{FIRE_ONCE, TriggerConfig},
    container::{Container, ContainerBuilder, Lifetime},
    factory::ContainerJobFactory,
    metrics::UNRESOLVED_DESCRIPTORS,
    plugin::PluginResolver,
    startup::StartupRunner,
};

/// Binds one job type to one trigger expression. An empty expression fires
/// once, right away.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobScheduleRegistration {
    job_type:        Arc<str>,
    cron_expression: Arc<str>,
}

impl JobScheduleRegistration {
    pub fn new(job_type: impl Into<Arc<str>>, cron_expression: impl Into<Arc<str>>) -> Self {
        Self {
            job_type:        job_type.into(),
            cron_expression: cron_expression.into(),
        }
    }

    #[must_use]
    pub fn job_type(&self) -> &str { &self.job_type }

    #[must_use]
    pub fn cron_expression(&self) -> &str { &self.cron_expression }

    #[must_use]
    pub fn is_fire_once(&self) -> bool { self.cron_expression.trim().is_empty() }

    /// Engine trigger for this registration.
    pub fn trigger(&self) -> Result<Trigger, CronParseError> {
        if self.is_fire_once() {
            Ok(Trigger::Once)
        } else {
            Trigger::cron(&self.cron_expression)
        }
    }

    pub(crate) fn shared_job_type(&self) -> Arc<str> { Arc::clone(&self.job_type) }
}

impl fmt::Display for JobScheduleRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_fire_once() {
            write!(f, "{} @ once", self.job_type)
        } else {
            write!(f, "{} @ {}", self.job_type, self.cron_expression)
        }
    }
}

/// Turns trigger configuration into registrations and job services.
///
/// ```rust
/// use jobhost_common_engine::{Job, JobContext, JobResult};
/// use jobhost_scheduler::{
///     BoxError, Container, JobCatalog, JobDescriptor, JobType, ScheduleRegistrar, TriggerConfig,
/// };
///
/// struct Cleanup;
///
/// #[async_trait::async_trait]
/// impl Job for Cleanup {
///     async fn execute(&self, _ctx: Option<&JobContext>) -> JobResult { Ok(()) }
/// }
///
/// impl JobType for Cleanup {
///     fn build(_container: &Container) -> Result<Self, BoxError> { Ok(Self) }
/// }
///
/// let triggers = TriggerConfig::new().with_trigger("0 0 * * *", [JobDescriptor::builder()
///     .class_full_name(Cleanup::type_name())
///     .build()]);
///
/// let mut registrar = ScheduleRegistrar::new(Some(triggers), JobCatalog::new());
/// registrar.add_compiled_jobs::<Cleanup>(true);
///
/// let schedule = registrar.build();
/// let crons: Vec<_> = schedule.registrations().iter().map(|r| r.cron_expression()).collect();
/// assert_eq!(crons, vec!["0 0 * * *", ""]);
/// ```
pub struct ScheduleRegistrar {
    triggers:      Option<TriggerConfig>,
    catalog:       JobCatalog,
    services:      ContainerBuilder,
    registrations: Vec<JobScheduleRegistration>,
}

impl ScheduleRegistrar {
    /// `triggers` is `None` when the configuration has no trigger section;
    /// every configuration-driven call then registers nothing.
    #[must_use]
    pub fn new(triggers: Option<TriggerConfig>, catalog: JobCatalog) -> Self {
        Self {
            triggers,
            catalog,
            services: ContainerBuilder::new(),
            registrations: Vec::new(),
        }
    }

    /// Services and resources jobs are built from.
    pub fn services_mut(&mut self) -> &mut ContainerBuilder { &mut self.services }

    #[must_use]
    pub const fn catalog(&self) -> &JobCatalog { &self.catalog }

    #[must_use]
    pub fn registrations(&self) -> &[JobScheduleRegistration] { &self.registrations }

    /// Registers `J` as a transient service under every trigger whose
    /// compiled-in descriptors name it. Returns the number of (trigger, job)
    /// pairs bound.
    pub fn add_compiled_jobs<J: JobType>(&mut self, run_once_at_startup: bool) -> usize {
        self.add_compiled::<J>(Lifetime::Transient, run_once_at_startup)
    }

    /// Like [`add_compiled_jobs`](Self::add_compiled_jobs), sharing one
    /// instance of `J` across all firings.
    pub fn add_compiled_singleton_jobs<J: JobType>(&mut self, run_once_at_startup: bool) -> usize {
        self.add_compiled::<J>(Lifetime::Singleton, run_once_at_startup)
    }

    fn add_compiled<J: JobType>(&mut self, lifetime: Lifetime, run_once_at_startup: bool) -> usize {
        self.catalog.register::<J>();
        let entry = CatalogEntry::compiled::<J>();
        // One service per call, however many triggers name J.
        self.services
            .add_service(entry.shared_name(), lifetime, entry.constructor());
        let name = entry.name();

        let Some(triggers) = &self.triggers else {
            debug!(job = name, "No trigger configuration, nothing to register");
            return 0;
        };

        // Only types of J's own module whose name is exactly J's qualify.
        let candidates: Vec<CatalogEntry> = self
            .catalog
            .in_module(module_of(name))
            .filter(|candidate| candidate.name() == name)
            .cloned()
            .collect();

        let pairs: Vec<(String, CatalogEntry)> = triggers
            .descriptors()
            .filter(|(_, descriptor)| descriptor.is_compiled_in())
            .filter_map(|(key, descriptor)| {
                candidates
                    .iter()
                    .find(|candidate| candidate.name() == descriptor.class_full_name)
                    .map(|candidate| (key.to_string(), candidate.clone()))
            })
            .collect();

        if pairs.is_empty() {
            debug!(job = name, "Job is not configured under any trigger");
        }
        for (key, matched) in &pairs {
            self.schedule_on(key, matched, run_once_at_startup);
        }
        pairs.len()
    }

    /// Resolves every descriptor that names a plugin module and registers the
    /// job types found as transient services. Descriptors that cannot be
    /// resolved are logged and skipped. Returns the number of (trigger, job)
    /// pairs bound.
    pub async fn add_plugin_jobs(
        &mut self,
        resolver: &PluginResolver,
        run_once_at_startup: bool,
    ) -> usize {
        let Some(triggers) = self.triggers.clone() else {
            debug!("No trigger configuration, no plugin jobs to register");
            return 0;
        };

        let mut bound = 0;
        for (key, descriptor) in triggers.descriptors() {
            if descriptor.is_compiled_in() {
                continue;
            }
            info!(
                job = %descriptor.class_full_name,
                module = descriptor.plugin_filename(),
                directory = descriptor.assembly_directory.as_deref(),
                "Adding plugin job"
            );
            let Some(entry) = resolver.resolve(descriptor).await else {
                UNRESOLVED_DESCRIPTORS.inc();
                warn!(job = %descriptor.class_full_name, "Could not register job");
                continue;
            };
            self.catalog.insert(entry.clone());
            self.services
                .add_transient(entry.shared_name(), entry.constructor());
            self.schedule_on(key, &entry, run_once_at_startup);
            bound += 1;
        }
        bound
    }

    /// Registers `J` on `cron_expression` regardless of configuration.
    pub fn add_job<J: JobType>(
        &mut self,
        cron_expression: &str,
        run_once_at_startup: bool,
    ) -> &mut Self {
        self.catalog.register::<J>();
        let entry = CatalogEntry::compiled::<J>();
        self.services
            .add_transient(entry.shared_name(), entry.constructor());
        self.schedule_on(cron_expression, &entry, run_once_at_startup);
        self
    }

    /// Adds the registration for `key`, plus a fire-once one when asked.
    fn schedule_on(&mut self, key: &str, entry: &CatalogEntry, run_once_at_startup: bool) {
        let job_type = entry.shared_name();
        self.registrations
            .push(JobScheduleRegistration::new(Arc::clone(&job_type), key));
        if run_once_at_startup {
            self.registrations
                .push(JobScheduleRegistration::new(Arc::clone(&job_type), FIRE_ONCE));
        }
        info!(
            job = entry.name(),
            trigger = key,
            origin = %entry.origin(),
            run_once_at_startup,
            "Registered job"
        );
    }

    /// Freezes services, catalog and registrations.
    #[must_use]
    pub fn build(self) -> Arc<Schedule> {
        Arc::new(Schedule {
            container:     self.services.build(),
            catalog:       self.catalog,
            registrations: self.registrations,
        })
    }
}

impl fmt::Debug for ScheduleRegistrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleRegistrar")
            .field("triggers", &self.triggers)
            .field("catalog", &self.catalog)
            .field("registrations", &self.registrations)
            .finish_non_exhaustive()
    }
}

/// Everything the registrar produced, read-only from here on.
#[derive(Debug)]
pub struct Schedule {
    container:     Container,
    catalog:       JobCatalog,
    registrations: Vec<JobScheduleRegistration>,
}

impl Schedule {
    #[must_use]
    pub const fn container(&self) -> &Container { &self.container }

    #[must_use]
    pub const fn catalog(&self) -> &JobCatalog { &self.catalog }

    #[must_use]
    pub fn registrations(&self) -> &[JobScheduleRegistration] { &self.registrations }

    /// Engine triggers for every registration, failing on the first malformed
    /// cron expression.
    pub fn triggers(&self) -> Result<Vec<(Arc<str>, Trigger)>, CronParseError> {
        self.registrations
            .iter()
            .map(|registration| Ok((registration.shared_job_type(), registration.trigger()?)))
            .collect()
    }

    #[must_use]
    pub fn job_factory(&self) -> ContainerJobFactory { ContainerJobFactory::new(self.container.clone()) }

    #[must_use]
    pub fn startup_runner(self: &Arc<Self>) -> StartupRunner { StartupRunner::new(Arc::clone(self)) }
}

#[cfg(test)]
mod tests {
    use jobhost_common_engine::{Job, JobContext, JobResult};

    use super::*;
    use crate::{config::JobDescriptor, error::BoxError};

    struct Cleanup;

    #[async_trait::async_trait]
    impl Job for Cleanup {
        async fn execute(&self, _ctx: Option<&JobContext>) -> JobResult { Ok(()) }
    }

    impl JobType for Cleanup {
        fn build(_container: &Container) -> Result<Self, BoxError> { Ok(Self) }
    }

    struct Other;

    #[async_trait::async_trait]
    impl Job for Other {
        async fn execute(&self, _ctx: Option<&JobContext>) -> JobResult { Ok(()) }
    }

    impl JobType for Other {
        fn build(_container: &Container) -> Result<Self, BoxError> { Ok(Self) }
    }

    fn compiled(name: &str) -> JobDescriptor { JobDescriptor::builder().class_full_name(name).build() }

    #[test]
    fn fire_once_key_yields_one_fire_once_registration() {
        let triggers = TriggerConfig::new().with_trigger(FIRE_ONCE, [compiled(Cleanup::type_name())]);
        let mut registrar = ScheduleRegistrar::new(Some(triggers), JobCatalog::new());
        assert_eq!(registrar.add_compiled_jobs::<Cleanup>(false), 1);

        let schedule = registrar.build();
        assert_eq!(schedule.registrations().len(), 1);
        let registration = &schedule.registrations()[0];
        assert!(registration.is_fire_once());
        assert_eq!(registration.trigger().unwrap(), Trigger::Once);
    }

    #[test]
    fn run_once_at_startup_doubles_registrations() {
        let triggers = TriggerConfig::new().with_trigger("0 0 * * *", [compiled(Cleanup::type_name())]);
        let mut registrar = ScheduleRegistrar::new(Some(triggers), JobCatalog::new());
        registrar.add_compiled_jobs::<Cleanup>(true);

        let schedule = registrar.build();
        let registrations: Vec<_> = schedule
            .registrations()
            .iter()
            .map(|r| (r.job_type(), r.cron_expression()))
            .collect();
        assert_eq!(registrations, vec![
            (Cleanup::type_name(), "0 0 * * *"),
            (Cleanup::type_name(), ""),
        ]);
        assert_eq!(schedule.container().service_count(Cleanup::type_name()), 1);
    }

    #[test]
    fn matching_is_by_exact_name() {
        let triggers = TriggerConfig::new().with_trigger("0 0 * * *", [
            compiled("Cleanup"),
            compiled(&Cleanup::type_name().to_uppercase()),
            compiled(Other::type_name()),
        ]);
        let mut registrar = ScheduleRegistrar::new(Some(triggers), JobCatalog::new());
        assert_eq!(registrar.add_compiled_jobs::<Cleanup>(false), 0);
        assert_eq!(registrar.add_compiled_jobs::<Other>(false), 1);
        assert_eq!(registrar.registrations().len(), 1);
        assert_eq!(registrar.registrations()[0].job_type(), Other::type_name());
    }

    #[test]
    fn compiled_path_ignores_plugin_descriptors() {
        let plugin = JobDescriptor::builder()
            .class_full_name(Cleanup::type_name())
            .assembly_filename("cleanup-plugin")
            .build();
        let triggers = TriggerConfig::new().with_trigger("0 0 * * *", [plugin]);
        let mut registrar = ScheduleRegistrar::new(Some(triggers), JobCatalog::new());
        assert_eq!(registrar.add_compiled_jobs::<Cleanup>(false), 0);
    }

    #[test]
    fn missing_configuration_registers_nothing() {
        let mut registrar = ScheduleRegistrar::new(None, JobCatalog::new());
        assert_eq!(registrar.add_compiled_jobs::<Cleanup>(true), 0);
        let schedule = registrar.build();
        assert!(schedule.registrations().is_empty());
        assert!(schedule.catalog().contains(Cleanup::type_name()));
    }

    #[test]
    fn compiled_job_under_two_triggers_gets_one_service() {
        let triggers = TriggerConfig::new()
            .with_trigger("0 0 * * *", [compiled(Cleanup::type_name())])
            .with_trigger("*/5 * * * *", [compiled(Cleanup::type_name())]);
        let mut registrar = ScheduleRegistrar::new(Some(triggers), JobCatalog::new());
        assert_eq!(registrar.add_compiled_jobs::<Cleanup>(false), 2);

        let schedule = registrar.build();
        assert_eq!(schedule.registrations().len(), 2);
        assert_eq!(schedule.container().service_count(Cleanup::type_name()), 1);
    }

    #[test]
    fn add_job_ignores_configuration() {
        let mut registrar = ScheduleRegistrar::new(None, JobCatalog::new());
        registrar.add_job::<Cleanup>("*/10 * * * *", false);
        let schedule = registrar.build();
        assert_eq!(
            schedule.registrations(),
            &[JobScheduleRegistration::new(Cleanup::type_name(), "*/10 * * * *")]
        );
        assert_eq!(schedule.registrations()[0].to_string(), format!("{} @ */10 * * * *", Cleanup::type_name()));
    }

    #[test]
    fn malformed_cron_surfaces_when_building_triggers() {
        let mut registrar = ScheduleRegistrar::new(None, JobCatalog::new());
        registrar.add_job::<Cleanup>("every tuesday", false);
        let schedule = registrar.build();
        let err = schedule.triggers().unwrap_err();
        assert!(err.to_string().contains("every tuesday"));
    }
}
