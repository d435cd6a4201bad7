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
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex, PoisonError},
};

use jobhost_common_engine::{Job, JobContext, JobResult};
use snafu::{OptionExt, ResultExt};

use crate::error::{
    BoxError, ConstructSnafu, ConstructorPanickedSnafu, MissingDependencySnafu,
    NotRegisteredSnafu, ResolveError, panic_message,
};

/// Builds one job instance, pulling whatever it depends on from the container.
pub type Constructor = Arc<dyn Fn(&Container) -> Result<Box<dyn Job>, BoxError> + Send + Sync>;

/// Wraps a closure as a [`Constructor`].
pub fn constructor<F>(build: F) -> Constructor
where
    F: Fn(&Container) -> Result<Box<dyn Job>, BoxError> + Send + Sync + 'static,
{
    Arc::new(build)
}

/// How long a resolved job instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifetime {
    /// A fresh instance on every resolution.
    #[default]
    Transient,
    /// Built on first resolution, shared afterwards.
    Singleton,
}

struct Service {
    lifetime:    Lifetime,
    constructor: Constructor,
    instance:    Mutex<Option<Arc<dyn Job>>>,
}

impl Service {
    fn new(lifetime: Lifetime, constructor: Constructor) -> Self {
        Self {
            lifetime,
            constructor,
            instance: Mutex::new(None),
        }
    }
}

/// Mutable registration side of the [`Container`].
#[derive(Default)]
pub struct ContainerBuilder {
    services:  HashMap<Arc<str>, Vec<Service>>,
    resources: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ContainerBuilder {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Adds a job service under `name`. Several services may share a name.
    pub fn add_service(
        &mut self,
        name: impl Into<Arc<str>>,
        lifetime: Lifetime,
        constructor: Constructor,
    ) -> &mut Self {
        self.services
            .entry(name.into())
            .or_default()
            .push(Service::new(lifetime, constructor));
        self
    }

    pub fn add_transient(&mut self, name: impl Into<Arc<str>>, constructor: Constructor) -> &mut Self {
        self.add_service(name, Lifetime::Transient, constructor)
    }

    pub fn add_singleton(&mut self, name: impl Into<Arc<str>>, constructor: Constructor) -> &mut Self {
        self.add_service(name, Lifetime::Singleton, constructor)
    }

    /// Makes `value` available to job constructors through
    /// [`Container::get`]. A second value of the same type replaces the first.
    pub fn add_resource<T: Any + Send + Sync>(&mut self, value: T) -> &mut Self {
        self.add_shared(Arc::new(value))
    }

    pub fn add_shared<T: Any + Send + Sync>(&mut self, value: Arc<T>) -> &mut Self {
        self.resources.insert(TypeId::of::<T>(), value);
        self
    }

    #[must_use]
    pub fn service_count(&self, name: &str) -> usize { self.services.get(name).map_or(0, Vec::len) }

    #[must_use]
    pub fn build(self) -> Container {
        Container {
            inner: Arc::new(ContainerInner {
                services:  self.services,
                resources: self.resources,
            }),
        }
    }
}

impl fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("services", &self.services.len())
            .field("resources", &self.resources.len())
            .finish()
    }
}

struct ContainerInner {
    services:  HashMap<Arc<str>, Vec<Service>>,
    resources: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

/// Frozen service container. Cheap to clone and safe to resolve from
/// concurrently.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    #[must_use]
    pub fn builder() -> ContainerBuilder { ContainerBuilder::new() }

    /// Shared resource of type `T`, if one was added.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner
            .resources
            .get(&TypeId::of::<T>())
            .and_then(|value| Arc::clone(value).downcast::<T>().ok())
    }

    /// Like [`get`](Self::get), failing when the resource is missing.
    pub fn require<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ResolveError> {
        self.get::<T>().context(MissingDependencySnafu {
            dependency: std::any::type_name::<T>(),
        })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool { self.inner.services.contains_key(name) }

    #[must_use]
    pub fn service_count(&self, name: &str) -> usize {
        self.inner.services.get(name).map_or(0, Vec::len)
    }

    /// Resolves the service registered last under `name`.
    pub fn resolve(&self, name: &str) -> Result<Box<dyn Job>, ResolveError> {
        let service = self
            .inner
            .services
            .get(name)
            .and_then(|services| services.last())
            .context(NotRegisteredSnafu { job_type: name })?;
        self.instantiate(name, service)
    }

    /// Resolves every service registered under `name`, in registration order.
    /// Each entry fails or succeeds on its own.
    #[must_use]
    pub fn resolve_all(&self, name: &str) -> Vec<Result<Box<dyn Job>, ResolveError>> {
        self.inner
            .services
            .get(name)
            .map(|services| {
                services
                    .iter()
                    .map(|service| self.instantiate(name, service))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn instantiate(&self, name: &str, service: &Service) -> Result<Box<dyn Job>, ResolveError> {
        match service.lifetime {
            Lifetime::Transient => self.construct(name, &service.constructor),
            Lifetime::Singleton => {
                let mut slot = service
                    .instance
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                let shared = match slot.as_ref() {
                    Some(shared) => Arc::clone(shared),
                    None => {
                        let shared: Arc<dyn Job> =
                            Arc::from(self.construct(name, &service.constructor)?);
                        *slot = Some(Arc::clone(&shared));
                        shared
                    }
                };
                Ok(Box::new(SharedJob(shared)))
            }
        }
    }

    fn construct(&self, name: &str, constructor: &Constructor) -> Result<Box<dyn Job>, ResolveError> {
        match catch_unwind(AssertUnwindSafe(|| constructor(self))) {
            Ok(built) => built.context(ConstructSnafu { job_type: name }),
            Err(payload) => ConstructorPanickedSnafu {
                job_type: name,
                message:  panic_message(payload.as_ref()),
            }
            .fail(),
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.inner.services.keys().collect();
        names.sort();
        f.debug_struct("Container")
            .field("services", &names)
            .field("resources", &self.inner.resources.len())
            .finish()
    }
}

/// Singleton instance handed out as an owned job.
struct SharedJob(Arc<dyn Job>);

#[async_trait::async_trait]
impl Job for SharedJob {
    async fn execute(&self, ctx: Option<&JobContext>) -> JobResult { self.0.execute(ctx).await }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use jobhost_error::innermost_cause;

    use super::*;

    struct Nothing;

    #[async_trait::async_trait]
    impl Job for Nothing {
        async fn execute(&self, _ctx: Option<&JobContext>) -> JobResult { Ok(()) }
    }

    fn counting(counter: Arc<AtomicUsize>) -> Constructor {
        constructor(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Nothing))
        })
    }

    #[test]
    fn transient_builds_every_time() {
        let built = Arc::new(AtomicUsize::new(0));
        let mut builder = Container::builder();
        builder.add_transient("app::Nothing", counting(Arc::clone(&built)));
        let container = builder.build();

        container.resolve("app::Nothing").unwrap();
        container.resolve("app::Nothing").unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn singleton_builds_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let mut builder = Container::builder();
        builder.add_singleton("app::Nothing", counting(Arc::clone(&built)));
        let container = builder.build();

        container.resolve("app::Nothing").unwrap();
        container.resolve("app::Nothing").unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn resolve_all_returns_every_registration() {
        let built = Arc::new(AtomicUsize::new(0));
        let mut builder = Container::builder();
        builder
            .add_transient("app::Nothing", counting(Arc::clone(&built)))
            .add_transient("app::Nothing", counting(Arc::clone(&built)));
        let container = builder.build();

        assert_eq!(container.service_count("app::Nothing"), 2);
        assert_eq!(container.resolve_all("app::Nothing").len(), 2);
        assert!(container.resolve_all("app::Unknown").is_empty());
    }

    #[test]
    fn unknown_name_is_not_registered() {
        let container = Container::builder().build();
        let err = container.resolve("app::Missing").err().unwrap();
        assert!(matches!(err, ResolveError::NotRegistered { .. }));
    }

    #[test]
    fn constructor_failures_and_panics_become_errors() {
        let mut builder = Container::builder();
        builder
            .add_transient(
                "app::Failing",
                constructor(|_| Err(Box::new(std::io::Error::other("no database")))),
            )
            .add_transient(
                "app::Panicking",
                constructor(|_| panic!("constructor exploded")),
            );
        let container = builder.build();

        let err = container.resolve("app::Failing").err().unwrap();
        assert_eq!(innermost_cause(&err).to_string(), "no database");

        let err = container.resolve("app::Panicking").err().unwrap();
        assert!(err.to_string().contains("constructor exploded"));
    }

    #[test]
    fn resources_are_looked_up_by_type() {
        let mut builder = Container::builder();
        builder.add_resource(String::from("postgres://localhost"));
        let container = builder.build();

        assert_eq!(
            container.get::<String>().as_deref().map(String::as_str),
            Some("postgres://localhost")
        );
        assert!(container.get::<u32>().is_none());
        let err = container.require::<u32>().unwrap_err();
        assert_eq!(err.to_string(), "Missing dependency 'u32'");
    }
}
