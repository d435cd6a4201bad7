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

use std::{collections::BTreeMap, fmt, path::PathBuf, sync::Arc};

use jobhost_common_engine::Job;

use crate::{
    container::{Constructor, Container, constructor},
    error::BoxError,
};

/// A job type that can be looked up by name from configuration.
///
/// ```rust
/// use jobhost_common_engine::{Job, JobContext, JobResult};
/// use jobhost_scheduler::{BoxError, Container, JobType};
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
/// assert!(Cleanup::type_name().ends_with("::Cleanup"));
/// ```
pub trait JobType: Job + Sized {
    /// Fully-qualified name configuration refers to this type by.
    fn type_name() -> &'static str { std::any::type_name::<Self>() }

    /// Builds an instance, pulling dependencies from `container`.
    fn build(container: &Container) -> Result<Self, BoxError>;
}

/// Defining module of a fully-qualified Rust type name: its crate.
#[must_use]
pub fn module_of(type_name: &str) -> &str {
    type_name
        .split_once("::")
        .map_or(type_name, |(module, _)| module)
}

/// Where a catalog entry's code lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOrigin {
    Compiled,
    Plugin { path: PathBuf },
}

impl fmt::Display for JobOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compiled => f.write_str("compiled"),
            Self::Plugin { path } => write!(f, "plugin({})", path.display()),
        }
    }
}

/// One known job type.
#[derive(Clone)]
pub struct CatalogEntry {
    name:        Arc<str>,
    module:      Arc<str>,
    origin:      JobOrigin,
    constructor: Constructor,
}

impl CatalogEntry {
    /// Entry for a compiled-in [`JobType`].
    #[must_use]
    pub fn compiled<J: JobType>() -> Self {
        let name = J::type_name();
        Self {
            name:        Arc::from(name),
            module:      Arc::from(module_of(name)),
            origin:      JobOrigin::Compiled,
            constructor: constructor(|container| {
                J::build(container).map(|job| Box::new(job) as Box<dyn Job>)
            }),
        }
    }

    pub(crate) fn plugin(name: &str, path: PathBuf, constructor: Constructor) -> Self {
        Self {
            name: Arc::from(name),
            module: Arc::from(path.display().to_string()),
            origin: JobOrigin::Plugin { path },
            constructor,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    #[must_use]
    pub fn module(&self) -> &str { &self.module }

    #[must_use]
    pub const fn origin(&self) -> &JobOrigin { &self.origin }

    pub(crate) fn shared_name(&self) -> Arc<str> { Arc::clone(&self.name) }

    pub(crate) fn constructor(&self) -> Constructor { Arc::clone(&self.constructor) }
}

impl fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Every job type the host knows about, keyed by fully-qualified name.
#[derive(Debug, Clone, Default)]
pub struct JobCatalog {
    entries: BTreeMap<Arc<str>, CatalogEntry>,
}

impl JobCatalog {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn with<J: JobType>(mut self) -> Self {
        self.register::<J>();
        self
    }

    /// Adds a compiled-in job type. Registering a type twice is a no-op.
    pub fn register<J: JobType>(&mut self) -> &mut Self {
        if !self.contains(J::type_name()) {
            self.insert(CatalogEntry::compiled::<J>());
        }
        self
    }

    /// Adds `entry`, replacing any entry of the same name.
    pub fn insert(&mut self, entry: CatalogEntry) -> &mut Self {
        self.entries.insert(entry.shared_name(), entry);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CatalogEntry> { self.entries.get(name) }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool { self.entries.contains_key(name) }

    /// Entries defined by `module`, in name order.
    pub fn in_module<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a CatalogEntry> + 'a {
        self.entries
            .values()
            .filter(move |entry| entry.module() == module)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> { self.entries.values() }

    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

#[cfg(test)]
mod tests {
    use jobhost_common_engine::{JobContext, JobResult};

    use super::*;

    struct Cleanup;

    #[async_trait::async_trait]
    impl Job for Cleanup {
        async fn execute(&self, _ctx: Option<&JobContext>) -> JobResult { Ok(()) }
    }

    impl JobType for Cleanup {
        fn build(_container: &Container) -> Result<Self, BoxError> { Ok(Self) }
    }

    struct Renamed;

    #[async_trait::async_trait]
    impl Job for Renamed {
        async fn execute(&self, _ctx: Option<&JobContext>) -> JobResult { Ok(()) }
    }

    impl JobType for Renamed {
        fn type_name() -> &'static str { "legacy::jobs::Renamed" }

        fn build(_container: &Container) -> Result<Self, BoxError> { Ok(Self) }
    }

    #[test]
    fn module_is_the_crate_segment() {
        assert_eq!(module_of("jobhost_app::jobs::Heartbeat"), "jobhost_app");
        assert_eq!(module_of("Acme.Reports.Daily"), "Acme.Reports.Daily");
    }

    #[test]
    fn compiled_entries_use_type_name() {
        let catalog = JobCatalog::new().with::<Cleanup>().with::<Renamed>();
        assert_eq!(catalog.len(), 2);

        let cleanup = catalog.get(Cleanup::type_name()).unwrap();
        assert_eq!(cleanup.module(), "jobhost_scheduler");
        assert_eq!(cleanup.origin(), &JobOrigin::Compiled);

        let renamed: Vec<_> = catalog.in_module("legacy").map(CatalogEntry::name).collect();
        assert_eq!(renamed, vec!["legacy::jobs::Renamed"]);
    }

    #[test]
    fn registering_twice_keeps_one_entry() {
        let mut catalog = JobCatalog::new();
        catalog.register::<Cleanup>().register::<Cleanup>();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn entry_constructor_builds_the_job() {
        let entry = CatalogEntry::compiled::<Cleanup>();
        let container = Container::builder().build();
        assert!((entry.constructor())(&container).is_ok());
    }
}
