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

//! Configuration-driven job registration.
//!
//! - [`TriggerConfig`]: trigger expression to [`JobDescriptor`] list, as read
//!   from the `triggers` configuration section
//! - [`JobCatalog`] and [`JobType`]: every job type known by name
//! - [`PluginResolver`]: loads job types from external plugin modules
//! - [`ScheduleRegistrar`]: turns configuration into
//!   [`JobScheduleRegistration`]s and job services, frozen into a [`Schedule`]
//! - [`ContainerJobFactory`]: the engine's [`JobFactory`] over the frozen
//!   services, degrading to a [`NoopJob`] when a job cannot be built
//! - [`StartupRunner`]: runs every registered job once at process start
//!
//! [`JobFactory`]: jobhost_common_engine::JobFactory

mod catalog;
mod config;
mod container;
mod error;
mod factory;
mod metrics;
pub mod plugin;
mod registrar;
mod startup;

pub use catalog::{CatalogEntry, JobCatalog, JobOrigin, JobType, module_of};
pub use config::{FIRE_ONCE, JobDescriptor, TriggerConfig};
pub use container::{Constructor, Container, ContainerBuilder, Lifetime, constructor};
pub use error::{BoxError, PluginError, ResolveError, StartupError};
pub use factory::{ContainerJobFactory, NOOP_JOB_MESSAGE, NoopJob};
pub use plugin::PluginResolver;
pub use registrar::{JobScheduleRegistration, Schedule, ScheduleRegistrar};
pub use startup::StartupRunner;
