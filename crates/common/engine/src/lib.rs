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

//! Trigger engine that fires schedules and runs jobs.
//!
//! The engine knows nothing about how jobs are built. Each schedule binds a
//! job type name to a [`Trigger`]; whenever the trigger fires, the engine asks
//! a [`JobFactory`] for an instance and runs it on its own task.
//!
//! - **Triggers**: [`Trigger::Once`] fires immediately and exactly once,
//!   [`Trigger::Cron`] fires on every occurrence of a cron expression
//! - **Failure isolation**: a failing or panicking job never stops the engine;
//!   a [`JobError`] with [`ErrorSeverity::Fatal`] stops only its own schedule
//! - **Graceful shutdown**: trigger loops stop at once, running jobs get a
//!   bounded grace period
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use jobhost_common_engine::{
//!     Job, JobContext, JobFactory, JobResult, Scheduler, SchedulerConfig, Trigger,
//!     TriggerFiredBundle,
//! };
//!
//! struct Hello;
//!
//! #[async_trait::async_trait]
//! impl Job for Hello {
//!     async fn execute(&self, _ctx: Option<&JobContext>) -> JobResult {
//!         println!("hello");
//!         Ok(())
//!     }
//! }
//!
//! struct HelloFactory;
//!
//! impl JobFactory for HelloFactory {
//!     fn new_job(&self, _bundle: &TriggerFiredBundle) -> Box<dyn Job> { Box::new(Hello) }
//!
//!     fn return_job(&self, _job: Box<dyn Job>) {}
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut scheduler = Scheduler::new(&SchedulerConfig::default(), Arc::new(HelloFactory));
//!     let handle = scheduler.schedule("hello", Trigger::cron("*/5 * * * *").unwrap());
//!     assert!(handle.is_active());
//!     scheduler.shutdown().await;
//! }
//! ```

mod config;
mod driver;
mod err;
mod handle;
mod id;
mod job;
mod metrics;
mod scheduler;
mod trigger;

pub use config::SchedulerConfig;
pub use err::{CronParseError, ErrorSeverity, JobError, JobResult};
pub use handle::ScheduleHandle;
pub use id::ScheduleId;
pub use job::{Job, JobContext, JobFactory, TriggerFiredBundle};
pub use scheduler::Scheduler;
pub use trigger::Trigger;
