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

//! The jobhost host: loads configuration, registers configured jobs, runs
//! them once on start and then keeps them firing on their triggers until
//! shutdown.

pub mod config;
pub mod error;
pub mod jobs;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

pub use config::{AppConfig, SchedulerOptions, StartupOptions};
pub use error::AppError;
use jobhost_common_engine::{ScheduleHandle, Scheduler, SchedulerConfig};
use jobhost_error::ErrorExt;
use jobhost_scheduler::{JobCatalog, JobScheduleRegistration, Schedule, ScheduleRegistrar};
use smart_default::SmartDefault;
use snafu::ResultExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{InvalidTriggerSnafu, StartupSnafu};

/// Hook adding compiled-in jobs to the registrar. Receives the configured
/// `run_once_at_startup` flag.
pub type JobRegistration = Arc<dyn Fn(&mut ScheduleRegistrar, bool) + Send + Sync>;

/// A configured host, ready to start.
#[derive(SmartDefault)]
pub struct App {
    pub config:             AppConfig,
    #[default(_code = "vec![Arc::new(jobs::register_builtin_jobs) as JobRegistration]")]
    job_registrations:      Vec<JobRegistration>,
    /// Set while triggers are firing.
    #[default(_code = "Arc::new(AtomicBool::new(false))")]
    pub running:            Arc<AtomicBool>,
    /// Cancelled once every running job has drained after shutdown.
    #[default(_code = "CancellationToken::new()")]
    pub cancellation_token: CancellationToken,
}

impl AppConfig {
    #[must_use]
    pub fn open(self) -> App {
        App {
            config: self,
            ..Default::default()
        }
    }
}

/// Control over a started [`App`].
pub struct AppHandle {
    shutdown_tx:        Option<oneshot::Sender<()>>,
    running:            Arc<AtomicBool>,
    cancellation_token: CancellationToken,
    schedules:          Vec<ScheduleHandle>,
}

impl AppHandle {
    /// Ask the application to shut down. Returns immediately; use
    /// [`wait_for_shutdown`](Self::wait_for_shutdown) to wait for running
    /// jobs to drain.
    pub fn shutdown(&mut self) {
        info!("Initiating graceful shutdown");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool { self.running.load(Ordering::SeqCst) }

    /// One handle per scheduled registration, in registration order.
    #[must_use]
    pub fn schedules(&self) -> &[ScheduleHandle] { &self.schedules }

    /// Resolves once shutdown has drained running jobs.
    pub async fn wait_for_shutdown(&self) { self.cancellation_token.cancelled().await; }
}

impl App {
    /// Adds a hook registering more compiled-in jobs. Built-in jobs are
    /// always registered.
    #[must_use]
    pub fn with_jobs<F>(mut self, register: F) -> Self
    where
        F: Fn(&mut ScheduleRegistrar, bool) + Send + Sync + 'static,
    {
        self.job_registrations.push(Arc::new(register));
        self
    }

    /// Registers compiled-in and plugin jobs from the configuration and
    /// checks every trigger expression.
    pub async fn prepare(&self) -> Result<Arc<Schedule>, AppError> {
        let run_once = self.config.scheduler.run_once_at_startup;
        let mut registrar = ScheduleRegistrar::new(self.config.triggers.clone(), JobCatalog::new());
        for register in &self.job_registrations {
            register(&mut registrar, run_once);
        }
        let resolver = self.config.scheduler.plugin_resolver();
        registrar.add_plugin_jobs(&resolver, run_once).await;

        let schedule = registrar.build();
        schedule.triggers().context(InvalidTriggerSnafu)?;
        info!(
            registrations = schedule.registrations().len(),
            job_types = schedule.catalog().len(),
            "Job registration finished"
        );
        Ok(schedule)
    }

    /// Registrations the configuration produces, without running anything.
    pub async fn check(&self) -> Result<Vec<JobScheduleRegistration>, AppError> {
        Ok(self.prepare().await?.registrations().to_vec())
    }

    async fn run_on_start(&self, schedule: &Arc<Schedule>) -> Result<(), AppError> {
        let startup = self.config.startup;
        if !startup.enabled {
            info!("Running registered jobs on start is disabled");
            return Ok(());
        }
        match schedule.startup_runner().run_all().await {
            Ok(runs) => {
                info!(runs, "Registered jobs ran on start");
                Ok(())
            }
            Err(e) if startup.fail_on_error => Err(e).context(StartupSnafu),
            Err(e) => {
                warn!(
                    job = e.job_type(),
                    error = %e.output_msg(),
                    "Startup run failed, scheduling anyway"
                );
                Ok(())
            }
        }
    }

    /// Registers jobs, runs them once if startup runs are enabled, then
    /// schedules every registration. Shutdown happens on Ctrl+C, SIGTERM,
    /// [`AppHandle::shutdown`] or when the handle is dropped.
    pub async fn start(&self) -> Result<AppHandle, AppError> {
        info!("Starting jobhost application");

        let schedule = self.prepare().await?;
        let triggers = schedule.triggers().context(InvalidTriggerSnafu)?;
        self.run_on_start(&schedule).await?;

        let scheduler_config = SchedulerConfig::builder()
            .shutdown_timeout(self.config.scheduler.shutdown_timeout)
            .build();
        let mut scheduler = Scheduler::new(&scheduler_config, Arc::new(schedule.job_factory()));
        let schedules = triggers
            .into_iter()
            .map(|(job_type, trigger)| scheduler.schedule(job_type, trigger))
            .collect::<Vec<_>>();

        self.running.store(true, Ordering::SeqCst);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app_handle = AppHandle {
            shutdown_tx: Some(shutdown_tx),
            running: Arc::clone(&self.running),
            cancellation_token: self.cancellation_token.clone(),
            schedules,
        };

        info!(schedules = scheduler.len(), "Application started successfully");

        let running = Arc::clone(&self.running);
        let cancellation_token = self.cancellation_token.clone();
        tokio::spawn(async move {
            shutdown_signal(shutdown_rx).await;
            running.store(false, Ordering::SeqCst);

            info!("Shutting down scheduler");
            scheduler.shutdown().await;

            cancellation_token.cancel();
            info!("Application shutdown complete");
        });

        Ok(app_handle)
    }

    /// Starts and waits until shutdown has completed.
    pub async fn run(self) -> Result<(), AppError> {
        let handle = self.start().await?;
        handle.wait_for_shutdown().await;
        Ok(())
    }
}

async fn shutdown_signal(shutdown_rx: oneshot::Receiver<()>) {
    let interrupted = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C"),
            Err(e) => {
                error!(error = %e, "Cannot listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminated = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM");
            }
            Err(e) => {
                error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminated = std::future::pending::<()>();

    tokio::select! {
        () = interrupted => {},
        () = terminated => {},
        requested = shutdown_rx => {
            if requested.is_ok() {
                info!("Shutdown requested");
            } else {
                info!("App handle dropped, shutting down");
            }
        },
    }
}
