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

use std::{any::Any, path::PathBuf, time::Duration};

use jobhost_error::{ErrorExt, StatusCode};
use snafu::{Location, Snafu};

/// Error returned by job constructors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure to produce a job instance from the service container.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ResolveError {
    #[snafu(display("No job registered under '{job_type}'"))]
    NotRegistered {
        job_type: String,
        #[snafu(implicit)]
        loc:      Location,
    },

    #[snafu(display("Failed to construct job '{job_type}'"))]
    Construct {
        job_type: String,
        source:   BoxError,
        #[snafu(implicit)]
        loc:      Location,
    },

    #[snafu(display("Constructor of job '{job_type}' panicked: {message}"))]
    ConstructorPanicked {
        job_type: String,
        message:  String,
        #[snafu(implicit)]
        loc:      Location,
    },

    #[snafu(display("Missing dependency '{dependency}'"))]
    MissingDependency {
        dependency: &'static str,
        #[snafu(implicit)]
        loc:        Location,
    },
}

impl ErrorExt for ResolveError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotRegistered { .. } | Self::MissingDependency { .. } => StatusCode::NotFound,
            Self::Construct { .. } | Self::ConstructorPanicked { .. } => StatusCode::JobFailure,
        }
    }

    fn as_any(&self) -> &dyn Any { self as _ }
}

/// Failure to load a plugin module or to run one of its jobs.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PluginError {
    #[snafu(display("Plugin module {} does not exist or is not a file", path.display()))]
    ModuleNotFound {
        path: PathBuf,
        #[snafu(implicit)]
        loc:  Location,
    },

    #[snafu(display("Failed to spawn plugin module {}", path.display()))]
    Spawn {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    Location,
    },

    #[snafu(display("Failed to talk to plugin module {}", path.display()))]
    Io {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    Location,
    },

    #[snafu(display("Plugin module {} did not answer within {timeout:?}", path.display()))]
    Timeout {
        path:    PathBuf,
        timeout: Duration,
        #[snafu(implicit)]
        loc:     Location,
    },

    #[snafu(display("Plugin module {} exited with code {code}: {stderr}", path.display()))]
    Exited {
        path:   PathBuf,
        code:   i32,
        stderr: String,
        #[snafu(implicit)]
        loc:    Location,
    },

    #[snafu(display("Plugin module {} sent a malformed response", path.display()))]
    MalformedResponse {
        path:   PathBuf,
        source: serde_json::Error,
        #[snafu(implicit)]
        loc:    Location,
    },

    #[snafu(display("Failed to encode request for plugin module {}", path.display()))]
    EncodeRequest {
        path:   PathBuf,
        source: serde_json::Error,
        #[snafu(implicit)]
        loc:    Location,
    },

    #[snafu(display("Plugin job '{job}' failed: {message}"))]
    JobFailed {
        job:     String,
        message: String,
        #[snafu(implicit)]
        loc:     Location,
    },
}

impl ErrorExt for PluginError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ModuleNotFound { .. } => StatusCode::NotFound,
            Self::MalformedResponse { .. } | Self::EncodeRequest { .. } => StatusCode::Internal,
            Self::JobFailed { .. } => StatusCode::JobFailure,
            Self::Spawn { .. } | Self::Io { .. } | Self::Timeout { .. } | Self::Exited { .. } => {
                StatusCode::PluginFailure
            }
        }
    }

    fn as_any(&self) -> &dyn Any { self as _ }
}

/// A job failed while running at process start.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StartupError {
    #[snafu(display("Startup run of '{job_type}' could not be resolved"))]
    StartupResolve {
        job_type: String,
        source:   ResolveError,
    },

    #[snafu(display("Startup run of '{job_type}' failed"))]
    StartupJob {
        job_type: String,
        source:   jobhost_common_engine::JobError,
    },

    #[snafu(display("Startup run of '{job_type}' panicked: {message}"))]
    StartupPanicked { job_type: String, message: String },
}

impl StartupError {
    /// Job type whose startup run failed.
    #[must_use]
    pub fn job_type(&self) -> &str {
        match self {
            Self::StartupResolve { job_type, .. }
            | Self::StartupJob { job_type, .. }
            | Self::StartupPanicked { job_type, .. } => job_type,
        }
    }
}

impl ErrorExt for StartupError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::StartupResolve { source, .. } => source.status_code(),
            Self::StartupJob { .. } | Self::StartupPanicked { .. } => StatusCode::JobFailure,
        }
    }

    fn as_any(&self) -> &dyn Any { self as _ }
}

/// Renders a panic payload caught with `catch_unwind`.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}
