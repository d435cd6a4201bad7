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

use std::fmt;

use snafu::Snafu;

/// Result type returned by [`Job::execute`](crate::Job::execute).
pub type JobResult<T = ()> = std::result::Result<T, JobError>;

/// How the engine reacts to a failed execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ErrorSeverity {
    /// The failure is logged and the schedule keeps firing.
    #[display("transient")]
    Transient,

    /// The failure is logged and the schedule that fired the job is stopped.
    /// Other schedules of the same job type are unaffected.
    #[display("fatal")]
    Fatal,
}

/// Failure reported by a job.
///
/// ```rust
/// use jobhost_common_engine::{JobError, JobResult};
///
/// fn sync_inventory(reachable: bool, configured: bool) -> JobResult {
///     if !configured {
///         return Err(JobError::fatal("inventory endpoint is not configured"));
///     }
///     if !reachable {
///         return Err(JobError::transient("inventory endpoint unreachable"));
///     }
///     Ok(())
/// }
/// # assert!(sync_inventory(true, true).is_ok());
/// ```
#[derive(Debug)]
pub struct JobError {
    severity: ErrorSeverity,
    message:  String,
    source:   Option<BoxedSource>,
}

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

impl JobError {
    fn with(severity: ErrorSeverity, message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self {
            severity,
            message: message.into(),
            source,
        }
    }

    /// The schedule keeps firing after this failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::with(ErrorSeverity::Transient, message, None)
    }

    /// The schedule that fired the job stops after this failure.
    pub fn fatal(message: impl Into<String>) -> Self { Self::with(ErrorSeverity::Fatal, message, None) }

    pub fn transient_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::with(ErrorSeverity::Transient, message, Some(Box::new(source)))
    }

    pub fn fatal_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::with(ErrorSeverity::Fatal, message, Some(Box::new(source)))
    }

    #[must_use]
    pub const fn severity(&self) -> ErrorSeverity { self.severity }

    #[must_use]
    pub fn is_fatal(&self) -> bool { matches!(self.severity, ErrorSeverity::Fatal) }

    #[must_use]
    pub fn is_transient(&self) -> bool { matches!(self.severity, ErrorSeverity::Transient) }

    #[must_use]
    pub fn message(&self) -> &str { &self.message }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as _)
    }
}

/// A trigger expression that `croner` rejected.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CronParseError {
    #[snafu(display("Failed to parse cron expression '{expression}': {source}"))]
    InvalidExpression {
        expression: String,
        source:     croner::errors::CronError,
        #[snafu(implicit)]
        loc:        snafu::Location,
    },
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn display_carries_severity() {
        assert_eq!(JobError::transient("busy").to_string(), "[transient] busy");
        assert_eq!(JobError::fatal("gone").to_string(), "[fatal] gone");
    }

    #[test]
    fn source_is_exposed() {
        let err = JobError::fatal_with_source("cannot open", std::io::Error::other("denied"));
        assert!(err.is_fatal());
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("denied"));
    }
}
