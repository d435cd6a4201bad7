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

use std::{fmt, str::FromStr, sync::Arc};

use chrono::{DateTime, Utc};
use snafu::ResultExt;

use crate::err::{CronParseError, InvalidExpressionSnafu};

/// Defines when a scheduled job fires.
///
/// | Trigger | Behaviour |
/// |---------|-----------|
/// | `Once`  | fires immediately after scheduling, exactly once |
/// | `Cron`  | fires on every occurrence of the cron expression |
///
/// ```rust
/// use jobhost_common_engine::Trigger;
///
/// let nightly = Trigger::cron("0 0 * * *").unwrap();
/// assert_eq!(nightly.expression(), "0 0 * * *");
///
/// assert!(Trigger::cron("not a cron").is_err());
/// assert!(Trigger::Once.is_once());
/// ```
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Start now, fire exactly once, no recurrence.
    Once,

    /// Recur on a cron schedule (`minute hour day month weekday`).
    Cron {
        expression: Arc<str>,
        schedule:   croner::Cron,
    },
}

impl Trigger {
    /// Parses a recurring trigger.
    pub fn cron(expression: &str) -> Result<Self, CronParseError> {
        let schedule = croner::Cron::from_str(expression).context(InvalidExpressionSnafu {
            expression: expression.to_string(),
        })?;
        Ok(Self::Cron {
            expression: Arc::from(expression),
            schedule,
        })
    }

    /// The cron expression, or the empty string for [`Trigger::Once`].
    #[must_use]
    pub fn expression(&self) -> &str {
        match self {
            Self::Once => "",
            Self::Cron { expression, .. } => expression,
        }
    }

    #[must_use]
    pub const fn is_once(&self) -> bool { matches!(self, Self::Once) }

    /// First occurrence strictly after `after`. Always `None` for `Once`.
    #[must_use]
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Once => None,
            Self::Cron { schedule, .. } => schedule.find_next_occurrence(after, false).ok(),
        }
    }
}

impl PartialEq for Trigger {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Once, Self::Once) => true,
            (Self::Cron { expression: a, .. }, Self::Cron { expression: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Trigger {}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Once => f.write_str("once"),
            Self::Cron { expression, .. } => write!(f, "cron({expression})"),
        }
    }
}
