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

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::trigger::Trigger;

/// One due firing produced by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fire {
    pub scheduled_at: DateTime<Utc>,
    pub next_at:      Option<DateTime<Utc>>,
}

/// Internal enum for trigger execution strategy.
pub(crate) enum TriggerDriver {
    Once(OnceDriver),
    Cron(CronDriver),
}

impl TriggerDriver {
    pub fn new(trigger: &Trigger) -> Self {
        match trigger {
            Trigger::Once => Self::Once(OnceDriver::new()),
            Trigger::Cron { .. } => Self::Cron(CronDriver::new(trigger.clone())),
        }
    }

    /// Wait for the next firing. Returns `None` once the trigger is exhausted
    /// or `cancel` fires.
    pub async fn wait_next(&mut self, cancel: &CancellationToken) -> Option<Fire> {
        match self {
            Self::Once(d) => d.wait_next(cancel),
            Self::Cron(d) => d.wait_next(cancel).await,
        }
    }
}

/// Driver for Once trigger.
pub(crate) struct OnceDriver {
    executed: bool,
}

impl OnceDriver {
    pub const fn new() -> Self { Self { executed: false } }

    fn wait_next(&mut self, cancel: &CancellationToken) -> Option<Fire> {
        if self.executed || cancel.is_cancelled() {
            return None;
        }
        self.executed = true;
        Some(Fire {
            scheduled_at: Utc::now(),
            next_at:      None,
        })
    }
}

/// Driver for Cron trigger.
pub(crate) struct CronDriver {
    trigger: Trigger,
    last:    Option<DateTime<Utc>>,
}

impl CronDriver {
    pub fn new(trigger: Trigger) -> Self {
        Self {
            trigger,
            last: None,
        }
    }

    async fn wait_next(&mut self, cancel: &CancellationToken) -> Option<Fire> {
        // Never look up from before the previous firing, otherwise a fast job
        // finishing inside the same second would fire twice.
        let now = Utc::now();
        let from = self.last.map_or(now, |last| last.max(now));
        let Some(next) = self.trigger.next_after(&from) else {
            // No more occurrences, wait for cancellation
            cancel.cancelled().await;
            return None;
        };

        let now = Utc::now();
        if next > now {
            let duration = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::select! {
                () = tokio::time::sleep(duration) => {},
                () = cancel.cancelled() => return None,
            }
        } else if cancel.is_cancelled() {
            return None;
        }

        self.last = Some(next);
        Some(Fire {
            scheduled_at: next,
            next_at:      self.trigger.next_after(&next),
        })
    }
}
