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
    path::{Path, PathBuf},
    time::Duration,
};

use bon::Builder;
use jobhost_common_telemetry::logging::LoggingOptions;
use jobhost_scheduler::{PluginResolver, TriggerConfig};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::{OptionExt, ResultExt};

use crate::error::{
    AppError, ParseJsonSnafu, ParseTomlSnafu, ReadConfigSnafu, UnsupportedFormatSnafu,
};

/// Host configuration, read from a TOML or JSON file.
///
/// ```toml
/// [scheduler]
/// run_once_at_startup = true
/// plugin_execute_timeout = "5m"
///
/// [triggers]
/// "0 0 * * *" = [{ ClassFullName = "jobhost_app::jobs::HeartbeatJob" }]
/// "" = [{ ClassFullName = "Acme.Reports.Daily", AssemblyFilename = "acme-reports" }]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct AppConfig {
    #[builder(default)]
    pub logging:   LoggingOptions,
    #[builder(default)]
    pub scheduler: SchedulerOptions,
    #[builder(default)]
    pub startup:   StartupOptions,
    /// Cron expression to job descriptors. Absent means no configured jobs.
    pub triggers:  Option<TriggerConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault, Builder)]
#[serde(default)]
pub struct SchedulerOptions {
    /// How long shutdown waits for running jobs.
    #[default(_code = "Duration::from_secs(30)")]
    #[serde(with = "humantime_serde")]
    #[builder(default = Duration::from_secs(30))]
    pub shutdown_timeout:         Duration,
    /// Directory relative plugin directories are resolved against. Defaults
    /// to the directory of the executable.
    #[builder(into)]
    pub plugin_base_dir:          Option<PathBuf>,
    #[default(_code = "jobhost_scheduler::plugin::DEFAULT_HANDSHAKE_TIMEOUT")]
    #[serde(with = "humantime_serde")]
    #[builder(default = jobhost_scheduler::plugin::DEFAULT_HANDSHAKE_TIMEOUT)]
    pub plugin_handshake_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub plugin_execute_timeout:   Option<Duration>,
    /// Also register every configured job under the fire-once trigger.
    #[builder(default)]
    pub run_once_at_startup:      bool,
}

impl SchedulerOptions {
    #[must_use]
    pub fn plugin_resolver(&self) -> PluginResolver {
        PluginResolver::builder()
            .maybe_base_dir(self.plugin_base_dir.clone())
            .handshake_timeout(self.plugin_handshake_timeout)
            .maybe_execute_timeout(self.plugin_execute_timeout)
            .build()
    }
}

/// What happens before the first trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SmartDefault, Builder)]
#[serde(default)]
pub struct StartupOptions {
    /// Run every registered job once before scheduling.
    #[default = true]
    #[builder(default = true)]
    pub enabled:       bool,
    /// Refuse to start when a startup run fails.
    #[default = true]
    #[builder(default = true)]
    pub fail_on_error: bool,
}

impl AppConfig {
    /// Loads configuration from `path`, picking the format by extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).context(ReadConfigSnafu { path })?;
        Self::parse(path, &raw)
    }

    fn parse(path: &Path, raw: &str) -> Result<Self, AppError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .context(UnsupportedFormatSnafu { path, extension: "" })?;
        match extension {
            "toml" => toml::from_str(raw).context(ParseTomlSnafu { path }),
            "json" => serde_json::from_str(raw).context(ParseJsonSnafu { path }),
            other => UnsupportedFormatSnafu {
                path,
                extension: other,
            }
            .fail(),
        }
    }
}
