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

use std::{any::Any, path::PathBuf};

use jobhost_common_engine::CronParseError;
use jobhost_error::{ErrorExt, StatusCode};
use jobhost_scheduler::StartupError;
use snafu::{Location, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AppError {
    #[snafu(display("Failed to read config file {}", path.display()))]
    ReadConfig {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    Location,
    },

    #[snafu(display("Failed to parse TOML config {}", path.display()))]
    ParseToml {
        path:   PathBuf,
        source: toml::de::Error,
        #[snafu(implicit)]
        loc:    Location,
    },

    #[snafu(display("Failed to parse JSON config {}", path.display()))]
    ParseJson {
        path:   PathBuf,
        source: serde_json::Error,
        #[snafu(implicit)]
        loc:    Location,
    },

    #[snafu(display("Unsupported config format '{extension}' for {}", path.display()))]
    UnsupportedFormat {
        path:      PathBuf,
        extension: String,
        #[snafu(implicit)]
        loc:       Location,
    },

    #[snafu(display("Invalid trigger configuration"))]
    InvalidTrigger {
        source: CronParseError,
        #[snafu(implicit)]
        loc:    Location,
    },

    #[snafu(display("Registered jobs failed on start"))]
    Startup {
        source: StartupError,
        #[snafu(implicit)]
        loc:    Location,
    },
}

impl ErrorExt for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ReadConfig { .. }
            | Self::ParseToml { .. }
            | Self::ParseJson { .. }
            | Self::UnsupportedFormat { .. }
            | Self::InvalidTrigger { .. } => StatusCode::InvalidConfig,
            Self::Startup { source, .. } => source.status_code(),
        }
    }

    fn as_any(&self) -> &dyn Any { self as _ }
}
