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

use shadow_rs::shadow;

shadow!(build);

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

const GIT_STATE: &str = if build::GIT_CLEAN { "" } else { "-dirty" };

/// `JOBHOST_RELEASE` at build time marks a release build, which reports the
/// bare package version. Other builds are tagged `-dev`, plus the commit when
/// git information is available.
#[allow(clippy::const_is_empty)]
pub const FULL_VERSION: &str = match (
    option_env!("JOBHOST_RELEASE").is_some(),
    build::SHORT_COMMIT.is_empty(),
) {
    (true, _) => build::PKG_VERSION,
    (false, true) => shadow_rs::formatcp!("{}-dev", build::PKG_VERSION),
    (false, false) => shadow_rs::formatcp!(
        "{}-dev+{}{}",
        build::PKG_VERSION,
        build::SHORT_COMMIT,
        GIT_STATE
    ),
};
