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

use std::sync::LazyLock;

use prometheus::{IntCounter, IntCounterVec, register_int_counter, register_int_counter_vec};

pub const JOB_LABEL: &str = "job";

pub static FACTORY_FALLBACKS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "job_factory_fallbacks_total",
        "Total number of firings served by the no-op job because resolution failed",
        &[JOB_LABEL]
    )
    .unwrap()
});

pub static PLUGIN_LOAD_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "job_plugin_load_failures_total",
        "Total number of plugin modules that failed to load"
    )
    .unwrap()
});

pub static UNRESOLVED_DESCRIPTORS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "job_unresolved_descriptors_total",
        "Total number of configured jobs skipped because their type could not be resolved"
    )
    .unwrap()
});

pub static STARTUP_RUN_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "job_startup_run_failures_total",
        "Total number of failed startup runs",
        &[JOB_LABEL]
    )
    .unwrap()
});
