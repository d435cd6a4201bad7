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

use prometheus::{
    HistogramVec, IntCounterVec, IntGaugeVec, register_histogram_vec, register_int_counter_vec,
    register_int_gauge_vec,
};

pub const JOB_LABEL: &str = "job";

pub static SCHEDULE_STARTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "job_schedule_started_total",
        "Total number of schedules started",
        &[JOB_LABEL]
    )
    .unwrap()
});

pub static SCHEDULE_STOPPED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "job_schedule_stopped_total",
        "Total number of schedules stopped",
        &[JOB_LABEL]
    )
    .unwrap()
});

pub static SCHEDULE_ACTIVE: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec!(
        "job_schedule_active",
        "Number of active schedules per job type",
        &[JOB_LABEL]
    )
    .unwrap()
});

pub static JOB_EXECUTIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "job_executions_total",
        "Total number of successful job executions",
        &[JOB_LABEL]
    )
    .unwrap()
});

pub static JOB_EXECUTION_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "job_execution_errors_total",
        "Total number of failed or panicked job executions",
        &[JOB_LABEL]
    )
    .unwrap()
});

pub static JOB_EXECUTION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "job_execution_duration_seconds",
        "Duration of job executions in seconds",
        &[JOB_LABEL]
    )
    .unwrap()
});
