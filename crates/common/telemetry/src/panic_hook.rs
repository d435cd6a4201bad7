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

//! Panic reporting through `tracing`.

use std::{panic, sync::LazyLock, thread};

use backtrace::Backtrace;
use prometheus::{IntCounter, register_int_counter};

/// Panics seen by the process, including the ones the scheduler later caught
/// inside a job task.
pub static PANIC_COUNTER: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("jobhost_panic_total", "Total number of panics").unwrap()
});

/// Logs every panic as an `ERROR` event with its thread, location and a
/// backtrace, then hands it to the hook that was installed before.
pub fn set_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        PANIC_COUNTER.inc();
        let location = info.location();
        tracing::error!(
            panic = %info,
            thread = thread::current().name().unwrap_or("<unnamed>"),
            panic.file = location.map(|l| l.file()),
            panic.line = location.map(|l| l.line()),
            backtrace = ?Backtrace::new(),
            "Panicked"
        );
        previous(info);
    }));
}
