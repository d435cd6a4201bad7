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
    env,
    io::IsTerminal,
    sync::{
        Mutex, Once,
        atomic::{AtomicBool, Ordering},
    },
};

use bon::Builder;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Deserializer, Serialize, de};
use smart_default::SmartDefault;
use snafu::{ResultExt, Snafu};
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter, layer::SubscriberExt, registry::LookupSpan,
};

/// Deserializes a string value, falling back to `Default::default()` when the
/// string is empty.
pub fn empty_string_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        Ok(T::default())
    } else {
        T::deserialize(de::value::StrDeserializer::new(&s)).map_err(|e: de::value::Error| {
            de::Error::custom(format!("invalid value, expect empty string, err: {e}"))
        })
    }
}

/// Directory used for log files when a relative default is wanted.
pub const DEFAULT_LOGGING_DIR: &str = "logs";

/// Filter used when neither `LoggingOptions::level` nor `RUST_LOG` is set.
const DEFAULT_LOG_TARGETS: &str = "info";

/// Handle for changing the log filter at runtime. Populated by
/// [`init_global_logging`].
pub static RELOAD_HANDLE: OnceCell<tracing_subscriber::reload::Handle<filter::Targets, Registry>> =
    OnceCell::new();

/// Configuration options for the logging system.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct LoggingOptions {
    /// Directory for rolling log files. Empty means stdout only.
    #[default = ""]
    #[builder(default, into)]
    pub dir: String,

    /// Filter directives such as `"info,jobhost_scheduler=debug"`. Falls back
    /// to `RUST_LOG`, then to `"info"`.
    #[builder(into)]
    pub level: Option<String>,

    #[serde(default, deserialize_with = "empty_string_as_default")]
    #[builder(default)]
    pub log_format: LogFormat,

    /// Number of hourly rotated files kept per log stream.
    #[default = 720]
    #[builder(default = 720)]
    pub max_log_files: usize,

    /// Also write to stdout when file logging is enabled.
    #[default = true]
    #[builder(default = true)]
    pub append_stdout: bool,
}

/// Log line format.
#[derive(
    Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize, Default, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per line, for log aggregation.
    Json,
    /// Human readable lines.
    #[default]
    Text,
}

/// Failure to install the global subscriber.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LoggingError {
    #[snafu(display("Failed to open rolling log files under '{dir}'"))]
    RollingAppender {
        dir:    String,
        source: tracing_appender::rolling::InitError,
    },

    #[snafu(display("Invalid log filter '{directives}'"))]
    ParseFilter {
        directives: String,
        source:     filter::ParseError,
    },

    #[snafu(display("Failed to forward `log` records to tracing"))]
    LogBridge {
        source: tracing_log::log::SetLoggerError,
    },

    #[snafu(display("A global tracing subscriber is already installed"))]
    SetGlobalDefault {
        source: tracing::subscriber::SetGlobalDefaultError,
    },
}

/// Stdout logging with default options.
pub fn init_tracing_subscriber(app_name: &str) -> Result<Vec<WorkerGuard>, LoggingError> {
    init_global_logging(app_name, &LoggingOptions::default())
}

/// Logging for unit tests. Every test may call it; only the first call
/// installs anything.
///
/// Honors `UNITTEST_LOG_DIR` (default `/tmp/__unittest_logs`) and
/// `UNITTEST_LOG_LEVEL` (default `debug`).
pub fn init_default_ut_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let dir =
            env::var("UNITTEST_LOG_DIR").unwrap_or_else(|_| "/tmp/__unittest_logs".to_string());
        let opts = LoggingOptions::builder()
            .dir(dir.as_str())
            .level(env::var("UNITTEST_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()))
            .build();
        match init_global_logging("unittest", &opts) {
            Ok(guards) => {
                if let Ok(mut held) = UT_LOG_GUARDS.lock() {
                    *held = guards;
                }
                tracing::info!(dir = %dir, "Unit test logging initialized");
            }
            Err(e) => eprintln!("unit test logging disabled: {e}"),
        }
    });
}

static UT_LOG_GUARDS: Mutex<Vec<WorkerGuard>> = Mutex::new(Vec::new());

static INSTALLED: AtomicBool = AtomicBool::new(false);

fn fmt_layer<S>(writer: NonBlocking, format: LogFormat, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = tracing_subscriber::fmt::Layer::new()
        .with_writer(writer)
        .with_ansi(ansi);
    match format {
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Text => layer.boxed(),
    }
}

fn file_writer(
    app_name: &str,
    suffix: &str,
    opts: &LoggingOptions,
    guards: &mut Vec<WorkerGuard>,
) -> Result<NonBlocking, LoggingError> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(format!("{app_name}{suffix}"))
        .max_log_files(opts.max_log_files)
        .build(&opts.dir)
        .context(RollingAppenderSnafu { dir: &opts.dir })?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    guards.push(guard);
    Ok(writer)
}

/// Installs the global tracing subscriber built from `opts`.
///
/// Writes to stdout when `append_stdout` is set or no `dir` is configured.
/// With a `dir`, also writes `{app_name}.*` hourly rolling files and
/// `{app_name}-err.*` files holding `ERROR` events only.
///
/// Hold the returned guards until exit: dropping them stops the background
/// writers. Calls after the first successful one return no guards and change
/// nothing.
pub fn init_global_logging(
    app_name: &str,
    opts: &LoggingOptions,
) -> Result<Vec<WorkerGuard>, LoggingError> {
    let directives = opts
        .level
        .clone()
        .or_else(|| env::var(EnvFilter::DEFAULT_ENV).ok())
        .unwrap_or_else(|| DEFAULT_LOG_TARGETS.to_string());
    let targets = directives
        .parse::<filter::Targets>()
        .context(ParseFilterSnafu {
            directives: &directives,
        })?;

    if INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(Vec::new());
    }
    let mut guards = Vec::new();

    let stdout_layer = (opts.append_stdout || opts.dir.is_empty()).then(|| {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        guards.push(guard);
        fmt_layer(writer, opts.log_format, std::io::stdout().is_terminal())
    });

    let (file_layer, err_file_layer) = if opts.dir.is_empty() {
        (None, None)
    } else {
        let all = fmt_layer(file_writer(app_name, "", opts, &mut guards)?, opts.log_format, false);
        let errors = fmt_layer(file_writer(app_name, "-err", opts, &mut guards)?, opts.log_format, false)
            .with_filter(filter::LevelFilter::ERROR)
            .boxed();
        (Some(all), Some(errors))
    };

    let (reloadable, reload_handle) = tracing_subscriber::reload::Layer::new(targets);
    let _ = RELOAD_HANDLE.set(reload_handle);

    LogTracer::init().context(LogBridgeSnafu)?;
    let subscriber = Registry::default()
        .with(reloadable)
        .with(stdout_layer)
        .with(file_layer)
        .with(err_file_layer);
    tracing::subscriber::set_global_default(subscriber).context(SetGlobalDefaultSnafu)?;

    Ok(guards)
}
