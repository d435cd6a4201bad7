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

use std::{any::Any, error::Error as StdError};

use serde::Serialize;
use strum::EnumProperty;

/// Coarse classification of an error, used for logging and for deciding
/// whether a failure is worth retrying.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Serialize,
    strum_macros::Display,
    strum_macros::EnumProperty,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusCode {
    #[strum(props(retryable = "false"))]
    InvalidConfig,
    #[strum(props(retryable = "false"))]
    NotFound,
    #[strum(props(retryable = "true"))]
    PluginFailure,
    #[strum(props(retryable = "true"))]
    JobFailure,
    #[strum(props(retryable = "false"))]
    Internal,
    #[strum(props(retryable = "false"))]
    Unknown,
}

impl StatusCode {
    /// Whether an operation failing with this code may succeed when tried
    /// again without any configuration change.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        self.get_str("retryable")
            .and_then(|value| value.parse::<bool>().ok())
            .unwrap_or(false)
    }
}

/// Walks the `source()` chain of `err` and returns its innermost cause.
///
/// Returns `err` itself when it has no source.
#[must_use]
pub fn innermost_cause<'a>(err: &'a (dyn StdError + 'static)) -> &'a (dyn StdError + 'static) {
    let mut root = err;
    while let Some(source) = root.source() {
        root = source;
    }
    root
}

pub trait ErrorExt: StdError {
    fn status_code(&self) -> StatusCode { StatusCode::Unknown }

    fn as_any(&self) -> &dyn Any;

    /// Innermost error of the chain, or `None` if this error has no source.
    fn root_cause(&self) -> Option<&(dyn StdError + 'static)> {
        self.source().map(innermost_cause)
    }

    /// Single line message suitable for logs: the error itself followed by its
    /// innermost cause, if it has one.
    fn output_msg(&self) -> String {
        match self.status_code() {
            StatusCode::Unknown | StatusCode::Internal => {
                format!("Internal error: {self}")
            }
            _ => match self.root_cause() {
                Some(root) => format!("{self}: {root}"),
                None => format!("{self}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use snafu::{ResultExt, Snafu};

    use super::*;

    #[derive(Debug, Snafu)]
    enum Outer {
        #[snafu(display("failed to build job {name}"))]
        Build { name: String, source: Middle },
    }

    #[derive(Debug, Snafu)]
    enum Middle {
        #[snafu(display("dependency lookup failed"))]
        Lookup { source: std::io::Error },
    }

    impl ErrorExt for Outer {
        fn status_code(&self) -> StatusCode { StatusCode::NotFound }

        fn as_any(&self) -> &dyn Any { self }
    }

    fn nested() -> Outer {
        let io: Result<(), std::io::Error> = Err(std::io::Error::other("database is offline"));
        io.context(LookupSnafu)
            .context(BuildSnafu { name: "cleanup" })
            .unwrap_err()
    }

    #[test]
    fn innermost_cause_walks_whole_chain() {
        let err = nested();
        assert_eq!(innermost_cause(&err).to_string(), "database is offline");
    }

    #[test]
    fn innermost_cause_of_leaf_is_itself() {
        let err = std::io::Error::other("leaf");
        assert_eq!(innermost_cause(&err).to_string(), "leaf");
    }

    #[test]
    fn output_msg_appends_root_cause() {
        let err = nested();
        assert_eq!(
            err.output_msg(),
            "failed to build job cleanup: database is offline"
        );
        assert!(err.as_any().downcast_ref::<Outer>().is_some());
    }

    #[test]
    fn status_code_round_trips_through_strings() {
        assert_eq!(StatusCode::PluginFailure.to_string(), "plugin_failure");
        assert_eq!(
            StatusCode::from_str("invalid_config").unwrap(),
            StatusCode::InvalidConfig
        );
        assert!(StatusCode::PluginFailure.is_retryable());
        assert!(!StatusCode::InvalidConfig.is_retryable());
    }

    #[test]
    fn unknown_codes_do_not_parse() {
        assert!(StatusCode::from_str("invalid_argument").is_err());
        assert!(StatusCode::from_str("").is_err());
    }
}
