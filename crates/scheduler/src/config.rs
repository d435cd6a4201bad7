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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Trigger key that fires a job once, right away, with no recurrence.
pub const FIRE_ONCE: &str = "";

/// One schedulable job as declared in configuration.
///
/// ```rust
/// use jobhost_scheduler::JobDescriptor;
///
/// let compiled: JobDescriptor =
///     serde_json::from_str(r#"{"ClassFullName":"my_jobs::Cleanup"}"#).unwrap();
/// assert!(compiled.is_compiled_in());
///
/// let plugin = JobDescriptor::builder()
///     .class_full_name("Acme.Reports.Daily")
///     .assembly_filename("acme-reports")
///     .assembly_directory("plugins")
///     .build();
/// assert_eq!(plugin.plugin_filename(), Some("acme-reports"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(rename_all = "PascalCase")]
pub struct JobDescriptor {
    /// Fully-qualified name of the job type.
    #[builder(into)]
    pub class_full_name: String,

    /// File name of the plugin module defining the job. Absent or empty for
    /// jobs compiled into the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub assembly_filename: Option<String>,

    /// Directory of the plugin module, absolute or relative to the plugin
    /// base directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub assembly_directory: Option<String>,
}

impl JobDescriptor {
    /// Plugin module file name, `None` when absent or empty.
    #[must_use]
    pub fn plugin_filename(&self) -> Option<&str> {
        self.assembly_filename
            .as_deref()
            .filter(|name| !name.is_empty())
    }

    #[must_use]
    pub fn is_compiled_in(&self) -> bool { self.plugin_filename().is_none() }
}

/// Declared jobs grouped by trigger key.
///
/// A key is a cron expression or [`FIRE_ONCE`]. Iteration is ordered by key so
/// two loads of the same configuration walk the triggers identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerConfig {
    triggers: BTreeMap<String, Vec<JobDescriptor>>,
}

impl TriggerConfig {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Appends `descriptors` to the list under `key`.
    #[must_use]
    pub fn with_trigger(
        mut self,
        key: impl Into<String>,
        descriptors: impl IntoIterator<Item = JobDescriptor>,
    ) -> Self {
        self.triggers
            .entry(key.into())
            .or_default()
            .extend(descriptors);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[JobDescriptor])> {
        self.triggers
            .iter()
            .map(|(key, descriptors)| (key.as_str(), descriptors.as_slice()))
    }

    /// Every `(trigger key, descriptor)` pair in iteration order.
    pub fn descriptors(&self) -> impl Iterator<Item = (&str, &JobDescriptor)> {
        self.iter()
            .flat_map(|(key, descriptors)| descriptors.iter().map(move |d| (key, d)))
    }

    #[must_use]
    pub fn len(&self) -> usize { self.triggers.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.triggers.is_empty() }
}

impl FromIterator<(String, Vec<JobDescriptor>)> for TriggerConfig {
    fn from_iter<I: IntoIterator<Item = (String, Vec<JobDescriptor>)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |config, (key, descriptors)| {
                config.with_trigger(key, descriptors)
            })
    }
}
