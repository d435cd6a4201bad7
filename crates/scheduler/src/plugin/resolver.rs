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
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use jobhost_error::ErrorExt;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::module::PluginModule;
use crate::{catalog::CatalogEntry, config::JobDescriptor, metrics::PLUGIN_LOAD_FAILURES};

pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Finds plugin modules named by job descriptors and the job types inside
/// them.
///
/// Failures never propagate: they are logged and reported as `None` so the
/// caller can skip the descriptor. Modules are opened once per path.
#[derive(Debug, bon::Builder)]
pub struct PluginResolver {
    /// Directory relative module directories are resolved against. Defaults
    /// to the directory of the running executable.
    #[builder(into)]
    base_dir:          Option<PathBuf>,
    #[builder(default = DEFAULT_HANDSHAKE_TIMEOUT)]
    handshake_timeout: Duration,
    /// Limit for a single job execution. Unlimited when unset.
    execute_timeout:   Option<Duration>,
    #[builder(skip)]
    modules:           Mutex<HashMap<PathBuf, Arc<PluginModule>>>,
    #[builder(skip)]
    load_attempts:     AtomicUsize,
}

impl Default for PluginResolver {
    fn default() -> Self { Self::builder().build() }
}

impl PluginResolver {
    #[must_use]
    pub fn base_dir(&self) -> PathBuf { self.base_dir.clone().unwrap_or_else(executable_dir) }

    /// Full module path for `descriptor`, `None` if it names no module file.
    #[must_use]
    pub fn module_path(&self, descriptor: &JobDescriptor) -> Option<PathBuf> {
        let filename = descriptor.plugin_filename()?;
        let directory = Path::new(descriptor.assembly_directory.as_deref().unwrap_or_default());
        let directory = if directory.is_absolute() {
            directory.to_path_buf()
        } else {
            self.base_dir().join(directory)
        };
        Some(directory.join(filename))
    }

    /// Opens the module `descriptor` points at.
    pub async fn load(&self, descriptor: &JobDescriptor) -> Option<Arc<PluginModule>> {
        let Some(path) = self.module_path(descriptor) else {
            warn!(
                job = %descriptor.class_full_name,
                "Could not find the plugin module name, nothing to load"
            );
            return None;
        };

        let mut modules = self.modules.lock().await;
        if let Some(module) = modules.get(&path) {
            return Some(Arc::clone(module));
        }

        info!(path = %path.display(), "Loading plugin module");
        self.load_attempts.fetch_add(1, Ordering::Relaxed);
        match PluginModule::open(&path, self.handshake_timeout, self.execute_timeout).await {
            Ok(module) => {
                let module = Arc::new(module);
                info!(path = %path.display(), jobs = module.jobs().count(), "Loaded plugin module");
                modules.insert(path, Arc::clone(&module));
                Some(module)
            }
            Err(e) => {
                PLUGIN_LOAD_FAILURES.inc();
                error!(
                    path = %path.display(),
                    status = %e.status_code(),
                    error = ?e,
                    "Failed to load plugin module"
                );
                None
            }
        }
    }

    /// Catalog entry for the job type `descriptor` names, looked up by exact
    /// name in its module.
    pub async fn resolve(&self, descriptor: &JobDescriptor) -> Option<CatalogEntry> {
        let module = self.load(descriptor).await?;
        let entry = module.entry(&descriptor.class_full_name);
        if entry.is_none() {
            warn!(
                job = %descriptor.class_full_name,
                path = %module.path().display(),
                exported = ?module.jobs().collect::<Vec<_>>(),
                "Plugin module does not export the job type"
            );
        }
        entry
    }

    /// Number of module opens attempted so far. Cache hits and descriptors
    /// without a module file are not counted.
    #[must_use]
    pub fn load_attempts(&self) -> usize { self.load_attempts.load(Ordering::Relaxed) }
}

fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(filename: Option<&str>, directory: Option<&str>) -> JobDescriptor {
        JobDescriptor {
            class_full_name:    "Acme.Reports.Daily".to_string(),
            assembly_filename:  filename.map(ToString::to_string),
            assembly_directory: directory.map(ToString::to_string),
        }
    }

    #[test]
    fn absolute_directory_is_used_verbatim() {
        let resolver = PluginResolver::builder().base_dir("/srv/jobhost").build();
        let path = resolver
            .module_path(&descriptor(Some("acme"), Some("/opt/plugins")))
            .unwrap();
        assert_eq!(path, PathBuf::from("/opt/plugins/acme"));
    }

    #[test]
    fn relative_directory_is_joined_to_base() {
        let resolver = PluginResolver::builder().base_dir("/srv/jobhost").build();
        let path = resolver
            .module_path(&descriptor(Some("acme"), Some("plugins")))
            .unwrap();
        assert_eq!(path, PathBuf::from("/srv/jobhost/plugins/acme"));

        let path = resolver.module_path(&descriptor(Some("acme"), None)).unwrap();
        assert_eq!(path, PathBuf::from("/srv/jobhost/acme"));
    }

    #[test]
    fn default_base_is_executable_directory() {
        let resolver = PluginResolver::default();
        let exe = std::env::current_exe().unwrap();
        assert_eq!(resolver.base_dir(), exe.parent().unwrap());
    }

    #[tokio::test]
    async fn empty_filename_never_touches_the_filesystem() {
        let resolver = PluginResolver::default();
        assert!(resolver.load(&descriptor(Some(""), Some("plugins"))).await.is_none());
        assert!(resolver.load(&descriptor(None, None)).await.is_none());
        assert_eq!(resolver.load_attempts(), 0);
    }

    #[tokio::test]
    async fn missing_module_is_logged_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = PluginResolver::builder().base_dir(dir.path()).build();
        assert!(resolver.resolve(&descriptor(Some("missing"), None)).await.is_none());
        assert_eq!(resolver.load_attempts(), 1);
    }
}
