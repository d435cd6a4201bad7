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
    collections::BTreeSet,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::Duration,
};

use snafu::{OptionExt, ResultExt, ensure};
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, warn};

use super::{
    job::PluginJob,
    protocol::{DescribeResponse, ExecuteResponse, ExecuteStatus, ExecutionContext, Request},
};
use crate::{
    catalog::CatalogEntry,
    container::constructor,
    error::{
        EncodeRequestSnafu, ExitedSnafu, IoSnafu, JobFailedSnafu, MalformedResponseSnafu,
        ModuleNotFoundSnafu, PluginError, SpawnSnafu, TimeoutSnafu,
    },
};

/// Output of one plugin process run.
struct Invocation {
    code:   i32,
    stdout: String,
    stderr: String,
}

/// A plugin module that answered the describe handshake.
#[derive(Debug)]
pub struct PluginModule {
    path:            PathBuf,
    jobs:            BTreeSet<String>,
    execute_timeout: Option<Duration>,
}

impl PluginModule {
    /// Checks that `path` is a file and asks it which jobs it exports.
    pub async fn open(
        path: impl Into<PathBuf>,
        handshake_timeout: Duration,
        execute_timeout: Option<Duration>,
    ) -> Result<Self, PluginError> {
        let path = path.into();
        let is_file = tokio::fs::metadata(&path)
            .await
            .is_ok_and(|meta| meta.is_file());
        ensure!(is_file, ModuleNotFoundSnafu { path });

        let output = invoke(&path, &Request::Describe, Some(handshake_timeout)).await?;
        ensure!(output.code == 0, ExitedSnafu {
            path:   path.clone(),
            code:   output.code,
            stderr: output.stderr.trim(),
        });
        let described: DescribeResponse =
            serde_json::from_str(output.stdout.trim()).context(MalformedResponseSnafu {
                path: path.clone(),
            })?;

        debug!(path = %path.display(), jobs = ?described.jobs, "Plugin module described");
        Ok(Self {
            path,
            jobs: described.jobs.into_iter().collect(),
            execute_timeout,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    /// Job type names the module exports, sorted.
    pub fn jobs(&self) -> impl Iterator<Item = &str> { self.jobs.iter().map(String::as_str) }

    #[must_use]
    pub fn exports(&self, job: &str) -> bool { self.jobs.contains(job) }

    /// Catalog entry for `job`, `None` if the module does not export it.
    #[must_use]
    pub fn entry(self: &Arc<Self>, job: &str) -> Option<CatalogEntry> {
        if !self.exports(job) {
            return None;
        }
        let module = Arc::clone(self);
        let name = job.to_string();
        Some(CatalogEntry::plugin(
            job,
            self.path.clone(),
            constructor(move |_| {
                Ok(Box::new(PluginJob::new(Arc::clone(&module), name.clone())))
            }),
        ))
    }

    /// Runs `job` inside the module.
    pub async fn execute(
        &self,
        job: &str,
        context: Option<ExecutionContext>,
    ) -> Result<(), PluginError> {
        let request = Request::Execute {
            job: job.to_string(),
            context,
        };
        let output = invoke(&self.path, &request, self.execute_timeout).await?;

        let stdout = output.stdout.trim();
        if !stdout.is_empty() {
            match serde_json::from_str::<ExecuteResponse>(stdout) {
                Ok(ExecuteResponse {
                    status: ExecuteStatus::Ok,
                    ..
                }) => return Ok(()),
                Ok(ExecuteResponse {
                    status: ExecuteStatus::Error,
                    message,
                }) => {
                    let message = message.unwrap_or_else(|| output.stderr.trim().to_string());
                    return JobFailedSnafu { job, message }.fail();
                }
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        job,
                        error = %e,
                        "Failed to parse plugin stdout as a response, falling back to exit code"
                    );
                }
            }
        }

        ensure!(output.code == 0, ExitedSnafu {
            path:   self.path.clone(),
            code:   output.code,
            stderr: output.stderr.trim(),
        });
        Ok(())
    }
}

async fn invoke(
    path: &Path,
    request: &Request,
    timeout: Option<Duration>,
) -> Result<Invocation, PluginError> {
    let mut line = serde_json::to_string(request).context(EncodeRequestSnafu { path })?;
    line.push('\n');

    let mut child = Command::new(path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .context(SpawnSnafu { path })?;

    // A module may exit without reading its request.
    if let Some(mut stdin) = child.stdin.take()
        && let Err(e) = stdin.write_all(line.as_bytes()).await
        && e.kind() != std::io::ErrorKind::BrokenPipe
    {
        return Err(e).context(IoSnafu { path });
    }

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            .ok()
            .context(TimeoutSnafu {
                path,
                timeout: limit,
            })?,
        None => child.wait_with_output().await,
    }
    .context(IoSnafu { path })?;

    Ok(Invocation {
        code:   output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
