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

//! Wire format spoken between the host and plugin modules.
//!
//! Every exchange spawns the module once. The host writes a single JSON
//! request line to the module's stdin and closes it:
//!
//! - `{"op":"describe"}` must exit 0 and print `{"jobs":["Full.Type.Name"]}`
//! - `{"op":"execute","job":"Full.Type.Name","context":{..}|null}` succeeds
//!   on exit 0; any other exit code is a failure described by stderr. A
//!   `{"status":"ok"|"error","message":".."}` line on stdout takes precedence
//!   over the exit code.

use std::collections::BTreeMap;

use futures::future::BoxFuture;
use jobhost_common_engine::JobContext;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Describe,
    Execute {
        job:     String,
        context: Option<ExecutionContext>,
    },
}

/// Trigger metadata forwarded to a plugin job. Absent for startup runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub schedule_id:       String,
    pub trigger:           String,
    pub fired_at:          String,
    pub scheduled_fire_at: String,
    pub fire_count:        u64,
}

impl ExecutionContext {
    #[must_use]
    pub fn from_job_context(ctx: &JobContext) -> Self {
        let bundle = ctx.bundle();
        Self {
            schedule_id:       bundle.schedule_id().to_string(),
            trigger:           bundle.trigger().expression().to_string(),
            fired_at:          bundle.fired_at().to_rfc3339(),
            scheduled_fire_at: bundle.scheduled_fire_at().to_rfc3339(),
            fire_count:        bundle.fire_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeResponse {
    pub jobs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub status:  ExecuteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

type PluginJobFn =
    Box<dyn Fn(Option<ExecutionContext>) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// Named jobs a plugin binary exposes through [`serve`].
#[derive(Default)]
pub struct PluginJobTable {
    jobs: BTreeMap<String, PluginJobFn>,
}

impl PluginJobTable {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn job<F, Fut>(mut self, name: impl Into<String>, run: F) -> Self
    where
        F: Fn(Option<ExecutionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.jobs
            .insert(name.into(), Box::new(move |ctx| Box::pin(run(ctx))));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> { self.jobs.keys().map(String::as_str) }
}

/// What a [`serve`] call did. The plugin process should exit with
/// [`exit_code`](Self::exit_code).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServeOutcome {
    Described,
    Succeeded,
    Failed(String),
}

impl ServeOutcome {
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Described | Self::Succeeded => 0,
            Self::Failed(_) => 1,
        }
    }
}

/// Answers one host request read from `input`, writing the response to
/// `output`. Plugin binaries call this from `main` with stdin and stdout.
pub async fn serve<R, W>(table: &PluginJobTable, input: R, mut output: W) -> std::io::Result<ServeOutcome>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    BufReader::new(input).read_line(&mut line).await?;
    let request: Request = serde_json::from_str(line.trim())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let (outcome, body) = match request {
        Request::Describe => {
            let response = DescribeResponse {
                jobs: table.names().map(ToString::to_string).collect(),
            };
            (ServeOutcome::Described, serde_json::to_string(&response))
        }
        Request::Execute { job, context } => {
            let result = match table.jobs.get(&job) {
                Some(run) => run(context).await,
                None => Err(format!("unknown job '{job}'")),
            };
            let (outcome, response) = match result {
                Ok(()) => (ServeOutcome::Succeeded, ExecuteResponse {
                    status:  ExecuteStatus::Ok,
                    message: None,
                }),
                Err(message) => (ServeOutcome::Failed(message.clone()), ExecuteResponse {
                    status:  ExecuteStatus::Error,
                    message: Some(message),
                }),
            };
            (outcome, serde_json::to_string(&response))
        }
    };

    let mut body = body.map_err(std::io::Error::other)?;
    body.push('\n');
    output.write_all(body.as_bytes()).await?;
    output.flush().await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PluginJobTable {
        PluginJobTable::new()
            .job("Acme.Reports.Daily", |_| async { Ok(()) })
            .job("Acme.Reports.Broken", |_| async {
                Err("report store unavailable".to_string())
            })
    }

    #[test]
    fn requests_use_the_documented_shape() {
        assert_eq!(
            serde_json::to_string(&Request::Describe).unwrap(),
            r#"{"op":"describe"}"#
        );
        let execute = Request::Execute {
            job:     "Acme.Reports.Daily".into(),
            context: None,
        };
        assert_eq!(
            serde_json::to_string(&execute).unwrap(),
            r#"{"op":"execute","job":"Acme.Reports.Daily","context":null}"#
        );
    }

    #[tokio::test]
    async fn serve_describes_the_table() {
        let mut out = Vec::new();
        let outcome = serve(&table(), &b"{\"op\":\"describe\"}\n"[..], &mut out)
            .await
            .unwrap();
        assert_eq!(outcome, ServeOutcome::Described);

        let response: DescribeResponse = serde_json::from_slice(&out).unwrap();
        assert_eq!(response.jobs, vec!["Acme.Reports.Broken", "Acme.Reports.Daily"]);
    }

    #[tokio::test]
    async fn serve_reports_job_failures() {
        let mut out = Vec::new();
        let request = br#"{"op":"execute","job":"Acme.Reports.Broken","context":null}"#;
        let outcome = serve(&table(), &request[..], &mut out).await.unwrap();
        assert_eq!(outcome.exit_code(), 1);

        let response: ExecuteResponse = serde_json::from_slice(&out).unwrap();
        assert_eq!(response.status, ExecuteStatus::Error);
        assert_eq!(response.message.as_deref(), Some("report store unavailable"));
    }

    #[tokio::test]
    async fn serve_rejects_unknown_jobs() {
        let mut out = Vec::new();
        let request = br#"{"op":"execute","job":"Nope","context":null}"#;
        let outcome = serve(&table(), &request[..], &mut out).await.unwrap();
        assert_eq!(outcome, ServeOutcome::Failed("unknown job 'Nope'".to_string()));
    }

    #[tokio::test]
    async fn serve_rejects_garbage() {
        let mut out = Vec::new();
        let err = serve(&table(), &b"hello\n"[..], &mut out).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
