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

use std::sync::Arc;

use jobhost_common_engine::{Job, JobContext, JobError, JobResult};
use jobhost_error::ErrorExt;
use tracing::debug;

use super::{module::PluginModule, protocol::ExecutionContext};

/// A job living in a plugin module. Every execution runs the module once.
#[derive(Debug)]
pub struct PluginJob {
    module: Arc<PluginModule>,
    name:   String,
}

impl PluginJob {
    #[must_use]
    pub const fn new(module: Arc<PluginModule>, name: String) -> Self { Self { module, name } }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }
}

#[async_trait::async_trait]
impl Job for PluginJob {
    async fn execute(&self, ctx: Option<&JobContext>) -> JobResult {
        debug!(job = %self.name, path = %self.module.path().display(), "Running plugin job");
        self.module
            .execute(&self.name, ctx.map(ExecutionContext::from_job_context))
            .await
            .map_err(|e| JobError::transient_with_source(e.output_msg(), e))
    }
}
