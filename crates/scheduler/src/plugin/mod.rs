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

//! Jobs living in external plugin modules.
//!
//! A plugin module is an executable file. The host never links it: every
//! handshake and every job execution spawns the module and exchanges one
//! JSON request and response over its standard streams (see [`protocol`]).

mod job;
mod module;
pub mod protocol;
mod resolver;

pub use job::PluginJob;
pub use module::PluginModule;
pub use protocol::{PluginJobTable, ServeOutcome, serve};
pub use resolver::{DEFAULT_HANDSHAKE_TIMEOUT, PluginResolver};
