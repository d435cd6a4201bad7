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

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use jobhost_scheduler::JobDescriptor;

pub const DAILY: &str = "Acme.Reports.Daily";
pub const BROKEN: &str = "Acme.Reports.Broken";

/// Writes an executable shell plugin exporting [`DAILY`] and [`BROKEN`].
///
/// Every request line the plugin receives is appended to `requests.log` next
/// to it.
#[cfg(unix)]
pub fn write_plugin(dir: &Path, name: &str) -> PathBuf {
    let log = dir.join("requests.log");
    let script = format!(
        r#"#!/bin/sh
read -r request
echo "$request" >> "{log}"
case "$request" in
  *'"op":"describe"'*)
    echo '{{"jobs":["{DAILY}","{BROKEN}"]}}'
    ;;
  *'"job":"{BROKEN}"'*)
    echo "report store unavailable" >&2
    exit 3
    ;;
  *)
    exit 0
    ;;
esac
"#,
        log = log.display(),
    );
    write_script(dir, name, &script)
}

#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Request lines the plugin in `dir` has received so far.
pub fn requests(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("requests.log"))
        .map(|log| log.lines().map(ToString::to_string).collect())
        .unwrap_or_default()
}

pub fn plugin_descriptor(class: &str, filename: &str, directory: &Path) -> JobDescriptor {
    JobDescriptor::builder()
        .class_full_name(class)
        .assembly_filename(filename)
        .assembly_directory(directory.display().to_string())
        .build()
}

pub fn compiled_descriptor(class: &str) -> JobDescriptor {
    JobDescriptor::builder().class_full_name(class).build()
}
