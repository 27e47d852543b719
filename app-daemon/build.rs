// Copyright (c) 2024 The Gimbal developers
// SPDX-License-Identifier: MIT
// Licensed under the MIT License;
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://spdx.org/licenses/MIT
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bakes build metadata into the binary for `ping_version`.

use std::process::Command;

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_owned())
}

fn emit(key: &str, value: Option<String>) {
    let value = value.unwrap_or_else(|| "unknown".to_owned());
    println!("cargo:rustc-env={key}={value}");
}

fn main() {
    emit(
        "GIMBAL_GIT_TAG",
        command_output("git", &["describe", "--tags", "--dirty", "--always"]),
    );
    emit(
        "GIMBAL_GIT_BRANCH",
        command_output("git", &["rev-parse", "--abbrev-ref", "HEAD"]),
    );
    emit(
        "GIMBAL_GIT_HASH",
        command_output("git", &["rev-parse", "--short=12", "HEAD"]),
    );
    emit("GIMBAL_RUSTC_VERSION", command_output("rustc", &["--version"]));
    emit(
        "GIMBAL_BUILD_TIME",
        Some(humantime::format_rfc3339_seconds(std::time::SystemTime::now()).to_string()),
    );

    // Re-run when the checked-out commit changes.
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=build.rs");
}
