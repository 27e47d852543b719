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

use unit::VersionInfo;

fn version() -> VersionInfo {
    VersionInfo {
        name: env!("CARGO_PKG_NAME").into(),
        tag: env!("GIMBAL_GIT_TAG").into(),
        branch: env!("GIMBAL_GIT_BRANCH").into(),
        commit: env!("GIMBAL_GIT_HASH").into(),
        rustc: env!("GIMBAL_RUSTC_VERSION").into(),
        build_time: env!("GIMBAL_BUILD_TIME").into(),
    }
}

#[tokio::main]
async fn main() {
    utils::rust_backtrace::enable();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    let options = app_lib::Options::from_args(std::env::args_os());
    let code = match app_lib::setup(options, version(), Vec::new()) {
        Ok(app) => app.main().await,
        Err(err) => {
            eprintln!("Gimbal daemon launch failed: {err:?}");
            1
        }
    };
    std::process::exit(code)
}
