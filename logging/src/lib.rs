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

mod log_style;

pub use log_style::{get_log_style_from_env, LogStyle, LogStyleParseError, TextColoring};

pub use tracing as log;

use tracing_subscriber::EnvFilter;

pub const LOG_STYLE_ENV_VAR: &str = "GIMBAL_LOG_STYLE";

static INITIALIZE_LOGGER_ONCE_FLAG: std::sync::Once = std::sync::Once::new();

/// Initialize process-wide logging. Safe to call more than once; only the
/// first call has an effect.
///
/// The filter is taken from `RUST_LOG` (default `info`), the output style
/// from [LOG_STYLE_ENV_VAR].
pub fn init_logging() {
    INITIALIZE_LOGGER_ONCE_FLAG.call_once(|| {
        let style = get_log_style_from_env(LOG_STYLE_ENV_VAR)
            .unwrap_or(None)
            .unwrap_or(LogStyle::Text(TextColoring::Auto));
        init_with_style(style)
    });
}

fn init_with_style(style: LogStyle) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match style {
        LogStyle::Json => builder.json().try_init(),
        LogStyle::Text(coloring) => {
            let ansi = match coloring {
                TextColoring::On => true,
                TextColoring::Off => false,
                TextColoring::Auto => is_terminal(),
            };
            builder.with_ansi(ansi).try_init()
        }
    };

    // Another subscriber may already be installed, e.g. by a test harness.
    if let Err(err) = result {
        eprintln!("Logging initialization skipped: {err}");
    }
}

fn is_terminal() -> bool {
    use std::io::IsTerminal;
    std::io::stderr().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_twice() {
        init_logging();
        init_logging();
    }
}
