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

use logging::log;
use unit::{
    capability::{Level, Logger},
    Manifest, Unit,
};

/// The default [Logger] capability: forwards unit-originated messages to
/// the process-wide tracing subscriber.
#[derive(Default)]
pub struct LogUnit;

impl Logger for LogUnit {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::Debug => log::debug!("{message}"),
            Level::Info => log::info!("{message}"),
            Level::Warn => log::warn!("{message}"),
            Level::Error => log::error!("{message}"),
        }
    }
}

impl Unit for LogUnit {
    fn manifest(&self) -> Manifest {
        Manifest::new("logger")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_levels_are_accepted() {
        let logger = LogUnit;
        for level in [Level::Debug, Level::Info, Level::Warn, Level::Error] {
            logger.log(level, "probe");
        }
    }
}
